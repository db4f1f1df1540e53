//! Ordered, single-worker execution lane.
//!
//! Units of work are drained one at a time in submission order by a dedicated Tokio task.
//! A unit that panics is logged and the worker moves on to the next one.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{error, trace};

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    /// Start the worker. Must be called from within a Tokio runtime.
    pub fn spawn(name: &'static str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(queue = name, panic = %message, "Queued task panicked");
                }
            }
            trace!(queue = name, "Task queue drained and closed");
        });
        Self { tx }
    }

    /// Submit an async unit of work. Returns `false` if the worker has stopped.
    pub fn execute<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx.send(Box::pin(task)).is_ok()
    }

    /// Submit a synchronous unit of work
    pub fn execute_fn<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(async move { task() })
    }
}
