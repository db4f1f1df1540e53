//! Outbound half of a physical connection.
//!
//! A [`Channel`] owns a writer task that drains write requests strictly in arrival order.
//! Both outbound paths of a session (priority writes and the task queue) feed the same
//! request queue, so the writer is the single consumer of the socket. Closing enqueues a
//! close request behind the pending writes: they are flushed before the socket shuts down.
//! Once closing starts, each remaining write gets at most [`CLOSE_FLUSH_GRACE`] to complete,
//! so a peer that stopped reading cannot keep the socket open.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{ProtocolError, Result};
use crate::utils::timeout::{with_deadline, CLOSE_FLUSH_GRACE};

/// Completion of a single write, resolved by the writer task
pub type WriteCompletion = oneshot::Receiver<Result<()>>;

enum ChannelOp {
    Write {
        frame: Bytes,
        done: oneshot::Sender<Result<()>>,
    },
    Close,
}

#[derive(Clone)]
pub struct Channel {
    ops: mpsc::UnboundedSender<ChannelOp>,
    open: Arc<AtomicBool>,
    closing: CancellationToken,
    stopped: CancellationToken,
    connection: u64,
}

impl Channel {
    /// Start the writer task for `writer`. Must be called from within a Tokio runtime.
    pub(crate) fn spawn<W>(writer: W, write_timeout: Option<Duration>, connection: u64) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (ops, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        let closing = CancellationToken::new();
        let stopped = CancellationToken::new();
        tokio::spawn(run_writer(
            writer,
            rx,
            write_timeout,
            Arc::clone(&open),
            closing.clone(),
            stopped.clone(),
            connection,
        ));
        Self {
            ops,
            open,
            closing,
            stopped,
            connection,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Queue `frame` and flush it; the returned receiver resolves once it left (or failed to)
    pub fn write_and_flush(&self, frame: Bytes) -> WriteCompletion {
        let (done, completion) = oneshot::channel();
        if !self.is_open() {
            let _ = done.send(Err(ProtocolError::ConnectionClosed));
            return completion;
        }
        if let Err(mpsc::error::SendError(op)) = self.ops.send(ChannelOp::Write { frame, done }) {
            if let ChannelOp::Write { done, .. } = op {
                let _ = done.send(Err(ProtocolError::ConnectionClosed));
            }
        }
        completion
    }

    /// Flush pending writes, then close. Returns `true` only for the call that closed it.
    pub fn flush_and_close(&self) -> bool {
        if !self.open.swap(false, Ordering::AcqRel) {
            return false;
        }
        debug!(connection = self.connection, "Closing channel");
        let _ = self.ops.send(ChannelOp::Close);
        self.closing.cancel();
        true
    }

    /// Resolves once the writer task has shut the socket down
    pub async fn stopped(&self) {
        self.stopped.cancelled().await;
    }
}

async fn run_writer<W>(
    mut writer: W,
    mut ops: mpsc::UnboundedReceiver<ChannelOp>,
    write_timeout: Option<Duration>,
    open: Arc<AtomicBool>,
    closing: CancellationToken,
    stopped: CancellationToken,
    connection: u64,
) where
    W: AsyncWrite + Send + Unpin + 'static,
{
    while let Some(op) = ops.recv().await {
        match op {
            ChannelOp::Write { frame, done } => {
                let result = tokio::select! {
                    result = write_frame(&mut writer, &frame, write_timeout) => result,
                    _ = flush_grace_elapsed(&closing) => {
                        debug!(connection, "Write still pending after close grace period, dropping it");
                        Err(ProtocolError::ConnectionClosed)
                    }
                };
                let failed = result.is_err();
                trace!(connection, bytes = frame.len(), ok = !failed, "Frame written");
                let _ = done.send(result);
                if failed {
                    break;
                }
            }
            ChannelOp::Close => break,
        }
    }

    open.store(false, Ordering::Release);
    if tokio::time::timeout(CLOSE_FLUSH_GRACE, writer.shutdown())
        .await
        .is_err()
    {
        debug!(connection, "Socket shutdown did not complete, dropping writer");
    }
    drop(writer);

    // Anything queued behind the close never reaches the socket
    ops.close();
    while let Ok(op) = ops.try_recv() {
        if let ChannelOp::Write { done, .. } = op {
            let _ = done.send(Err(ProtocolError::ConnectionClosed));
        }
    }
    stopped.cancel();
    debug!(connection, "Channel writer stopped");
}

async fn flush_grace_elapsed(closing: &CancellationToken) {
    closing.cancelled().await;
    tokio::time::sleep(CLOSE_FLUSH_GRACE).await;
}

async fn write_frame<W>(writer: &mut W, frame: &[u8], write_timeout: Option<Duration>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    with_deadline(write_timeout, ProtocolError::WriteTimeout, async {
        writer.write_all(frame).await?;
        writer.flush().await?;
        Ok::<(), ProtocolError>(())
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::AtomicUsize;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncReadExt, DuplexStream};

    const WAIT: Duration = Duration::from_secs(5);

    /// Counts completed shutdowns of the wrapped stream
    struct CountingWriter {
        inner: DuplexStream,
        shutdowns: Arc<AtomicUsize>,
    }

    impl AsyncWrite for CountingWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            let result = Pin::new(&mut self.inner).poll_shutdown(cx);
            if result.is_ready() {
                self.shutdowns.fetch_add(1, Ordering::SeqCst);
            }
            result
        }
    }

    fn counting_channel(
        capacity: usize,
        write_timeout: Option<Duration>,
    ) -> (Channel, DuplexStream, Arc<AtomicUsize>) {
        let (local, peer) = tokio::io::duplex(capacity);
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let writer = CountingWriter {
            inner: local,
            shutdowns: Arc::clone(&shutdowns),
        };
        (Channel::spawn(writer, write_timeout, 1), peer, shutdowns)
    }

    #[tokio::test]
    async fn test_close_flushes_then_shuts_down_once() {
        let (channel, mut peer, shutdowns) = counting_channel(1024, None);

        let completion = channel.write_and_flush(Bytes::from_static(b"abc"));
        assert!(channel.flush_and_close());
        assert!(!channel.flush_and_close());
        assert!(!channel.is_open());

        completion.await.unwrap().unwrap();
        tokio::time::timeout(WAIT, channel.stopped()).await.unwrap();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"abc");

        let late = channel.write_and_flush(Bytes::from_static(b"late"));
        assert!(matches!(
            late.await.unwrap(),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_does_not_wait_for_stalled_write() {
        // Peer never reads; with no write deadline only the close grace ends the write
        let (channel, _peer, shutdowns) = counting_channel(16, None);

        let completion = channel.write_and_flush(Bytes::from(vec![7u8; 200]));
        tokio::task::yield_now().await;
        assert!(channel.flush_and_close());

        tokio::time::timeout(WAIT, channel.stopped()).await.unwrap();
        assert!(matches!(
            completion.await.unwrap(),
            Err(ProtocolError::ConnectionClosed)
        ));
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_deadline_fails_write_and_stops_writer() {
        let (channel, _peer, _shutdowns) = counting_channel(16, Some(Duration::from_millis(50)));

        let completion = channel.write_and_flush(Bytes::from(vec![7u8; 200]));
        assert!(matches!(
            tokio::time::timeout(WAIT, completion).await.unwrap().unwrap(),
            Err(ProtocolError::WriteTimeout)
        ));

        tokio::time::timeout(WAIT, channel.stopped()).await.unwrap();
        assert!(!channel.is_open());
    }
}
