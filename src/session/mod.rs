//! # Connection Session
//!
//! One [`Session`] per physical connection. The session binds a byte stream, runs the inbound
//! read loop, serializes outbound sends and funnels every failure into a single disconnect.
//!
//! ## Lifecycle
//! ```text
//! Idle ──attach──▶ Active ──disconnect / EOF / failure──▶ Disconnected
//! ```
//! - A second [`attach`](Session::attach) is refused and the new stream is shut down
//! - The disconnect latch is an atomic compare-and-set; only the winner closes the channel
//! - `Disconnected` is terminal
//!
//! ## Outbound Paths
//! - **Ordered**: ordinary packets are encoded and written from the session's
//!   [`TaskQueue`], one at a time, in submission order
//! - **Priority**: packets with [`Packet::has_sending_priority`] are encoded and handed to the
//!   channel immediately. Their position relative to queued packets is unspecified
//!
//! Both paths feed the same [`Channel`] writer. When a write completes the packet's
//! [`Packet::on_sent`] hook runs; a failed write is classified and disconnects the session.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use packet_session::config::{SessionConfig, TransportConfig};
//! use packet_session::session::{PacketHandler, Session};
//! use packet_session::transport::tcp;
//!
//! # async fn run(state: Arc<packet_session::protocol::ProtocolState>) -> packet_session::error::Result<()> {
//! let session = Session::new(Arc::new(PacketHandler), SessionConfig::default());
//! session.set_protocol_state(state);
//! tcp::connect("127.0.0.1:25565", &session, &TransportConfig::default()).await?;
//! session.closed().await;
//! println!("disconnected: {:?}", session.disconnect_reason());
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod failure;
pub mod handler;
pub mod task_queue;

pub use channel::Channel;
pub use handler::{PacketHandler, SessionHandler};
pub use task_queue::TaskQueue;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::core::codec::PacketCodec;
use crate::error::ProtocolError;
use crate::protocol::context::ConnectionContext;
use crate::protocol::packet::{Envelope, Packet};
use crate::protocol::state::ProtocolState;
use crate::utils::metrics::Metrics;
use crate::utils::timeout::with_deadline;

use channel::WriteCompletion;

/// Observable lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No channel bound yet
    Idle,
    /// Channel bound and usable
    Active,
    /// Terminal
    Disconnected,
}

/// Cheaply cloneable handle to one connection's session
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    context: Arc<ConnectionContext>,
    config: SessionConfig,
    handler: Arc<dyn SessionHandler>,
    metrics: Arc<Metrics>,
    runtime: Handle,
    channel: Mutex<Option<Channel>>,
    disconnected: AtomicBool,
    reason: OnceLock<String>,
    closed: CancellationToken,
    tasks: TaskQueue,
}

impl Session {
    /// Create an idle session. Must be called from within a Tokio runtime.
    pub fn new(handler: Arc<dyn SessionHandler>, config: SessionConfig) -> Self {
        Self::with_metrics(handler, config, Arc::new(Metrics::new()))
    }

    /// Create an idle session reporting into shared `metrics`
    pub fn with_metrics(
        handler: Arc<dyn SessionHandler>,
        config: SessionConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                context: Arc::new(ConnectionContext::new()),
                config,
                handler,
                metrics,
                runtime: Handle::current(),
                channel: Mutex::new(None),
                disconnected: AtomicBool::new(false),
                reason: OnceLock::new(),
                closed: CancellationToken::new(),
                tasks: TaskQueue::spawn("session-outbound"),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.context.id()
    }

    pub fn context(&self) -> &Arc<ConnectionContext> {
        &self.inner.context
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    /// Switch protocol phase; applies from the next frame encoded or decoded
    pub fn set_protocol_state(&self, state: Arc<ProtocolState>) {
        self.inner.context.set_state(state);
    }

    pub fn protocol_state(&self) -> Option<Arc<ProtocolState>> {
        self.inner.context.state()
    }

    /// A codec bound to this session's connection context
    pub fn codec(&self) -> PacketCodec {
        PacketCodec::new(Arc::clone(&self.inner.context))
            .with_max_frame_size(self.inner.config.max_frame_size)
    }

    fn lock_channel(&self) -> MutexGuard<'_, Option<Channel>> {
        self.inner
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn channel(&self) -> Option<Channel> {
        self.lock_channel().clone()
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_disconnected() {
            SessionStatus::Disconnected
        } else if self.lock_channel().is_some() {
            SessionStatus::Active
        } else {
            SessionStatus::Idle
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.inner.disconnected.load(Ordering::Acquire)
    }

    /// Active, not disconnected, and the channel is still open
    pub fn is_connected(&self) -> bool {
        !self.is_disconnected() && self.channel().is_some_and(|channel| channel.is_open())
    }

    pub fn disconnect_reason(&self) -> Option<&str> {
        self.inner.reason.get().map(String::as_str)
    }

    /// Resolves once the session has disconnected and its channel finished flushing
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await;
        if let Some(channel) = self.channel() {
            channel.stopped().await;
        }
    }

    /// Bind `stream` as this session's channel.
    ///
    /// Returns `false` and shuts `stream` down if the session already has a channel or has
    /// disconnected; the session itself is left untouched.
    pub fn attach<S>(&self, stream: S) -> bool
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let mut slot = self.lock_channel();
        if self.is_disconnected() || slot.is_some() {
            drop(slot);
            self.inner.metrics.channel_rejected();
            warn!(
                session = self.id(),
                status = ?self.status(),
                "Rejecting channel for a session that is already bound or disconnected"
            );
            self.inner.runtime.spawn(async move {
                let mut stream = stream;
                let _ = stream.shutdown().await;
            });
            return false;
        }

        let (reader, writer) = tokio::io::split(stream);
        let _guard = self.inner.runtime.enter();
        *slot = Some(Channel::spawn(
            writer,
            self.inner.config.write_timeout(),
            self.id(),
        ));
        drop(slot);

        self.inner.metrics.session_activated();
        info!(
            session = self.id(),
            peer = ?self.inner.context.peer_addr(),
            "Session active"
        );
        self.inner.handler.session_active(self);

        self.inner.runtime.spawn(read_loop(self.clone(), reader));
        true
    }

    /// Send `packet` on this session. Dropped silently if no channel is bound.
    pub fn send_packet<P: Packet>(&self, packet: P) {
        self.send_boxed(Box::new(packet));
    }

    pub fn send_boxed(&self, packet: Box<dyn Packet>) {
        if self.channel().is_none() {
            self.inner.metrics.send_dropped();
            debug!(
                session = self.id(),
                packet = packet.name(),
                "Dropping packet sent before the session became active"
            );
            return;
        }

        let envelope = Envelope::new(packet);
        if envelope.packet().has_sending_priority() {
            self.inner.metrics.priority_send();
            self.write_now(envelope);
        } else {
            let session = self.clone();
            self.inner
                .tasks
                .execute(async move { session.write_queued(envelope).await });
        }
    }

    /// Run `task` on the session's ordered task queue
    pub fn execute_task<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.tasks.execute_fn(task)
    }

    fn write_now(&self, mut envelope: Envelope) {
        if let Some(pending) = self.start_write(&mut envelope) {
            let session = self.clone();
            self.inner
                .runtime
                .spawn(async move { session.finish_write(envelope, pending).await });
        }
    }

    async fn write_queued(&self, mut envelope: Envelope) {
        if self.is_disconnected() {
            trace!(
                session = self.id(),
                packet = envelope.packet().name(),
                "Skipping queued packet after disconnect"
            );
            return;
        }
        if let Some(pending) = self.start_write(&mut envelope) {
            self.finish_write(envelope, pending).await;
        }
    }

    fn start_write(&self, envelope: &mut Envelope) -> Option<(WriteCompletion, usize)> {
        let channel = self.channel()?;

        let mut frame = BytesMut::new();
        if let Err(error) = self.codec().encode_frame(envelope, &mut frame) {
            self.inner.metrics.encode_error();
            self.exception_caught(&error);
            return None;
        }

        let length = frame.len();
        Some((channel.write_and_flush(frame.freeze()), length))
    }

    async fn finish_write(&self, envelope: Envelope, pending: (WriteCompletion, usize)) {
        let (completion, length) = pending;
        match completion.await {
            Ok(Ok(())) => {
                self.inner.metrics.packet_sent(length as u64);
                trace!(
                    session = self.id(),
                    packet = envelope.packet().name(),
                    bytes = length,
                    "Packet sent"
                );
                envelope.packet().on_sent(self);
            }
            Ok(Err(error)) => self.exception_caught(&error),
            Err(_) => self.exception_caught(&ProtocolError::ConnectionClosed),
        }
    }

    fn packet_received(&self, envelope: Envelope) {
        self.inner.metrics.packet_received();
        trace!(
            session = self.id(),
            packet = envelope.packet().name(),
            "Packet received"
        );
        self.inner.handler.packet_received(self, envelope);
    }

    /// Classify `error` and disconnect with the resulting reason
    pub fn exception_caught(&self, error: &ProtocolError) {
        if self.is_disconnected() {
            debug!(session = self.id(), error = %error, "Failure after disconnect ignored");
            return;
        }

        self.inner.metrics.transport_error();
        let reason = failure::classify(error);
        warn!(session = self.id(), error = %error, reason = %reason, "Session failure");
        self.disconnect(reason);
    }

    fn channel_inactive(&self) {
        self.disconnect(failure::CONNECTION_CLOSED);
    }

    /// Disconnect with `reason`. Only the first call has an effect; it returns `true`.
    pub fn disconnect(&self, reason: impl Into<String>) -> bool {
        if self
            .inner
            .disconnected
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let reason = reason.into();
        let _ = self.inner.reason.set(reason.clone());

        let channel = self.channel();
        if let Some(channel) = &channel {
            if channel.is_open() {
                channel.flush_and_close();
            }
        }
        self.inner.closed.cancel();

        self.inner.metrics.session_disconnected(channel.is_some());
        info!(session = self.id(), reason = %reason, "Session disconnected");
        self.inner.handler.session_disconnected(self, &reason);
        true
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("status", &self.status())
            .field("reason", &self.disconnect_reason())
            .finish()
    }
}

enum ReadEvent {
    Stopped,
    Frame(crate::error::Result<Option<crate::error::Result<Envelope>>>),
}

async fn read_loop<R>(session: Session, reader: R)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut frames = FramedRead::new(reader, session.codec());
    let read_timeout = session.inner.config.read_timeout();

    loop {
        let event = tokio::select! {
            biased;
            _ = session.inner.closed.cancelled() => ReadEvent::Stopped,
            next = with_deadline(read_timeout, ProtocolError::ReadTimeout, async {
                Ok::<_, ProtocolError>(frames.next().await)
            }) => ReadEvent::Frame(next),
        };

        match event {
            ReadEvent::Stopped => break,
            ReadEvent::Frame(Ok(Some(Ok(envelope)))) => session.packet_received(envelope),
            ReadEvent::Frame(Ok(Some(Err(error)))) => {
                if !matches!(error, ProtocolError::Io(_)) {
                    session.inner.metrics.decode_error();
                }
                session.exception_caught(&error);
                break;
            }
            ReadEvent::Frame(Ok(None)) => {
                session.channel_inactive();
                break;
            }
            ReadEvent::Frame(Err(timeout)) => {
                session.exception_caught(&timeout);
                break;
            }
        }
    }
    trace!(session = session.id(), "Read loop stopped");
}
