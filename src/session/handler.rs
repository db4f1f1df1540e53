//! Application callbacks for session lifecycle events.

use crate::protocol::packet::Envelope;
use crate::session::Session;

/// Receives lifecycle events from a [`Session`].
///
/// Callbacks run on the connection's event path (or the task queue for write completions)
/// and must not block. Heavy work belongs in [`Session::execute_task`].
pub trait SessionHandler: Send + Sync + 'static {
    /// The session bound its channel and is ready to send
    fn session_active(&self, _session: &Session) {}

    /// A packet was decoded. The default hands it to [`Packet::handle`](crate::protocol::Packet::handle).
    fn packet_received(&self, session: &Session, envelope: Envelope) {
        envelope.packet().handle(session);
    }

    /// The session disconnected; called exactly once
    fn session_disconnected(&self, _session: &Session, _reason: &str) {}
}

/// Handler that only forwards packets to [`Packet::handle`](crate::protocol::Packet::handle)
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketHandler;

impl SessionHandler for PacketHandler {}
