//! Per-connection context shared by the codec, the session and every packet envelope.
//!
//! The context owns the connection's *current* [`ProtocolState`]. The state is swapped as a
//! whole (`Arc` replacement under a lock) so a frame is always processed against one
//! complete table, and the codec re-reads it on every call instead of caching it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::protocol::state::ProtocolState;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct ConnectionContext {
    id: u64,
    peer_addr: RwLock<Option<SocketAddr>>,
    state: RwLock<Option<Arc<ProtocolState>>>,
}

impl Default for ConnectionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionContext {
    /// New context with a process-unique id and no protocol state
    pub fn new() -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer_addr: RwLock::new(None),
            state: RwLock::new(None),
        }
    }

    pub fn with_state(state: Arc<ProtocolState>) -> Self {
        let context = Self::new();
        context.set_state(state);
        context
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        *self
            .peer_addr
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_peer_addr(&self, addr: SocketAddr) {
        *self
            .peer_addr
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(addr);
    }

    /// Current protocol state, if one has been attached
    pub fn state(&self) -> Option<Arc<ProtocolState>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the protocol state, returning the previous one
    pub fn set_state(&self, state: Arc<ProtocolState>) -> Option<Arc<ProtocolState>> {
        debug!(connection = self.id, state = state.name(), "Switching protocol state");
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(state)
    }

    /// Detach the protocol state; the codec refuses to work until a new one is set
    pub fn clear_state(&self) -> Option<Arc<ProtocolState>> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
