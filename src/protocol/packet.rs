//! Packet traits, direction tags and the envelope that carries packets through the codec.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::buffer::PacketBuffer;
use crate::error::Result;
use crate::protocol::context::ConnectionContext;
use crate::session::Session;

/// Which way a packet travelled over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Decoded from the peer
    ClientBound,
    /// Encoded for the peer
    ServerBound,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::ClientBound => Direction::ServerBound,
            Direction::ServerBound => Direction::ClientBound,
        }
    }
}

/// Object-safe access to the concrete type behind a `dyn Packet`
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A typed protocol message.
///
/// Implementors write their own body in [`serialize`](Packet::serialize); the codec takes care
/// of the packet id. Decodable packets additionally implement [`DecodePacket`].
pub trait Packet: AsAny + Send + Sync + fmt::Debug {
    /// Write the packet body
    fn serialize(&self, buffer: &mut PacketBuffer<'_>) -> Result<()>;

    /// Priority packets bypass the session's task queue and are written immediately
    fn has_sending_priority(&self) -> bool {
        false
    }

    /// Called on the session's receive path for inbound packets
    fn handle(&self, _session: &Session) {}

    /// Called once the packet has been written to the channel
    fn on_sent(&self, _session: &Session) {}

    /// Short type name used in logs and errors
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// A packet that can be constructed from its body bytes
pub trait DecodePacket: Packet + Sized {
    fn deserialize(buffer: &mut PacketBuffer<'_>) -> Result<Self>;
}

impl dyn Packet {
    /// Type id of the concrete packet type
    pub fn packet_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn is<T: Packet>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Packet>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    // Generic parameters may themselves contain paths; only trim the outer one
    let end = full.find('<').unwrap_or(full.len());
    match full[..end].rfind("::") {
        Some(index) => &full[index + 2..],
        None => full,
    }
}

/// A packet together with its direction tag and connection context.
///
/// Outbound envelopes start untagged; the codec tags them when encoding. Decoded envelopes
/// come out tagged [`Direction::ClientBound`]. The direction is set at most once.
pub struct Envelope {
    packet: Box<dyn Packet>,
    direction: Option<Direction>,
    context: Option<Arc<ConnectionContext>>,
}

impl Envelope {
    pub fn new(packet: Box<dyn Packet>) -> Self {
        Self {
            packet,
            direction: None,
            context: None,
        }
    }

    pub(crate) fn tagged(
        packet: Box<dyn Packet>,
        direction: Direction,
        context: Arc<ConnectionContext>,
    ) -> Self {
        Self {
            packet,
            direction: Some(direction),
            context: Some(context),
        }
    }

    pub(crate) fn tag(&mut self, direction: Direction, context: &Arc<ConnectionContext>) {
        self.direction.get_or_insert(direction);
        if self.context.is_none() {
            self.context = Some(Arc::clone(context));
        }
    }

    pub fn packet(&self) -> &dyn Packet {
        self.packet.as_ref()
    }

    pub fn into_packet(self) -> Box<dyn Packet> {
        self.packet
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn context(&self) -> Option<&Arc<ConnectionContext>> {
        self.context.as_ref()
    }

    pub fn downcast_ref<T: Packet>(&self) -> Option<&T> {
        self.packet().downcast_ref::<T>()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("packet", &self.packet)
            .field("direction", &self.direction)
            .field("connection", &self.context.as_ref().map(|c| c.id()))
            .finish()
    }
}

impl<P: Packet> From<P> for Envelope {
    fn from(packet: P) -> Self {
        Envelope::new(Box::new(packet))
    }
}
