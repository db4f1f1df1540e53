//! # Protocol State
//!
//! A protocol state is the dispatch table of one connection phase: a bijection between
//! packet types and numeric ids. States are built once and never mutated; a connection moves
//! to a new phase by swapping the whole state in its [`ConnectionContext`].
//!
//! ## Example
//! ```rust
//! use packet_session::core::buffer::PacketBuffer;
//! use packet_session::error::Result;
//! use packet_session::protocol::{DecodePacket, Packet, ProtocolState};
//!
//! #[derive(Debug)]
//! struct KeepAlive(u64);
//!
//! impl Packet for KeepAlive {
//!     fn serialize(&self, buffer: &mut PacketBuffer<'_>) -> Result<()> {
//!         buffer.write_u64(self.0);
//!         Ok(())
//!     }
//! }
//!
//! impl DecodePacket for KeepAlive {
//!     fn deserialize(buffer: &mut PacketBuffer<'_>) -> Result<Self> {
//!         Ok(KeepAlive(buffer.read_u64()?))
//!     }
//! }
//!
//! let state = ProtocolState::builder("play")
//!     .register::<KeepAlive>(0x21)
//!     .build()
//!     .unwrap();
//! assert_eq!(state.packet_id(&KeepAlive(1)).unwrap(), 0x21);
//! ```
//!
//! [`ConnectionContext`]: crate::protocol::context::ConnectionContext

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::core::buffer::PacketBuffer;
use crate::error::{ProtocolError, Result};
use crate::protocol::packet::{short_type_name, DecodePacket, Packet};

type Constructor = fn(&mut PacketBuffer<'_>) -> Result<Box<dyn Packet>>;

struct Registration {
    name: &'static str,
    construct: Constructor,
}

fn construct<P: DecodePacket>(buffer: &mut PacketBuffer<'_>) -> Result<Box<dyn Packet>> {
    Ok(Box::new(P::deserialize(buffer)?))
}

/// Immutable id ↔ packet type table for one connection phase
pub struct ProtocolState {
    name: String,
    ids: HashMap<TypeId, u32>,
    registrations: HashMap<u32, Registration>,
}

impl ProtocolState {
    pub fn builder(name: impl Into<String>) -> ProtocolStateBuilder {
        ProtocolStateBuilder {
            name: name.into(),
            ids: HashMap::new(),
            registrations: HashMap::new(),
            conflicts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn is_registered(&self, packet_id: u32) -> bool {
        self.registrations.contains_key(&packet_id)
    }

    /// Id of `packet`'s concrete type in this state
    pub fn packet_id(&self, packet: &dyn Packet) -> Result<u32> {
        self.ids
            .get(&packet.packet_type_id())
            .copied()
            .ok_or_else(|| ProtocolError::UnknownPacketType {
                packet_type: packet.name(),
                state: self.name.clone(),
            })
    }

    /// Construct the packet registered under `packet_id` from the buffer's readable bytes.
    ///
    /// An id with no registration yields `Ok(None)`; ids may be reserved for keep-alive or
    /// padding frames that carry nothing for the application.
    pub fn construct_packet(
        &self,
        packet_id: u32,
        buffer: &mut PacketBuffer<'_>,
    ) -> Result<Option<Box<dyn Packet>>> {
        let Some(registration) = self.registrations.get(&packet_id) else {
            return Ok(None);
        };

        (registration.construct)(buffer)
            .map(Some)
            .map_err(|source| ProtocolError::DecodeFailure {
                packet_type: registration.name,
                source: Box::new(source),
            })
    }
}

impl fmt::Debug for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut packets: Vec<_> = self
            .registrations
            .iter()
            .map(|(id, registration)| (*id, registration.name))
            .collect();
        packets.sort_unstable_by_key(|(id, _)| *id);
        f.debug_struct("ProtocolState")
            .field("name", &self.name)
            .field("packets", &packets)
            .finish()
    }
}

/// Collects registrations and checks the table is a bijection
pub struct ProtocolStateBuilder {
    name: String,
    ids: HashMap<TypeId, u32>,
    registrations: HashMap<u32, Registration>,
    conflicts: Vec<String>,
}

impl ProtocolStateBuilder {
    pub fn register<P: DecodePacket>(mut self, packet_id: u32) -> Self {
        let name = short_type_name(std::any::type_name::<P>());

        if let Some(existing) = self.registrations.get(&packet_id) {
            self.conflicts.push(format!(
                "id {packet_id:#04x} registered for both {} and {name}",
                existing.name
            ));
            return self;
        }
        if let Some(existing_id) = self.ids.get(&TypeId::of::<P>()) {
            self.conflicts.push(format!(
                "{name} registered under both {existing_id:#04x} and {packet_id:#04x}"
            ));
            return self;
        }

        self.ids.insert(TypeId::of::<P>(), packet_id);
        self.registrations.insert(
            packet_id,
            Registration {
                name,
                construct: construct::<P>,
            },
        );
        self
    }

    pub fn build(self) -> Result<ProtocolState> {
        if !self.conflicts.is_empty() {
            return Err(ProtocolError::RegistrationError(format!(
                "protocol state '{}': {}",
                self.name,
                self.conflicts.join("; ")
            )));
        }

        Ok(ProtocolState {
            name: self.name,
            ids: self.ids,
            registrations: self.registrations,
        })
    }
}
