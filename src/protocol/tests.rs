// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use bytes::BytesMut;

use crate::core::buffer::PacketBuffer;
use crate::error::{ProtocolError, Result};
use crate::protocol::context::ConnectionContext;
use crate::protocol::packet::{DecodePacket, Direction, Envelope, Packet};
use crate::protocol::state::ProtocolState;

#[derive(Debug, PartialEq)]
struct Handshake {
    protocol_version: u32,
}

impl Packet for Handshake {
    fn serialize(&self, buffer: &mut PacketBuffer<'_>) -> Result<()> {
        buffer.write_var_int(self.protocol_version);
        Ok(())
    }
}

impl DecodePacket for Handshake {
    fn deserialize(buffer: &mut PacketBuffer<'_>) -> Result<Self> {
        Ok(Handshake {
            protocol_version: buffer.read_var_int()?,
        })
    }
}

#[derive(Debug, PartialEq)]
struct Position {
    x: f64,
    y: f64,
}

impl Packet for Position {
    fn serialize(&self, buffer: &mut PacketBuffer<'_>) -> Result<()> {
        buffer.write_f64(self.x);
        buffer.write_f64(self.y);
        Ok(())
    }
}

impl DecodePacket for Position {
    fn deserialize(buffer: &mut PacketBuffer<'_>) -> Result<Self> {
        Ok(Position {
            x: buffer.read_f64()?,
            y: buffer.read_f64()?,
        })
    }
}

fn handshake_state() -> ProtocolState {
    ProtocolState::builder("handshake")
        .register::<Handshake>(0x00)
        .build()
        .expect("valid state")
}

#[test]
fn test_state_lookup_both_ways() {
    let state = ProtocolState::builder("play")
        .register::<Handshake>(0x00)
        .register::<Position>(0x11)
        .build()
        .unwrap();

    assert_eq!(state.len(), 2);
    assert!(state.is_registered(0x11));
    assert_eq!(state.packet_id(&Position { x: 0.0, y: 0.0 }).unwrap(), 0x11);

    let mut bytes = BytesMut::new();
    Position { x: 1.5, y: -2.0 }
        .serialize(&mut PacketBuffer::new(&mut bytes))
        .unwrap();
    let mut buffer = PacketBuffer::new(&mut bytes);
    let packet = state
        .construct_packet(0x11, &mut buffer)
        .unwrap()
        .expect("registered id");
    assert_eq!(
        packet.downcast_ref::<Position>(),
        Some(&Position { x: 1.5, y: -2.0 })
    );
    assert_eq!(packet.name(), "Position");
}

#[test]
fn test_unregistered_type_and_id() {
    let state = handshake_state();

    match state.packet_id(&Position { x: 0.0, y: 0.0 }) {
        Err(ProtocolError::UnknownPacketType { packet_type, state }) => {
            assert_eq!(packet_type, "Position");
            assert_eq!(state, "handshake");
        }
        other => panic!("Expected UnknownPacketType, got {other:?}"),
    }

    let mut bytes = BytesMut::from(&[0x01u8, 0x02][..]);
    let mut buffer = PacketBuffer::new(&mut bytes);
    assert!(state.construct_packet(0x42, &mut buffer).unwrap().is_none());
    // Nothing is consumed for an unregistered id
    assert_eq!(buffer.readable_bytes(), 2);
}

#[test]
fn test_duplicate_id_rejected() {
    let result = ProtocolState::builder("broken")
        .register::<Handshake>(0x01)
        .register::<Position>(0x01)
        .build();
    assert!(matches!(result, Err(ProtocolError::RegistrationError(_))));
}

#[test]
fn test_duplicate_type_rejected() {
    let result = ProtocolState::builder("broken")
        .register::<Handshake>(0x01)
        .register::<Handshake>(0x02)
        .build();
    match result {
        Err(ProtocolError::RegistrationError(message)) => {
            assert!(message.contains("Handshake"));
            assert!(message.contains("broken"));
        }
        other => panic!("Expected RegistrationError, got {other:?}"),
    }
}

#[test]
fn test_body_failure_is_wrapped() {
    let state = ProtocolState::builder("play")
        .register::<Position>(0x11)
        .build()
        .unwrap();

    let mut bytes = BytesMut::from(&[0x00u8; 4][..]);
    let mut buffer = PacketBuffer::new(&mut bytes);
    let err = state.construct_packet(0x11, &mut buffer).unwrap_err();
    match &err {
        ProtocolError::DecodeFailure { packet_type, .. } => assert_eq!(*packet_type, "Position"),
        other => panic!("Expected DecodeFailure, got {other:?}"),
    }
    assert!(matches!(
        err.root_cause(),
        ProtocolError::BufferUnderflow { needed: 8, available: 4 }
    ));
}

#[test]
fn test_context_swaps_state() {
    let context = ConnectionContext::new();
    assert!(context.state().is_none());

    let handshake = Arc::new(handshake_state());
    assert!(context.set_state(Arc::clone(&handshake)).is_none());
    assert_eq!(context.state().unwrap().name(), "handshake");

    let play = Arc::new(
        ProtocolState::builder("play")
            .register::<Position>(0x00)
            .build()
            .unwrap(),
    );
    let previous = context.set_state(play).expect("previous state returned");
    assert!(Arc::ptr_eq(&previous, &handshake));
    assert_eq!(context.state().unwrap().name(), "play");

    assert!(context.clear_state().is_some());
    assert!(context.state().is_none());
}

#[test]
fn test_context_ids_are_unique() {
    let a = ConnectionContext::new();
    let b = ConnectionContext::new();
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_envelope_direction_set_once() {
    let context = Arc::new(ConnectionContext::new());
    let mut envelope = Envelope::from(Handshake {
        protocol_version: 1,
    });
    assert_eq!(envelope.direction(), None);

    envelope.tag(Direction::ServerBound, &context);
    envelope.tag(Direction::ClientBound, &context);
    assert_eq!(envelope.direction(), Some(Direction::ServerBound));
    assert_eq!(envelope.context().map(|c| c.id()), Some(context.id()));
    assert_eq!(Direction::ServerBound.flip(), Direction::ClientBound);
}
