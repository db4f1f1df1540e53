//! # Protocol Layer
//!
//! Packet definitions and the per-phase tables that give numeric ids their meaning.
//!
//! ## Components
//! - **Packet**: the [`Packet`] / [`DecodePacket`] traits, [`Direction`] and [`Envelope`]
//! - **State**: [`ProtocolState`], the immutable id ↔ type bijection of one phase
//! - **Context**: [`ConnectionContext`], which holds the state currently in force
//!
//! A connection typically starts in a handshake state and swaps to an established state
//! once negotiation completes. Swapping happens between frames, never during one.

pub mod context;
pub mod packet;
pub mod state;

pub use context::ConnectionContext;
pub use packet::{DecodePacket, Direction, Envelope, Packet};
pub use state::{ProtocolState, ProtocolStateBuilder};

#[cfg(test)]
mod tests;
