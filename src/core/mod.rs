//! # Core Protocol Components
//!
//! Low-level byte handling: the packet buffer with its varint encoding, and the codec that
//! turns frames into typed packets.
//!
//! ## Components
//! - **Buffer**: cursor over a byte region with protocol primitive encodings
//! - **Codec**: state-dependent packet translation plus a Tokio codec for framed streams
//!
//! ## Wire Format
//! ```text
//! [Length(varint)] [Packet Id(varint)] [Body]
//! ```
//!
//! ## Safety Limits
//! - VarInts longer than 5 bytes are rejected
//! - Frame length is validated against the configured maximum before buffering
//! - A decoded packet must consume its frame exactly

pub mod buffer;
pub mod codec;
