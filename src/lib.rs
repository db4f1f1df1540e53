//! # Packet Session
//!
//! State-dependent binary packet codec and connection session for persistent byte streams.
//!
//! ## Architecture
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────────┐
//! │   Session    │──▶│  PacketCodec  │──▶│  ProtocolState   │
//! │ (lifecycle,  │   │ (frame ⇄ typed│   │ (id ⇄ type table │
//! │  send paths) │   │    packet)    │   │  of one phase)   │
//! └──────┬───────┘   └───────────────┘   └──────────────────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Channel    │  single writer task per connection
//! └──────────────┘
//! ```
//!
//! ## Modules
//! - [`core`]: packet buffer with varint primitives, and the codec
//! - [`protocol`]: packet traits, protocol states and the connection context
//! - [`session`]: session lifecycle, outbound ordering and failure classification
//! - [`transport`]: TCP connect and accept loops
//! - [`config`]: TOML / environment configuration
//! - [`utils`]: logging, metrics and deadlines
//!
//! ## Quick Start
//! ```rust
//! use std::sync::Arc;
//! use bytes::BytesMut;
//! use packet_session::core::buffer::PacketBuffer;
//! use packet_session::core::codec::PacketCodec;
//! use packet_session::error::Result;
//! use packet_session::protocol::{ConnectionContext, DecodePacket, Envelope, Packet, ProtocolState};
//!
//! #[derive(Debug, PartialEq)]
//! struct Ping(u32);
//!
//! impl Packet for Ping {
//!     fn serialize(&self, buffer: &mut PacketBuffer<'_>) -> Result<()> {
//!         buffer.write_var_int(self.0);
//!         Ok(())
//!     }
//! }
//!
//! impl DecodePacket for Ping {
//!     fn deserialize(buffer: &mut PacketBuffer<'_>) -> Result<Self> {
//!         Ok(Ping(buffer.read_var_int()?))
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let state = Arc::new(ProtocolState::builder("play").register::<Ping>(0x01).build()?);
//! let codec = PacketCodec::new(Arc::new(ConnectionContext::with_state(state)));
//!
//! let mut bytes = BytesMut::new();
//! codec.encode_packet(&mut Envelope::from(Ping(300)), &mut bytes)?;
//! assert_eq!(&bytes[..], &[0x01, 0xAC, 0x02]);
//!
//! let decoded = codec.decode_packet(&mut bytes)?.expect("registered id");
//! assert_eq!(decoded.downcast_ref::<Ping>(), Some(&Ping(300)));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod utils;

pub use config::NetworkConfig;
pub use error::{ProtocolError, Result};
pub use protocol::{
    ConnectionContext, DecodePacket, Direction, Envelope, Packet, ProtocolState,
    ProtocolStateBuilder,
};
pub use session::{Session, SessionHandler, SessionStatus};
