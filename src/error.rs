//! # Error Types
//!
//! Error handling for the packet codec and the connection session.
//!
//! ## Error Categories
//! - **Programming errors**: [`ProtocolError::ProtocolNotReady`], registration conflicts
//! - **Encode errors**: [`ProtocolError::UnknownPacketType`] wrapped in
//!   [`ProtocolError::EncodeFailure`]
//! - **Frame violations**: [`ProtocolError::MalformedVarInt`], [`ProtocolError::TrailingBytes`],
//!   [`ProtocolError::BufferUnderflow`], [`ProtocolError::OversizedPacket`]
//! - **Transport failures**: I/O errors and the connect/read/write deadlines
//!
//! Transport failures never escape a session: they are classified into a short reason
//! string and turned into a disconnect (see [`crate::session::failure`]).
//!
//! ## Example Usage
//! ```rust
//! use packet_session::core::buffer::PacketBuffer;
//! use packet_session::error::ProtocolError;
//! use bytes::BytesMut;
//!
//! let mut bytes = BytesMut::from(&[0x80u8, 0x80, 0x80, 0x80, 0x80, 0x80][..]);
//! let mut buffer = PacketBuffer::new(&mut bytes);
//! assert!(matches!(buffer.read_var_int(), Err(ProtocolError::MalformedVarInt)));
//! ```

use std::io;
use thiserror::Error;

// ProtocolError is the primary error type for all codec and session operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Cannot process packets before a protocol state is attached")]
    ProtocolNotReady,

    #[error("Packet {packet_type} is not registered in protocol state '{state}'")]
    UnknownPacketType {
        packet_type: &'static str,
        state: String,
    },

    #[error("Unable to encode packet {packet_type}: {source}")]
    EncodeFailure {
        packet_type: &'static str,
        #[source]
        source: Box<ProtocolError>,
    },

    #[error("Unable to decode packet {packet_type}: {source}")]
    DecodeFailure {
        packet_type: &'static str,
        #[source]
        source: Box<ProtocolError>,
    },

    #[error("Malformed varint")]
    MalformedVarInt,

    #[error("Cannot read packet {packet_type}: {leftover} trailing bytes")]
    TrailingBytes {
        packet_type: &'static str,
        leftover: usize,
    },

    #[error("Buffer underflow: needed {needed} bytes, {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Registration error: {0}")]
    RegistrationError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Session already has a channel or is disconnected")]
    ChannelRejected,

    #[error("Connection timed out")]
    ConnectTimeout,

    #[error("Read timed out")]
    ReadTimeout,

    #[error("Write timed out")]
    WriteTimeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Innermost error of an encode/decode wrapper chain
    pub fn root_cause(&self) -> &ProtocolError {
        match self {
            ProtocolError::EncodeFailure { source, .. }
            | ProtocolError::DecodeFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
