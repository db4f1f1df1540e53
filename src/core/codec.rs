//! # Packet Codec
//!
//! The single translation point between bytes and typed packets for one connection.
//!
//! [`PacketCodec::encode_packet`] and [`PacketCodec::decode_packet`] work on one unframed
//! packet (`varint id` + body). The [`Encoder`]/[`Decoder`] implementations add a varint
//! length prefix so the codec can drive a `Framed` byte stream:
//!
//! ```text
//! [Length(varint)] [Packet Id(varint)] [Body(Length - id bytes)]
//! ```
//!
//! Both directions look up the connection's protocol state at call time. Encoding is
//! transactional: a failure anywhere after the packet id lookup rewinds the destination to
//! where it was before the call.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::config::DEFAULT_MAX_FRAME_SIZE;
use crate::core::buffer::{peek_var_int, PacketBuffer};
use crate::error::{ProtocolError, Result};
use crate::protocol::context::ConnectionContext;
use crate::protocol::packet::{Direction, Envelope};
use crate::protocol::state::ProtocolState;

#[derive(Debug, Clone)]
pub struct PacketCodec {
    context: Arc<ConnectionContext>,
    max_frame_size: usize,
}

impl PacketCodec {
    pub fn new(context: Arc<ConnectionContext>) -> Self {
        Self {
            context,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn context(&self) -> &Arc<ConnectionContext> {
        &self.context
    }

    fn current_state(&self) -> Result<Arc<ProtocolState>> {
        self.context.state().ok_or(ProtocolError::ProtocolNotReady)
    }

    /// Append `varint id` + body of the envelope's packet to `dst`.
    ///
    /// On failure `dst` is truncated back to its length before the call and the cause is
    /// wrapped in [`ProtocolError::EncodeFailure`].
    pub fn encode_packet(&self, envelope: &mut Envelope, dst: &mut BytesMut) -> Result<()> {
        let state = self.current_state()?;
        let initial = dst.len();

        if let Err(cause) = self.write_packet(&state, envelope, dst) {
            dst.truncate(initial);
            debug!(
                connection = self.context.id(),
                packet = envelope.packet().name(),
                error = %cause,
                "Packet encoding failed, output rewound"
            );
            return Err(ProtocolError::EncodeFailure {
                packet_type: envelope.packet().name(),
                source: Box::new(cause),
            });
        }
        Ok(())
    }

    fn write_packet(
        &self,
        state: &ProtocolState,
        envelope: &mut Envelope,
        dst: &mut BytesMut,
    ) -> Result<()> {
        let packet_id = state.packet_id(envelope.packet())?;
        envelope.tag(Direction::ServerBound, &self.context);

        let mut buffer = PacketBuffer::new(dst);
        buffer.write_var_int(packet_id);
        envelope.packet().serialize(&mut buffer)
    }

    /// Decode one unframed packet occupying all of `frame`.
    ///
    /// Returns `Ok(None)` for an empty frame or an id the current state does not register.
    /// A registered packet must consume the frame exactly, otherwise the call fails with
    /// [`ProtocolError::TrailingBytes`].
    pub fn decode_packet(&self, frame: &mut BytesMut) -> Result<Option<Envelope>> {
        let state = self.current_state()?;
        if frame.is_empty() {
            return Ok(None);
        }

        let mut buffer = PacketBuffer::new(frame);
        let packet_id = buffer.read_var_int()?;

        let Some(packet) = state.construct_packet(packet_id, &mut buffer)? else {
            trace!(
                connection = self.context.id(),
                state = state.name(),
                packet_id,
                "Ignoring frame with unregistered packet id"
            );
            return Ok(None);
        };

        let leftover = buffer.readable_bytes();
        if leftover > 0 {
            return Err(ProtocolError::TrailingBytes {
                packet_type: packet.name(),
                leftover,
            });
        }

        Ok(Some(Envelope::tagged(
            packet,
            Direction::ClientBound,
            Arc::clone(&self.context),
        )))
    }

    /// Append a length-prefixed frame for the envelope's packet to `dst`
    pub fn encode_frame(&self, envelope: &mut Envelope, dst: &mut BytesMut) -> Result<()> {
        let mut body = BytesMut::new();
        self.encode_packet(envelope, &mut body)?;

        if body.len() > self.max_frame_size {
            return Err(ProtocolError::OversizedPacket(body.len()));
        }

        PacketBuffer::new(dst).write_var_int(body.len() as u32);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

impl Decoder for PacketCodec {
    type Item = Envelope;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // Frames that carry no packet are dropped and the next one is tried
        loop {
            let Some((length, prefix_len)) = peek_var_int(src)? else {
                return Ok(None);
            };
            let length = length as usize;
            if length > self.max_frame_size {
                return Err(ProtocolError::OversizedPacket(length));
            }

            let total = prefix_len + length;
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }

            src.advance(prefix_len);
            let mut frame = src.split_to(length);
            if let Some(envelope) = self.decode_packet(&mut frame)? {
                return Ok(Some(envelope));
            }
        }
    }
}

impl Encoder<Envelope> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, mut item: Envelope, dst: &mut BytesMut) -> Result<()> {
        self.encode_frame(&mut item, dst)
    }
}
