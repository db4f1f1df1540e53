#![no_main]

use std::sync::Arc;

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use packet_session::core::buffer::PacketBuffer;
use packet_session::core::codec::PacketCodec;
use packet_session::error::Result;
use packet_session::protocol::{ConnectionContext, DecodePacket, Packet, ProtocolState};
use tokio_util::codec::Decoder;

#[derive(Debug)]
struct Blob {
    name: String,
    data: Vec<u8>,
}

impl Packet for Blob {
    fn serialize(&self, buffer: &mut PacketBuffer<'_>) -> Result<()> {
        buffer.write_string(&self.name);
        buffer.write_byte_array(&self.data);
        Ok(())
    }
}

impl DecodePacket for Blob {
    fn deserialize(buffer: &mut PacketBuffer<'_>) -> Result<Self> {
        Ok(Blob {
            name: buffer.read_string(64)?,
            data: buffer.read_byte_array()?,
        })
    }
}

fuzz_target!(|data: &[u8]| {
    // Frame decoding must never panic or loop forever on hostile input
    let Ok(state) = ProtocolState::builder("fuzz").register::<Blob>(0x00).build() else {
        return;
    };
    let mut codec = PacketCodec::new(Arc::new(ConnectionContext::with_state(Arc::new(state))))
        .with_max_frame_size(4096);
    let mut src = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut src) {}
});
