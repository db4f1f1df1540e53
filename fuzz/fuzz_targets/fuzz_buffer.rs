#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use packet_session::core::buffer::PacketBuffer;

fuzz_target!(|data: &[u8]| {
    // Mixed primitive reads over arbitrary bytes: errors are fine, panics are not
    let mut bytes = BytesMut::from(data);
    let mut buffer = PacketBuffer::new(&mut bytes);
    let _ = buffer.read_var_int();
    let _ = buffer.read_var_long();
    let _ = buffer.read_string(256);
    let _ = buffer.read_byte_array();
    let _ = buffer.read_f64();
    let _ = buffer.read_bool();
    let _ = buffer.read_remaining();
});
