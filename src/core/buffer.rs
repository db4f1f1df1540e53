//! # Packet Buffer
//!
//! A cursor over a caller-supplied [`BytesMut`] with the primitive encodings packet bodies
//! are built from.
//!
//! The buffer keeps two independent cursors: the reader index (an offset into the region)
//! and the writer index (the end of the region). Writes append, reads advance the reader
//! index. The underlying storage is only borrowed for the lifetime of the buffer.
//!
//! ## Encodings
//! - **VarInt**: little-endian base-128, 7 bits per byte, high bit set = more bytes follow,
//!   at most 5 bytes for a 32-bit value
//! - **VarLong**: same scheme, at most 10 bytes for a 64-bit value
//! - **Fixed-width numbers**: big-endian
//! - **Strings / byte arrays**: varint byte length followed by the bytes
//! - **Serde values**: varint length followed by the bincode encoding
//!
//! ## Example
//! ```rust
//! use bytes::BytesMut;
//! use packet_session::core::buffer::PacketBuffer;
//!
//! let mut bytes = BytesMut::new();
//! let mut buffer = PacketBuffer::new(&mut bytes);
//! buffer.write_var_int(300);
//! buffer.write_string("hello");
//!
//! assert_eq!(buffer.read_var_int().unwrap(), 300);
//! assert_eq!(buffer.read_string(16).unwrap(), "hello");
//! assert_eq!(buffer.readable_bytes(), 0);
//! ```

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProtocolError, Result};

/// Maximum encoded size of a 32-bit varint
pub const MAX_VAR_INT_BYTES: usize = 5;

/// Maximum encoded size of a 64-bit varint
pub const MAX_VAR_LONG_BYTES: usize = 10;

/// Default upper bound for string lengths, in bytes
pub const DEFAULT_MAX_STRING_LENGTH: usize = 32_767;

const SEGMENT_BITS: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// Number of bytes `value` occupies once varint-encoded
pub fn var_int_size(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Peek a varint at the start of `bytes` without consuming it.
///
/// Returns `Ok(None)` when the sequence is not yet terminated and fewer than
/// [`MAX_VAR_INT_BYTES`] bytes are available, which lets stream decoders wait for more data.
pub fn peek_var_int(bytes: &[u8]) -> Result<Option<(u32, usize)>> {
    let mut value: u32 = 0;
    for (position, byte) in bytes.iter().take(MAX_VAR_INT_BYTES).enumerate() {
        value |= u32::from(byte & SEGMENT_BITS) << (7 * position);
        if byte & CONTINUE_BIT == 0 {
            return Ok(Some((value, position + 1)));
        }
    }

    if bytes.len() >= MAX_VAR_INT_BYTES {
        Err(ProtocolError::MalformedVarInt)
    } else {
        Ok(None)
    }
}

/// Read/write cursor over a borrowed byte region
pub struct PacketBuffer<'a> {
    inner: &'a mut BytesMut,
    reader_index: usize,
}

impl<'a> PacketBuffer<'a> {
    /// Wrap `inner`; reading starts at its first byte, writing appends after its last
    pub fn new(inner: &'a mut BytesMut) -> Self {
        Self {
            inner,
            reader_index: 0,
        }
    }

    pub fn reader_index(&self) -> usize {
        self.reader_index
    }

    pub fn writer_index(&self) -> usize {
        self.inner.len()
    }

    /// Rewind the writer index to `index`, discarding everything written after it.
    ///
    /// Moving the writer index forward is not supported and leaves the buffer untouched.
    pub fn set_writer_index(&mut self, index: usize) {
        if index < self.inner.len() {
            self.inner.truncate(index);
            self.reader_index = self.reader_index.min(index);
        }
    }

    /// Bytes between the reader index and the writer index
    pub fn readable_bytes(&self) -> usize {
        self.inner.len() - self.reader_index
    }

    fn take(&mut self, needed: usize) -> Result<&[u8]> {
        let available = self.readable_bytes();
        if needed > available {
            return Err(ProtocolError::BufferUnderflow { needed, available });
        }
        let start = self.reader_index;
        self.reader_index += needed;
        Ok(&self.inner[start..start + needed])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Variable-length integers
    // ------------------------------------------------------------------

    pub fn read_var_int(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for position in 0..MAX_VAR_INT_BYTES {
            let byte = self
                .read_u8()
                .map_err(|_| ProtocolError::MalformedVarInt)?;
            value |= u32::from(byte & SEGMENT_BITS) << (7 * position);
            if byte & CONTINUE_BIT == 0 {
                return Ok(value);
            }
        }
        Err(ProtocolError::MalformedVarInt)
    }

    pub fn write_var_int(&mut self, value: u32) {
        let mut value = value;
        loop {
            if value & !u32::from(SEGMENT_BITS) == 0 {
                self.inner.put_u8(value as u8);
                return;
            }
            self.inner
                .put_u8((value as u8 & SEGMENT_BITS) | CONTINUE_BIT);
            value >>= 7;
        }
    }

    /// Signed view of [`read_var_int`](Self::read_var_int) (two's complement, 5 bytes for negatives)
    pub fn read_var_i32(&mut self) -> Result<i32> {
        self.read_var_int().map(|value| value as i32)
    }

    pub fn write_var_i32(&mut self, value: i32) {
        self.write_var_int(value as u32);
    }

    pub fn read_var_long(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        for position in 0..MAX_VAR_LONG_BYTES {
            let byte = self
                .read_u8()
                .map_err(|_| ProtocolError::MalformedVarInt)?;
            value |= u64::from(byte & SEGMENT_BITS) << (7 * position);
            if byte & CONTINUE_BIT == 0 {
                return Ok(value);
            }
        }
        Err(ProtocolError::MalformedVarInt)
    }

    pub fn write_var_long(&mut self, value: u64) {
        let mut value = value;
        loop {
            if value & !u64::from(SEGMENT_BITS) == 0 {
                self.inner.put_u8(value as u8);
                return;
            }
            self.inner
                .put_u8((value as u8 & SEGMENT_BITS) | CONTINUE_BIT);
            value >>= 7;
        }
    }

    // ------------------------------------------------------------------
    // Fixed-width primitives
    // ------------------------------------------------------------------

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn write_u8(&mut self, value: u8) {
        self.inner.put_u8(value);
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::DeserializeError(format!(
                "Invalid boolean byte: {other:#04x}"
            ))),
        }
    }

    pub fn write_bool(&mut self, value: bool) {
        self.inner.put_u8(u8::from(value));
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_be_bytes)
    }

    pub fn write_u16(&mut self, value: u16) {
        self.inner.put_u16(value);
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.take_array().map(i16::from_be_bytes)
    }

    pub fn write_i16(&mut self, value: i16) {
        self.inner.put_i16(value);
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_be_bytes)
    }

    pub fn write_u32(&mut self, value: u32) {
        self.inner.put_u32(value);
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.take_array().map(i32::from_be_bytes)
    }

    pub fn write_i32(&mut self, value: i32) {
        self.inner.put_i32(value);
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.take_array().map(u64::from_be_bytes)
    }

    pub fn write_u64(&mut self, value: u64) {
        self.inner.put_u64(value);
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.take_array().map(i64::from_be_bytes)
    }

    pub fn write_i64(&mut self, value: i64) {
        self.inner.put_i64(value);
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.take_array().map(f32::from_be_bytes)
    }

    pub fn write_f32(&mut self, value: f32) {
        self.inner.put_f32(value);
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.take_array().map(f64::from_be_bytes)
    }

    pub fn write_f64(&mut self, value: f64) {
        self.inner.put_f64(value);
    }

    // ------------------------------------------------------------------
    // Length-prefixed data
    // ------------------------------------------------------------------

    /// Read a length-prefixed byte array
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let length = self.read_var_int()? as usize;
        Ok(self.take(length)?.to_vec())
    }

    pub fn write_byte_array(&mut self, bytes: &[u8]) {
        self.write_var_int(bytes.len() as u32);
        self.inner.put_slice(bytes);
    }

    /// Read a length-prefixed UTF-8 string of at most `max_length` bytes
    pub fn read_string(&mut self, max_length: usize) -> Result<String> {
        let length = self.read_var_int()? as usize;
        if length > max_length {
            return Err(ProtocolError::DeserializeError(format!(
                "String length {length} exceeds maximum of {max_length} bytes"
            )));
        }
        let raw = self.take(length)?.to_vec();
        String::from_utf8(raw)
            .map_err(|e| ProtocolError::DeserializeError(format!("Invalid UTF-8 string: {e}")))
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_byte_array(value.as_bytes());
    }

    /// Consume every readable byte
    pub fn read_remaining(&mut self) -> Vec<u8> {
        let start = self.reader_index;
        self.reader_index = self.inner.len();
        self.inner[start..].to_vec()
    }

    /// Write raw bytes with no length prefix
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.inner.put_slice(bytes);
    }

    /// Read a bincode-encoded value written by [`write_serde`](Self::write_serde)
    pub fn read_serde<T: DeserializeOwned>(&mut self) -> Result<T> {
        let length = self.read_var_int()? as usize;
        let raw = self.take(length)?;
        Ok(bincode::deserialize(raw)?)
    }

    /// Write `value` as a varint length followed by its bincode encoding
    pub fn write_serde<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let encoded = bincode::serialize(value)?;
        self.write_byte_array(&encoded);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_var_int(value: u32) -> BytesMut {
        let mut bytes = BytesMut::new();
        PacketBuffer::new(&mut bytes).write_var_int(value);
        bytes
    }

    #[test]
    fn test_var_int_known_encodings() {
        assert_eq!(&encode_var_int(0)[..], &[0x00]);
        assert_eq!(&encode_var_int(1)[..], &[0x01]);
        assert_eq!(&encode_var_int(127)[..], &[0x7F]);
        assert_eq!(&encode_var_int(128)[..], &[0x80, 0x01]);
        assert_eq!(&encode_var_int(255)[..], &[0xFF, 0x01]);
        assert_eq!(&encode_var_int(25_565)[..], &[0xDD, 0xC7, 0x01]);
        assert_eq!(
            &encode_var_int(u32::MAX)[..],
            &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]
        );
    }

    #[test]
    fn test_var_int_size_matches_encoding() {
        for value in [0, 127, 128, 16_383, 16_384, 2_097_151, 2_097_152, u32::MAX] {
            assert_eq!(var_int_size(value), encode_var_int(value).len());
        }
    }

    #[test]
    fn test_var_int_six_continuation_bytes_rejected() {
        let mut bytes = BytesMut::from(&[0x80u8, 0x80, 0x80, 0x80, 0x80, 0x80][..]);
        let mut buffer = PacketBuffer::new(&mut bytes);
        assert!(matches!(
            buffer.read_var_int(),
            Err(ProtocolError::MalformedVarInt)
        ));
    }

    #[test]
    fn test_var_int_exhausted_mid_sequence() {
        let mut bytes = BytesMut::from(&[0x80u8, 0x80][..]);
        let mut buffer = PacketBuffer::new(&mut bytes);
        assert!(matches!(
            buffer.read_var_int(),
            Err(ProtocolError::MalformedVarInt)
        ));
    }

    #[test]
    fn test_peek_var_int_waits_for_more_data() {
        assert_eq!(peek_var_int(&[]).unwrap(), None);
        assert_eq!(peek_var_int(&[0x80, 0x80]).unwrap(), None);
        assert_eq!(peek_var_int(&[0xDD, 0xC7, 0x01, 0xAA]).unwrap(), Some((25_565, 3)));
        assert!(matches!(
            peek_var_int(&[0xFF; 5]),
            Err(ProtocolError::MalformedVarInt)
        ));
    }

    #[test]
    fn test_var_long_extremes() {
        let mut bytes = BytesMut::new();
        let mut buffer = PacketBuffer::new(&mut bytes);
        buffer.write_var_long(u64::MAX);
        buffer.write_var_long(0);
        assert_eq!(buffer.writer_index(), MAX_VAR_LONG_BYTES + 1);
        assert_eq!(buffer.read_var_long().unwrap(), u64::MAX);
        assert_eq!(buffer.read_var_long().unwrap(), 0);
    }

    #[test]
    fn test_negative_var_i32_uses_five_bytes() {
        let mut bytes = BytesMut::new();
        let mut buffer = PacketBuffer::new(&mut bytes);
        buffer.write_var_i32(-1);
        assert_eq!(buffer.writer_index(), 5);
        assert_eq!(buffer.read_var_i32().unwrap(), -1);
    }

    #[test]
    fn test_fixed_width_underflow() {
        let mut bytes = BytesMut::from(&[0x00u8, 0x01][..]);
        let mut buffer = PacketBuffer::new(&mut bytes);
        match buffer.read_i32() {
            Err(ProtocolError::BufferUnderflow { needed, available }) => {
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("Unexpected result: {other:?}"),
        }
        // A failed read does not move the cursor
        assert_eq!(buffer.read_u16().unwrap(), 1);
    }

    #[test]
    fn test_string_limits() {
        let mut bytes = BytesMut::new();
        let mut buffer = PacketBuffer::new(&mut bytes);
        buffer.write_string("too long for the limit");
        assert!(matches!(
            buffer.read_string(4),
            Err(ProtocolError::DeserializeError(_))
        ));

        let mut bytes = BytesMut::new();
        let mut buffer = PacketBuffer::new(&mut bytes);
        buffer.write_byte_array(&[0xFF, 0xFE]);
        assert!(matches!(
            buffer.read_string(16),
            Err(ProtocolError::DeserializeError(_))
        ));
    }

    #[test]
    fn test_writer_index_only_rewinds() {
        let mut bytes = BytesMut::new();
        let mut buffer = PacketBuffer::new(&mut bytes);
        buffer.write_u32(7);
        let checkpoint = buffer.writer_index();
        buffer.write_string("discarded");
        buffer.set_writer_index(checkpoint);
        assert_eq!(buffer.writer_index(), checkpoint);
        buffer.set_writer_index(checkpoint + 10);
        assert_eq!(buffer.writer_index(), checkpoint);
        assert_eq!(buffer.read_u32().unwrap(), 7);
        assert_eq!(buffer.readable_bytes(), 0);
    }

    #[test]
    fn test_serde_value() {
        let mut bytes = BytesMut::new();
        let mut buffer = PacketBuffer::new(&mut bytes);
        let value = (42u16, String::from("world"), vec![1u8, 2, 3]);
        buffer.write_serde(&value).unwrap();
        buffer.write_bool(true);

        let decoded: (u16, String, Vec<u8>) = buffer.read_serde().unwrap();
        assert_eq!(decoded, value);
        assert!(buffer.read_bool().unwrap());
    }
}
