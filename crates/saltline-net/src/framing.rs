//! Message framing for network transport
//!
//! Recovers discrete frame boundaries from a raw ordered byte stream and
//! serializes outgoing frames the same way. Frames are opaque here; the
//! layers above decide what their payloads mean.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum frame size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Longest length prefix we will accept (a full u64 varint)
const MAX_PREFIX_LEN: usize = 10;

/// Framing errors
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame too large: {0} bytes (max {MAX_FRAME_SIZE})")]
    TooLarge(u64),
    #[error("malformed length prefix")]
    MalformedPrefix,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Codec for varint length-prefixed frames
///
/// Wire format:
/// - 1-10 bytes: payload length (unsigned LEB128)
/// - N bytes: payload
///
/// Both peers must use this exact prefix encoding.
#[derive(Debug, Default)]
pub struct FrameCodec;

/// Parse a varint from the front of `src`.
///
/// Returns the value and prefix length once complete, `None` while more
/// bytes are needed, and an error for prefixes longer than ten bytes.
fn decode_varint(src: &[u8]) -> Result<Option<(u64, usize)>, FrameError> {
    let mut value = 0u64;
    for (i, &byte) in src.iter().take(MAX_PREFIX_LEN).enumerate() {
        // The tenth byte holds only the top u64 bit; anything else
        // would shift data out of range
        if i == MAX_PREFIX_LEN - 1 && byte > 0x01 {
            return Err(FrameError::MalformedPrefix);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    if src.len() >= MAX_PREFIX_LEN {
        return Err(FrameError::MalformedPrefix);
    }
    Ok(None)
}

fn encode_varint(mut value: u64, dst: &mut BytesMut) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            dst.put_u8(byte);
            return;
        }
        dst.put_u8(byte | 0x80);
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (length, prefix_len) = match decode_varint(src)? {
            Some(parsed) => parsed,
            None => return Ok(None),
        };

        if length > MAX_FRAME_SIZE as u64 {
            return Err(FrameError::TooLarge(length));
        }
        let length = length as usize;

        // Wait for the full payload; partial frames stay buffered
        if src.len() < prefix_len + length {
            src.reserve(prefix_len + length - src.len());
            return Ok(None);
        }

        src.advance(prefix_len);
        Ok(Some(src.split_to(length).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME_SIZE {
            return Err(FrameError::TooLarge(item.len() as u64));
        }

        dst.reserve(MAX_PREFIX_LEN + item.len());
        encode_varint(item.len() as u64, dst);
        dst.put_slice(&item);

        Ok(())
    }
}
