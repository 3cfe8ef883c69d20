//! Primitive codec
//!
//! Fixed-width little-endian values and 4-byte length-prefixed blocks.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{BagError, Result};

macro_rules! fixed_width {
    ($($ty:ty => $encode:ident, $decode:ident;)*) => {
        $(
            #[doc = concat!("Encode a `", stringify!($ty), "` as little-endian bytes")]
            pub fn $encode(value: $ty) -> [u8; std::mem::size_of::<$ty>()] {
                value.to_le_bytes()
            }

            #[doc = concat!("Decode a little-endian `", stringify!($ty), "` from the start of `bytes`")]
            pub fn $decode(bytes: &[u8]) -> Result<$ty> {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                let raw = bytes
                    .get(..WIDTH)
                    .ok_or_else(|| BagError::truncated(WIDTH, bytes.len()))?;
                let mut buf = [0u8; WIDTH];
                buf.copy_from_slice(raw);
                Ok(<$ty>::from_le_bytes(buf))
            }
        )*
    };
}

fixed_width! {
    u8 => encode_u8, decode_u8;
    i8 => encode_i8, decode_i8;
    u16 => encode_u16, decode_u16;
    i16 => encode_i16, decode_i16;
    u32 => encode_u32, decode_u32;
    i32 => encode_i32, decode_i32;
    u64 => encode_u64, decode_u64;
    i64 => encode_i64, decode_i64;
    f32 => encode_f32, decode_f32;
    f64 => encode_f64, decode_f64;
}

/// Encode a bool as a single byte (0 or 1)
pub fn encode_bool(value: bool) -> [u8; 1] {
    [value as u8]
}

/// Decode a single-byte bool; any non-zero byte is `true`
pub fn decode_bool(bytes: &[u8]) -> Result<bool> {
    Ok(decode_u8(bytes)? != 0)
}

// =============================================================================
// Length-Prefixed Blocks
// =============================================================================

/// Encode bytes as `[len: u32][bytes]`
pub fn encode_sized(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + bytes.len());
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
    out
}

/// Encode a string as `[len: u32][utf-8 bytes]` with no terminator
pub fn encode_string(value: &str) -> Vec<u8> {
    encode_sized(value.as_bytes())
}

/// Decode a length-prefixed block from the start of `bytes`
///
/// Returns the block contents and the total number of bytes consumed.
pub fn decode_sized(bytes: &[u8]) -> Result<(&[u8], usize)> {
    let len = decode_u32(bytes)? as usize;
    let end = 4 + len;
    let body = bytes
        .get(4..end)
        .ok_or_else(|| BagError::truncated(end, bytes.len()))?;
    Ok((body, end))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a little-endian u32 from a stream
pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|e| BagError::from_read(e, 4))?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64 from a stream
pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader
        .read_exact(&mut buf)
        .map_err(|e| BagError::from_read(e, 8))?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a `[len: u32][bytes]` block from a stream
///
/// The length is untrusted, so the body grows as bytes arrive.
pub fn read_sized<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = read_u32(reader)?;
    let mut body = Vec::new();
    reader.take(u64::from(len)).read_to_end(&mut body)?;
    if body.len() < len as usize {
        return Err(BagError::truncated(len as usize, body.len()));
    }
    Ok(body)
}

/// Skip over a `[len: u32][bytes]` block without reading its contents
pub fn skip_sized<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let len = read_u32(reader)?;
    reader.seek(SeekFrom::Current(i64::from(len)))?;
    Ok(u64::from(len))
}
