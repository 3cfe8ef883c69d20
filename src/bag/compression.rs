//! Chunk compression codecs
//!
//! Chunks are compressed and decompressed whole: index offsets address the
//! decompressed buffer, so there is no streaming access into a compressed
//! chunk.

use crate::error::{BagError, Result};
use crate::record::Compression;

/// Whole-buffer compression for chunk contents
pub trait ChunkCodec: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress `data`; `size_hint` is the declared uncompressed size
    fn decompress(&self, data: &[u8], size_hint: usize) -> Result<Vec<u8>>;
}

/// Look up the codec for a compression, if this build supports it
pub fn codec_for(compression: &Compression) -> Result<&'static dyn ChunkCodec> {
    match compression {
        Compression::None => Ok(&Uncompressed),
        #[cfg(feature = "bz2")]
        Compression::Bz2 => Ok(&Bz2Codec),
        #[cfg(feature = "lz4")]
        Compression::Lz4 => Ok(&Lz4Codec),
        other => Err(BagError::UnsupportedCompression(other.as_str().to_string())),
    }
}

// =============================================================================
// None
// =============================================================================

struct Uncompressed;

impl ChunkCodec for Uncompressed {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], _size_hint: usize) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

// =============================================================================
// Bzip2
// =============================================================================

#[cfg(feature = "bz2")]
struct Bz2Codec;

#[cfg(feature = "bz2")]
impl ChunkCodec for Bz2Codec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        use std::io::Write;

        let mut encoder = bzip2::write::BzEncoder::new(
            Vec::with_capacity(data.len() / 2),
            bzip2::Compression::best(),
        );
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
        use std::io::Read;

        let mut out = Vec::with_capacity(size_hint);
        bzip2::read::BzDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| BagError::Decompression(format!("bz2: {}", e)))?;
        Ok(out)
    }
}

// =============================================================================
// LZ4 (frame format)
// =============================================================================

#[cfg(feature = "lz4")]
struct Lz4Codec;

#[cfg(feature = "lz4")]
impl ChunkCodec for Lz4Codec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        use std::io::Write;

        let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::with_capacity(data.len()));
        encoder.write_all(data)?;
        Ok(encoder.finish().map_err(std::io::Error::from)?)
    }

    fn decompress(&self, data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
        use std::io::Read;

        let mut out = Vec::with_capacity(size_hint);
        lz4_flex::frame::FrameDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| BagError::Decompression(format!("lz4: {}", e)))?;
        Ok(out)
    }
}
