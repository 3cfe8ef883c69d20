//! Typed record headers
//!
//! Each record kind projects its field block onto a plain struct. The
//! `RecordHeader` trait ties a struct to its opcode and field names.

use std::io::{Read, Seek, Write};

use crate::error::{BagError, Result};
use crate::wire::{encode_time, encode_u32, encode_u64, FieldBlock, Time};

use super::{Compression, OpCode, RECORD_VERSION};

/// A record header with a fixed opcode
pub trait RecordHeader: Sized {
    const OP: OpCode;

    /// Project a decoded field block onto this header
    fn from_fields(block: &FieldBlock) -> Result<Self>;

    /// Build the field block for this header, `op` included
    fn to_fields(&self) -> FieldBlock;

    /// Check the opcode and that every required field is present
    fn check_fields(block: &FieldBlock) -> Result<()> {
        block.expect_op(Self::OP)?;
        for name in Self::OP.required_fields() {
            if !block.contains(name) {
                return Err(BagError::MalformedHeader(format!(
                    "{} record is missing field '{}'",
                    Self::OP.name(),
                    name
                )));
            }
        }
        Ok(())
    }

    /// Read a header block from a stream, requiring this header's opcode
    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Self::from_fields(&FieldBlock::read_expecting(reader, Self::OP)?)
    }

    /// Write this header as a length-prefixed field block
    fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<u32> {
        self.to_fields().write_to(writer)
    }
}

fn check_version(op: OpCode, ver: u32) -> Result<()> {
    if ver != RECORD_VERSION {
        return Err(BagError::MalformedHeader(format!(
            "{} record version {} (expected {})",
            op.name(),
            ver,
            RECORD_VERSION
        )));
    }
    Ok(())
}

// =============================================================================
// Bag Header (0x03)
// =============================================================================

/// The container header: where the index starts and how big it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BagHeader {
    /// Offset of the first record after the chunk section
    pub index_pos: u64,
    /// Number of unique connections in the file
    pub conn_count: u32,
    /// Number of chunk records in the file
    pub chunk_count: u32,
}

impl RecordHeader for BagHeader {
    const OP: OpCode = OpCode::Header;

    fn from_fields(block: &FieldBlock) -> Result<Self> {
        Self::check_fields(block)?;
        Ok(Self {
            index_pos: block.require_u64("index_pos")?,
            conn_count: block.require_u32("conn_count")?,
            chunk_count: block.require_u32("chunk_count")?,
        })
    }

    fn to_fields(&self) -> FieldBlock {
        FieldBlock::with_op(Self::OP)
            .field("index_pos", encode_u64(self.index_pos))
            .field("conn_count", encode_u32(self.conn_count))
            .field("chunk_count", encode_u32(self.chunk_count))
    }
}

// =============================================================================
// Chunk (0x05)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    pub compression: Compression,
    /// Size of the chunk contents once decompressed
    pub size: u32,
}

impl RecordHeader for ChunkHeader {
    const OP: OpCode = OpCode::Chunk;

    fn from_fields(block: &FieldBlock) -> Result<Self> {
        Self::check_fields(block)?;
        Ok(Self {
            compression: Compression::from_name(&block.require_string("compression")?),
            size: block.require_u32("size")?,
        })
    }

    fn to_fields(&self) -> FieldBlock {
        FieldBlock::with_op(Self::OP)
            .field("compression", self.compression.as_str().as_bytes())
            .field("size", encode_u32(self.size))
    }
}

// =============================================================================
// Connection (0x07)
// =============================================================================

/// Outer header of a connection record; the rest lives in its data block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHeader {
    pub conn: u32,
    pub topic: String,
}

impl RecordHeader for ConnectionHeader {
    const OP: OpCode = OpCode::Connection;

    fn from_fields(block: &FieldBlock) -> Result<Self> {
        Self::check_fields(block)?;
        Ok(Self {
            conn: block.require_u32("conn")?,
            topic: block.require_string("topic")?,
        })
    }

    fn to_fields(&self) -> FieldBlock {
        FieldBlock::with_op(Self::OP)
            .field("conn", encode_u32(self.conn))
            .field("topic", self.topic.as_bytes())
    }
}

// =============================================================================
// Message Data (0x02)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDataHeader {
    pub conn: u32,
    pub time: Time,
}

impl RecordHeader for MessageDataHeader {
    const OP: OpCode = OpCode::MessageData;

    fn from_fields(block: &FieldBlock) -> Result<Self> {
        Self::check_fields(block)?;
        Ok(Self {
            conn: block.require_u32("conn")?,
            time: block.require_time("time")?,
        })
    }

    fn to_fields(&self) -> FieldBlock {
        FieldBlock::with_op(Self::OP)
            .field("conn", encode_u32(self.conn))
            .field("time", encode_time(self.time))
    }
}

// =============================================================================
// Index Data (0x04)
// =============================================================================

/// Header of a per-connection, per-chunk index record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDataHeader {
    pub ver: u32,
    pub conn: u32,
    /// Number of (time, offset) entries in the data block
    pub count: u32,
}

impl IndexDataHeader {
    pub fn new(conn: u32, count: u32) -> Self {
        Self {
            ver: RECORD_VERSION,
            conn,
            count,
        }
    }
}

impl RecordHeader for IndexDataHeader {
    const OP: OpCode = OpCode::IndexData;

    fn from_fields(block: &FieldBlock) -> Result<Self> {
        Self::check_fields(block)?;
        let ver = block.require_u32("ver")?;
        check_version(Self::OP, ver)?;
        Ok(Self {
            ver,
            conn: block.require_u32("conn")?,
            count: block.require_u32("count")?,
        })
    }

    fn to_fields(&self) -> FieldBlock {
        FieldBlock::with_op(Self::OP)
            .field("ver", encode_u32(self.ver))
            .field("conn", encode_u32(self.conn))
            .field("count", encode_u32(self.count))
    }
}

// =============================================================================
// Chunk Info (0x06)
// =============================================================================

/// Header of a chunk summary record in the trailing index section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfoHeader {
    pub ver: u32,
    /// Offset of the chunk record this summary describes
    pub chunk_pos: u64,
    pub start_time: Time,
    pub end_time: Time,
    /// Number of (conn, count) pairs in the data block
    pub count: u32,
}

impl ChunkInfoHeader {
    pub fn new(chunk_pos: u64, start_time: Time, end_time: Time, count: u32) -> Self {
        Self {
            ver: RECORD_VERSION,
            chunk_pos,
            start_time,
            end_time,
            count,
        }
    }
}

impl RecordHeader for ChunkInfoHeader {
    const OP: OpCode = OpCode::ChunkInfo;

    fn from_fields(block: &FieldBlock) -> Result<Self> {
        Self::check_fields(block)?;
        let ver = block.require_u32("ver")?;
        check_version(Self::OP, ver)?;
        Ok(Self {
            ver,
            chunk_pos: block.require_u64("chunk_pos")?,
            start_time: block.require_time("start_time")?,
            end_time: block.require_time("end_time")?,
            count: block.require_u32("count")?,
        })
    }

    fn to_fields(&self) -> FieldBlock {
        FieldBlock::with_op(Self::OP)
            .field("ver", encode_u32(self.ver))
            .field("chunk_pos", encode_u64(self.chunk_pos))
            .field("start_time", encode_time(self.start_time))
            .field("end_time", encode_time(self.end_time))
            .field("count", encode_u32(self.count))
    }
}
