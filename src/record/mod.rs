//! Record Module
//!
//! The closed catalog of record kinds that make up a bag.
//!
//! ## Record Layout
//! ```text
//! ┌────────────────────────────┬────────────────────────────┐
//! │ Header (field block)       │ Data                       │
//! │ [HeaderLen: u32][fields]   │ [DataLen: u32][bytes]      │
//! └────────────────────────────┴────────────────────────────┘
//! ```
//!
//! ### Opcodes
//! - 0x02: MESSAGE_DATA    - conn, time                        | data: payload
//! - 0x03: HEADER          - index_pos, conn_count, chunk_count | data: space padding
//! - 0x04: INDEX_DATA      - ver, conn, count                  | data: (time, offset)*
//! - 0x05: CHUNK           - compression, size                 | data: chunk contents
//! - 0x06: CHUNK_INFO      - ver, chunk_pos, start_time, end_time, count | data: (conn, count)*
//! - 0x07: CONNECTION      - conn, topic                       | data: connection field block

mod connection;
mod headers;

use std::fmt;
use std::str::FromStr;

use crate::error::{BagError, Result};
use crate::wire::FieldBlock;

pub use connection::ConnectionInfo;
pub use headers::{
    BagHeader, ChunkHeader, ChunkInfoHeader, ConnectionHeader, IndexDataHeader,
    MessageDataHeader, RecordHeader,
};

/// Version written to and required of IndexData and ChunkInfo records
pub const RECORD_VERSION: u32 = 1;

// =============================================================================
// Opcodes
// =============================================================================

/// Record kinds, identified by the single byte stored in the `op` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    MessageData = 0x02,
    Header = 0x03,
    IndexData = 0x04,
    Chunk = 0x05,
    ChunkInfo = 0x06,
    Connection = 0x07,
}

impl OpCode {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::MessageData => "MESSAGE_DATA",
            OpCode::Header => "HEADER",
            OpCode::IndexData => "INDEX_DATA",
            OpCode::Chunk => "CHUNK",
            OpCode::ChunkInfo => "CHUNK_INFO",
            OpCode::Connection => "CONNECTION",
        }
    }

    /// Header fields every record of this kind must carry (besides `op`)
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            OpCode::MessageData => &["conn", "time"],
            OpCode::Header => &["index_pos", "conn_count", "chunk_count"],
            OpCode::IndexData => &["ver", "conn", "count"],
            OpCode::Chunk => &["compression", "size"],
            OpCode::ChunkInfo => &["ver", "chunk_pos", "start_time", "end_time", "count"],
            OpCode::Connection => &["conn", "topic"],
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = BagError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0x02 => Ok(OpCode::MessageData),
            0x03 => Ok(OpCode::Header),
            0x04 => Ok(OpCode::IndexData),
            0x05 => Ok(OpCode::Chunk),
            0x06 => Ok(OpCode::ChunkInfo),
            0x07 => Ok(OpCode::Connection),
            other => Err(BagError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [0x{:02x}]", self.name(), self.as_byte())
    }
}

// =============================================================================
// Compression
// =============================================================================

/// Chunk compression, as named by a chunk header's `compression` field
///
/// Names this build does not recognize are kept verbatim so a bag can still
/// be opened and indexed; fetching from such a chunk fails with
/// `UnsupportedCompression`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    #[default]
    None,
    Bz2,
    Lz4,
    Other(String),
}

impl Compression {
    pub fn as_str(&self) -> &str {
        match self {
            Compression::None => "none",
            Compression::Bz2 => "bz2",
            Compression::Lz4 => "lz4",
            Compression::Other(name) => name,
        }
    }

    /// Map a stored name to a compression, keeping unknown names
    pub fn from_name(name: &str) -> Self {
        match name {
            "none" => Compression::None,
            "bz2" => Compression::Bz2,
            "lz4" => Compression::Lz4,
            other => Compression::Other(other.to_string()),
        }
    }
}

impl FromStr for Compression {
    type Err = BagError;

    /// Parse a known compression name; unknown names are an error
    fn from_str(s: &str) -> Result<Self> {
        match Compression::from_name(s) {
            Compression::Other(name) => Err(BagError::UnsupportedCompression(name)),
            known => Ok(known),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Decoded Records
// =============================================================================

/// A decoded record header, one variant per record kind
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Header(BagHeader),
    Chunk(ChunkHeader),
    Connection(ConnectionHeader),
    MessageData(MessageDataHeader),
    IndexData(IndexDataHeader),
    ChunkInfo(ChunkInfoHeader),
}

impl Record {
    /// Decode a field block into the variant named by its `op` field
    pub fn from_fields(block: &FieldBlock) -> Result<Self> {
        Ok(match block.op()? {
            OpCode::Header => Record::Header(BagHeader::from_fields(block)?),
            OpCode::Chunk => Record::Chunk(ChunkHeader::from_fields(block)?),
            OpCode::Connection => Record::Connection(ConnectionHeader::from_fields(block)?),
            OpCode::MessageData => Record::MessageData(MessageDataHeader::from_fields(block)?),
            OpCode::IndexData => Record::IndexData(IndexDataHeader::from_fields(block)?),
            OpCode::ChunkInfo => Record::ChunkInfo(ChunkInfoHeader::from_fields(block)?),
        })
    }

    pub fn op(&self) -> OpCode {
        match self {
            Record::Header(_) => OpCode::Header,
            Record::Chunk(_) => OpCode::Chunk,
            Record::Connection(_) => OpCode::Connection,
            Record::MessageData(_) => OpCode::MessageData,
            Record::IndexData(_) => OpCode::IndexData,
            Record::ChunkInfo(_) => OpCode::ChunkInfo,
        }
    }

    pub fn to_fields(&self) -> FieldBlock {
        match self {
            Record::Header(h) => h.to_fields(),
            Record::Chunk(h) => h.to_fields(),
            Record::Connection(h) => h.to_fields(),
            Record::MessageData(h) => h.to_fields(),
            Record::IndexData(h) => h.to_fields(),
            Record::ChunkInfo(h) => h.to_fields(),
        }
    }
}
