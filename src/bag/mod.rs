//! Bag Module
//!
//! Chunked, indexed container of time-stamped messages from many
//! connections.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Version line: "#ROSBAG V2.0\n" (13 bytes)               │
//! ├─────────────────────────────────────────────────────────┤
//! │ Header record, padded with spaces to 4096 bytes         │
//! │   index_pos | conn_count | chunk_count                  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Chunk record                                            │
//! │   header: compression, size                             │
//! │   data:   [Connection]* [MessageData]* (maybe compressed)│
//! │ IndexData record, one per connection in the chunk       │
//! │   header: ver, conn, count | data: [time, offset]*      │
//! │ ... repeated for each chunk ...                         │
//! ├─────────────────────────────────────────────────────────┤  ← index_pos
//! │ Connection record, one per connection                   │
//! ├─────────────────────────────────────────────────────────┤
//! │ ChunkInfo record, one per chunk                         │
//! │   header: ver, chunk_pos, start_time, end_time, count   │
//! │   data:   [conn, count]*                                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Index offsets are relative to the start of a chunk's decompressed data.

mod chunk;
mod compression;
mod index;
mod message;
mod query;
mod reader;
mod summary;
mod writer;

pub use chunk::{ChunkCache, ChunkConnection, ChunkFetcher, ChunkSummary, RawMessage};
pub use compression::{codec_for, ChunkCodec};
pub use index::{Index, IndexEntry};
pub use message::{BagMessage, PayloadDecoder};
pub use query::{EntryIter, EntryMerge, Messages, Query};
pub use reader::Bag;
pub use summary::{BagSummary, TopicSummary};
pub use writer::{BagWriter, WriterState};

// =============================================================================
// Shared Constants (used by reader and writer)
// =============================================================================

/// Version line that opens every supported bag
pub const VERSION_LINE: &str = "#ROSBAG V2.0";

/// Version line as written, newline included
pub(crate) const MAGIC: &[u8] = b"#ROSBAG V2.0\n";

/// Offset of the header record (immediately after the version line)
pub(crate) const HEADER_POS: u64 = MAGIC.len() as u64;

/// Total on-disk size of the header record, length prefixes included
pub const HEADER_RECORD_LEN: u64 = 4096;

/// Byte used to pad the header record
pub(crate) const HEADER_PADDING: u8 = b' ';

/// First byte after the header record, where chunks begin
pub(crate) const DATA_START: u64 = HEADER_POS + HEADER_RECORD_LEN;

/// Size of one IndexData entry: time (8) + offset (4)
pub(crate) const INDEX_ENTRY_SIZE: usize = 12;

/// Size of one ChunkInfo entry: conn (4) + count (4)
pub(crate) const CHUNK_CONNECTION_SIZE: usize = 8;
