//! Chunks and the chunk fetcher
//!
//! A chunk groups connection and message records, optionally compressed as
//! one unit. The fetcher resolves an index entry to the message it points
//! at by loading (and caching) the owning chunk's decompressed contents.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{BagError, Result};
use crate::record::{Compression, MessageDataHeader, OpCode, RecordHeader};
use crate::wire::{read_sized, ByteCursor, FieldBlock, Time};

use super::compression::codec_for;
use super::index::IndexEntry;

/// Upper bound on buffer preallocation taken from a chunk's declared size
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Number of messages one connection contributed to a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConnection {
    pub conn: u32,
    pub count: u32,
}

/// Everything known about a chunk without reading its contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSummary {
    /// Offset of the chunk record (its header length prefix)
    pub record_pos: u64,
    /// Offset of the chunk's data block (its length prefix)
    pub data_pos: u64,
    pub time_start: Time,
    pub time_end: Time,
    pub connections: Vec<ChunkConnection>,
    pub compression: Compression,
    pub size_uncompressed: u32,
    pub size_compressed: u32,
}

impl ChunkSummary {
    /// Total number of messages in the chunk
    pub fn message_count(&self) -> u64 {
        self.connections.iter().map(|c| u64::from(c.count)).sum()
    }
}

/// A message record located inside a chunk, payload still encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub connection_id: u32,
    pub time: Time,
    pub data: Bytes,
}

// =============================================================================
// Chunk Cache
// =============================================================================

/// Decompressed chunk contents keyed by chunk record position
///
/// Shared by every query against one bag. Entries live until the bag is
/// dropped.
#[derive(Debug, Default)]
pub struct ChunkCache {
    chunks: RwLock<HashMap<u64, Bytes>>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chunk_pos: u64) -> Option<Bytes> {
        self.chunks.read().get(&chunk_pos).cloned()
    }

    pub fn insert(&self, chunk_pos: u64, data: Bytes) {
        self.chunks.write().insert(chunk_pos, data);
    }

    /// Number of chunks currently cached
    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Chunk Fetcher
// =============================================================================

/// Resolves index entries to raw messages through its own read cursor
///
/// `chunks` must be sorted by `record_pos`.
pub struct ChunkFetcher<'a, R> {
    reader: R,
    chunks: &'a [ChunkSummary],
    cache: Option<&'a ChunkCache>,
    /// Most recently loaded chunk, kept even when the shared cache is off
    last: Option<(u64, Bytes)>,
}

impl<'a, R: Read + Seek> ChunkFetcher<'a, R> {
    pub fn new(reader: R, chunks: &'a [ChunkSummary], cache: Option<&'a ChunkCache>) -> Self {
        Self {
            reader,
            chunks,
            cache,
            last: None,
        }
    }

    /// Find the summary of the chunk whose record starts at `chunk_pos`
    pub fn summary(&self, chunk_pos: u64) -> Result<&'a ChunkSummary> {
        let chunks = self.chunks;
        chunks
            .binary_search_by_key(&chunk_pos, |c| c.record_pos)
            .map(|i| &chunks[i])
            .map_err(|_| BagError::UnknownChunk(chunk_pos))
    }

    /// Decompressed contents of a chunk, loading it on first use
    pub fn chunk_data(&mut self, chunk_pos: u64) -> Result<Bytes> {
        if let Some((pos, data)) = &self.last {
            if *pos == chunk_pos {
                return Ok(data.clone());
            }
        }
        if let Some(data) = self.cache.and_then(|c| c.get(chunk_pos)) {
            self.last = Some((chunk_pos, data.clone()));
            return Ok(data);
        }

        let summary = self.summary(chunk_pos)?;
        let data = Bytes::from(self.load(summary)?);
        if let Some(cache) = self.cache {
            cache.insert(chunk_pos, data.clone());
        }
        self.last = Some((chunk_pos, data.clone()));
        Ok(data)
    }

    /// Read and decompress a chunk's data block
    fn load(&mut self, summary: &ChunkSummary) -> Result<Vec<u8>> {
        let codec = codec_for(&summary.compression)?;

        self.reader.seek(SeekFrom::Start(summary.data_pos))?;
        let stored = read_sized(&mut self.reader)?;

        let declared = summary.size_uncompressed as usize;
        let mut data = codec.decompress(&stored, declared.min(MAX_PREALLOC))?;
        if data.len() < declared {
            return Err(BagError::truncated(declared, data.len()));
        }
        data.truncate(declared);

        tracing::trace!(
            "loaded chunk at {} ({}, {} -> {} bytes)",
            summary.record_pos,
            summary.compression,
            stored.len(),
            data.len()
        );
        Ok(data)
    }

    /// Locate the message record an index entry points at
    ///
    /// Connection records found before the message are skipped; any other
    /// record kind at that position means the index and chunk disagree.
    pub fn resolve(&mut self, entry: &IndexEntry) -> Result<RawMessage> {
        let data = self.chunk_data(entry.chunk_pos)?;
        let mut cursor = ByteCursor::new(&data);
        cursor.seek(entry.offset as usize)?;

        loop {
            let block = FieldBlock::read_from_cursor(&mut cursor)?;
            match block.op()? {
                OpCode::Connection => cursor.skip_sized()?,
                OpCode::MessageData => {
                    let header = MessageDataHeader::from_fields(&block)?;
                    let payload = cursor.read_sized()?;
                    return Ok(RawMessage {
                        connection_id: header.conn,
                        time: header.time,
                        data: data.slice_ref(payload),
                    });
                }
                actual => {
                    return Err(BagError::UnexpectedOpcode {
                        expected: OpCode::MessageData,
                        actual,
                    })
                }
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
