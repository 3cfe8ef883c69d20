//! Bag reader
//!
//! Opens a bag and builds its index from the trailing index section. The
//! open either succeeds with a fully indexed bag or fails; there is no
//! partially usable result.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{BagError, Result};
use crate::record::{
    BagHeader, ChunkHeader, ChunkInfoHeader, ConnectionInfo, IndexDataHeader, RecordHeader,
};
use crate::wire::{read_sized, read_u32, skip_sized, ByteCursor, Time};

use super::chunk::{ChunkCache, ChunkConnection, ChunkFetcher, ChunkSummary};
use super::index::{Index, IndexEntry};
use super::query::{EntryIter, EntryMerge, Messages, Query};
use super::summary::BagSummary;
use super::{CHUNK_CONNECTION_SIZE, DATA_START, HEADER_POS, INDEX_ENTRY_SIZE, VERSION_LINE};

/// Longest version line accepted before giving up on finding a newline
const MAX_VERSION_LINE: u64 = 64;

/// Upper bound on records preallocated from a header count
const MAX_PREALLOC_RECORDS: usize = 1024;

/// An opened, fully indexed bag
///
/// The index is immutable after `open`. Every query opens its own file
/// handle, so one `Bag` can serve concurrent queries from many threads.
#[derive(Debug)]
pub struct Bag {
    path: PathBuf,
    config: Config,
    header: BagHeader,
    connections: Vec<ConnectionInfo>,
    connection_slots: HashMap<u32, usize>,
    /// Sorted by `record_pos`
    chunks: Vec<ChunkSummary>,
    index: Index,
    cache: ChunkCache,
}

impl Bag {
    /// Open a bag with the default configuration
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Open a bag and build its index
    ///
    /// 1. Check the version line
    /// 2. Read the header record and skip its padding
    /// 3. Read the connection records at `index_pos`
    /// 4. Read the chunk info records, cross-referencing each chunk header
    /// 5. Read the IndexData records that follow each chunk
    /// 6. Drop connections without messages from the index
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let version = read_version(&mut reader)?;
        tracing::debug!("bag version: {}", version);

        let header = BagHeader::read_from(&mut reader)?;
        skip_sized(&mut reader)?;
        tracing::debug!("bag header: {:?}", header);

        if header.index_pos < DATA_START {
            return Err(BagError::Unindexed(header.index_pos));
        }

        reader.seek(SeekFrom::Start(header.index_pos))?;
        let connections = read_connections(&mut reader, header.conn_count)?;
        let mut chunks = read_chunk_infos(&mut reader, header.chunk_count)?;
        chunks.sort_by_key(|c| c.record_pos);

        let connection_slots: HashMap<u32, usize> = connections
            .iter()
            .enumerate()
            .map(|(slot, c)| (c.id, slot))
            .collect();
        let index = read_index(&mut reader, &connections, &connection_slots, &chunks)?;

        for (conn, entries) in index.iter() {
            let topic = connection_slots
                .get(&conn)
                .map(|&slot| connections[slot].topic.as_str())
                .unwrap_or_default();
            tracing::debug!("conn {} ({}): {} messages", conn, topic, entries.len());
        }

        Ok(Self {
            path: path.to_path_buf(),
            config,
            header,
            connections,
            connection_slots,
            chunks,
            index,
            cache: ChunkCache::new(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn header(&self) -> &BagHeader {
        &self.header
    }

    /// Every connection in the bag, in connection-table order
    pub fn connections(&self) -> &[ConnectionInfo] {
        &self.connections
    }

    pub fn connection(&self, id: u32) -> Option<&ConnectionInfo> {
        self.connection_slots
            .get(&id)
            .map(|&slot| &self.connections[slot])
    }

    /// Chunk summaries, ordered by position in the file
    pub fn chunks(&self) -> &[ChunkSummary] {
        &self.chunks
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// The names of all topics in this bag
    pub fn topics(&self) -> HashSet<&str> {
        self.connections.iter().map(|c| c.topic.as_str()).collect()
    }

    /// Connections on the given topics, or all connections for `None` or an empty set
    pub fn connections_for(&self, topics: Option<&HashSet<String>>) -> Vec<&ConnectionInfo> {
        match topics.filter(|t| !t.is_empty()) {
            None => self.connections.iter().collect(),
            Some(topics) => self
                .connections
                .iter()
                .filter(|c| topics.contains(&c.topic))
                .collect(),
        }
    }

    pub fn message_count(&self) -> usize {
        self.index.message_count()
    }

    pub fn start_time(&self) -> Option<Time> {
        self.index.start_time()
    }

    pub fn end_time(&self) -> Option<Time> {
        self.index.end_time()
    }

    pub fn summary(&self) -> BagSummary {
        BagSummary::from_bag(self)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Index entries matching a query, time-ordered, without touching chunks
    pub fn entries(&self, query: &Query) -> EntryMerge<EntryIter<'_>> {
        let inputs = self
            .connections_for(query.topics.as_ref())
            .into_iter()
            .filter_map(|c| self.index.entries(c.id))
            .map(|entries| {
                let from = query
                    .start
                    .map_or(0, |s| entries.partition_point(|e| e.time < s));
                entries[from..].iter().copied()
            })
            .collect();
        EntryMerge::new(inputs, query.start, query.end)
    }

    /// A fetcher with its own file handle
    pub fn fetcher(&self) -> Result<ChunkFetcher<'_, BufReader<File>>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let cache = self.config.cache_chunks.then_some(&self.cache);
        Ok(ChunkFetcher::new(reader, &self.chunks, cache))
    }

    /// Messages matching a query, in time order
    pub fn query(&self, query: &Query) -> Result<Messages<'_>> {
        Ok(Messages::new(self, self.entries(query), self.fetcher()?))
    }

    /// Every message in the bag, in time order
    pub fn messages(&self) -> Result<Messages<'_>> {
        self.query(&Query::all())
    }
}

// =============================================================================
// Index Construction
// =============================================================================

fn read_version<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = Vec::new();
    reader
        .by_ref()
        .take(MAX_VERSION_LINE)
        .read_until(b'\n', &mut line)?;
    let version = String::from_utf8_lossy(&line).trim_end().to_string();
    if version != VERSION_LINE || line.len() as u64 != HEADER_POS {
        return Err(BagError::UnsupportedVersion(version));
    }
    Ok(version)
}

fn read_connections<R: Read>(reader: &mut R, count: u32) -> Result<Vec<ConnectionInfo>> {
    let mut connections = Vec::with_capacity((count as usize).min(MAX_PREALLOC_RECORDS));
    for _ in 0..count {
        let connection = ConnectionInfo::read_from(reader)?;
        tracing::trace!("connection {}: {} ({})", connection.id, connection.topic, connection.type_name);
        connections.push(connection);
    }
    Ok(connections)
}

fn read_chunk_infos<R: Read + Seek>(reader: &mut R, count: u32) -> Result<Vec<ChunkSummary>> {
    let mut chunks = Vec::with_capacity((count as usize).min(MAX_PREALLOC_RECORDS));
    for _ in 0..count {
        let info = ChunkInfoHeader::read_from(reader)?;

        let data = read_sized(reader)?;
        let expected = info.count as usize * CHUNK_CONNECTION_SIZE;
        if data.len() != expected {
            return Err(BagError::MalformedHeader(format!(
                "chunk info for {} lists {} connections in {} bytes (expected {})",
                info.chunk_pos,
                info.count,
                data.len(),
                expected
            )));
        }
        let mut cursor = ByteCursor::new(&data);
        let mut connections = Vec::with_capacity(info.count as usize);
        for _ in 0..info.count {
            connections.push(ChunkConnection {
                conn: cursor.read_u32()?,
                count: cursor.read_u32()?,
            });
        }

        // compression and sizes live in the chunk's own header
        let resume = reader.stream_position()?;
        reader.seek(SeekFrom::Start(info.chunk_pos))?;
        let chunk = ChunkHeader::read_from(reader)?;
        let data_pos = reader.stream_position()?;
        let size_compressed = read_u32(reader)?;
        reader.seek(SeekFrom::Start(resume))?;

        let summary = ChunkSummary {
            record_pos: info.chunk_pos,
            data_pos,
            time_start: info.start_time,
            time_end: info.end_time,
            connections,
            compression: chunk.compression,
            size_uncompressed: chunk.size,
            size_compressed,
        };
        tracing::debug!("decoded chunk: {:?}", summary);
        chunks.push(summary);
    }
    Ok(chunks)
}

fn read_index<R: Read + Seek>(
    reader: &mut R,
    connections: &[ConnectionInfo],
    connection_slots: &HashMap<u32, usize>,
    chunks: &[ChunkSummary],
) -> Result<Index> {
    tracing::debug!("reading index");
    let mut index = Index::new();
    for connection in connections {
        index.register(connection.id);
    }

    for chunk in chunks {
        reader.seek(SeekFrom::Start(chunk.record_pos))?;
        // chunk header and chunk data, skipped as one opaque record
        skip_sized(reader)?;
        skip_sized(reader)?;

        for _ in 0..chunk.connections.len() {
            read_index_record(reader, chunk.record_pos, connection_slots, &mut index)?;
        }
    }

    for conn in index.sort_unordered() {
        tracing::warn!("index for connection {} was out of time order; sorted", conn);
    }
    let pruned = index.prune_empty();
    if !pruned.is_empty() {
        tracing::debug!("pruned {} empty connections from index", pruned.len());
    }
    Ok(index)
}

fn read_index_record<R: Read>(
    reader: &mut R,
    chunk_pos: u64,
    connection_slots: &HashMap<u32, usize>,
    index: &mut Index,
) -> Result<()> {
    let header = IndexDataHeader::read_from(reader)?;
    if !connection_slots.contains_key(&header.conn) {
        return Err(BagError::UnknownConnection(header.conn));
    }

    let data = read_sized(reader)?;
    let expected = header.count as usize * INDEX_ENTRY_SIZE;
    if data.len() != expected {
        return Err(BagError::MalformedHeader(format!(
            "index data for connection {} holds {} bytes for {} entries (expected {})",
            header.conn,
            data.len(),
            header.count,
            expected
        )));
    }

    let mut cursor = ByteCursor::new(&data);
    for _ in 0..header.count {
        let time = cursor.read_time()?;
        let offset = cursor.read_u32()?;
        index.push(header.conn, IndexEntry::new(time, chunk_pos, offset));
    }
    Ok(())
}
