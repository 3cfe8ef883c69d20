//! Bag writer
//!
//! Streams chunks to a new bag file and writes the index on finalize.
//!
//! ## Lifecycle
//! ```text
//!  create() ──► HeaderReserved ──► begin_chunk() ──► ChunkOpen ──► end_chunk() ──► ChunkClosed
//!                     │                                  ▲  │append()                │
//!                     │                                  └──┘                        │
//!                     │                 ◄──────────── begin_chunk() ◄────────────────┤
//!                     └──────────────────────► finalize() ◄──────────────────────────┘
//!                                                  │
//!                                                  ▼
//!                                              Finalized
//! ```
//!
//! Every length-prefixed block is written through a `SizedBlock`: a zero
//! length is reserved, the content is written, and the length is patched
//! once known. The chunk header and the bag header are rewritten in place
//! the same way; their fields are fixed-width, so the rewrite never
//! changes their size.

use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{BagError, Result};
use crate::record::{
    BagHeader, ChunkHeader, ChunkInfoHeader, Compression, ConnectionInfo, IndexDataHeader,
    MessageDataHeader, RecordHeader,
};
use crate::wire::{encode_time, SizedBlock, Time};

use super::chunk::ChunkConnection;
use super::compression::{codec_for, ChunkCodec};
use super::{HEADER_PADDING, HEADER_POS, HEADER_RECORD_LEN, MAGIC};

/// Where a writer is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Version line and placeholder header written, no chunk yet
    HeaderReserved,
    /// A chunk is accepting messages
    ChunkOpen,
    /// The last chunk was closed; another may be opened
    ChunkClosed,
    /// Index and header written; no further writes allowed
    Finalized,
    /// A write failed; the file is abandoned
    Failed,
}

/// A chunk being filled; contents are buffered until the chunk is closed
struct OpenChunk {
    record_pos: u64,
    compression: Compression,
    codec: &'static dyn ChunkCodec,
    /// Reserved length slot of the chunk's data block
    data_block: SizedBlock,
    buffer: Cursor<Vec<u8>>,
    /// Connection → (time, offset) in append order
    index: BTreeMap<u32, Vec<(Time, u32)>>,
    start: Option<Time>,
    end: Option<Time>,
}

/// What finalize needs to know about a closed chunk
struct ClosedChunk {
    record_pos: u64,
    start: Time,
    end: Time,
    connections: Vec<ChunkConnection>,
}

/// Writes a new bag file
///
/// The writer has exclusive use of its file. Any I/O failure moves it to
/// `WriterState::Failed`; the partial file is not repaired.
pub struct BagWriter {
    path: PathBuf,
    file: BufWriter<File>,
    config: Config,
    state: WriterState,
    chunk: Option<OpenChunk>,
    connections: Vec<ConnectionInfo>,
    /// Connections whose record has already been written into a chunk
    announced: HashSet<u32>,
    chunks: Vec<ClosedChunk>,
    message_count: u64,
}

impl BagWriter {
    /// Create a bag with the default configuration
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with_config(path, Config::default())
    }

    /// Create (or truncate) a bag file and reserve its header
    pub fn create_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut file = BufWriter::new(file);
        file.write_all(MAGIC)?;

        let mut writer = Self {
            path: path.to_path_buf(),
            file,
            config,
            state: WriterState::HeaderReserved,
            chunk: None,
            connections: Vec::new(),
            announced: HashSet::new(),
            chunks: Vec::new(),
            message_count: 0,
        };
        writer.write_header(&BagHeader::default())?;
        tracing::debug!("created bag {}", writer.path.display());
        Ok(writer)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn connections(&self) -> &[ConnectionInfo] {
        &self.connections
    }

    /// Number of chunks closed so far
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Register a connection and return its id
    ///
    /// Ids are assigned sequentially from 0; any id already set on `info`
    /// is overwritten.
    pub fn add_connection(&mut self, mut info: ConnectionInfo) -> Result<u32> {
        self.ensure_writable()?;
        let id = self.connections.len() as u32;
        info.id = id;
        tracing::debug!("connection {}: {} ({})", id, info.topic, info.type_name);
        self.connections.push(info);
        Ok(id)
    }

    /// Open a chunk; its record is reserved immediately with placeholder sizes
    ///
    /// An unsupported compression is reported without affecting the writer.
    pub fn begin_chunk(&mut self, compression: Compression) -> Result<()> {
        self.ensure_writable()?;
        if self.chunk.is_some() {
            return Err(BagError::WriterState("a chunk is already open".to_string()));
        }
        let codec = codec_for(&compression)?;
        self.guard(|w| w.reserve_chunk(compression, codec))
    }

    /// Append a message to the open chunk
    pub fn append(&mut self, conn: u32, time: Time, payload: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        if conn as usize >= self.connections.len() {
            return Err(BagError::UnknownConnection(conn));
        }
        if self.chunk.is_none() {
            return Err(BagError::WriterState("no chunk is open".to_string()));
        }
        self.guard(|w| w.append_message(conn, time, payload))
    }

    /// Close the open chunk: write its data, patch its sizes, write its index
    pub fn end_chunk(&mut self) -> Result<()> {
        self.ensure_writable()?;
        let Some(chunk) = self.chunk.take() else {
            return Err(BagError::WriterState("no chunk is open".to_string()));
        };
        self.guard(|w| w.close_chunk(chunk))
    }

    /// Append a message, opening and rolling chunks automatically
    ///
    /// Chunks use the configured compression and are closed once their
    /// uncompressed size reaches `chunk_threshold`.
    pub fn write(&mut self, conn: u32, time: Time, payload: &[u8]) -> Result<()> {
        if self.chunk.is_none() {
            self.begin_chunk(self.config.compression.clone())?;
        }
        self.append(conn, time, payload)?;

        let full = self
            .chunk
            .as_ref()
            .is_some_and(|c| c.buffer.get_ref().len() >= self.config.chunk_threshold);
        if full {
            self.end_chunk()?;
        }
        Ok(())
    }

    /// Write the connection table, chunk summaries and final header
    ///
    /// Closes the open chunk first, if any.
    pub fn finalize(&mut self) -> Result<BagHeader> {
        self.ensure_writable()?;
        if self.chunk.is_some() {
            self.end_chunk()?;
        }
        self.guard(|w| w.write_index())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_writable(&self) -> Result<()> {
        match self.state {
            WriterState::Finalized => Err(BagError::WriterState(
                "bag has already been finalized".to_string(),
            )),
            WriterState::Failed => Err(BagError::WriterState(
                "an earlier write failed; the bag is abandoned".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Run a write step, marking the writer failed if it errors
    fn guard<T>(&mut self, step: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = step(self);
        if let Err(e) = &result {
            tracing::warn!("write to {} failed: {}", self.path.display(), e);
            self.state = WriterState::Failed;
            self.chunk = None;
        }
        result
    }

    /// Write the header record at its fixed position, padded to 4096 bytes
    fn write_header(&mut self, header: &BagHeader) -> Result<()> {
        self.file.seek(SeekFrom::Start(HEADER_POS))?;
        header.write_to(&mut self.file)?;

        let used = self.file.stream_position()? - HEADER_POS;
        let padding = HEADER_RECORD_LEN.checked_sub(used + 4).ok_or_else(|| {
            BagError::WriterState(format!("header record of {} bytes does not fit", used))
        })?;

        let block = SizedBlock::begin(&mut self.file)?;
        self.file.write_all(&vec![HEADER_PADDING; padding as usize])?;
        block.commit(&mut self.file)?;
        Ok(())
    }

    fn reserve_chunk(
        &mut self,
        compression: Compression,
        codec: &'static dyn ChunkCodec,
    ) -> Result<()> {
        let record_pos = self.file.seek(SeekFrom::End(0))?;
        ChunkHeader {
            compression: compression.clone(),
            size: 0,
        }
        .write_to(&mut self.file)?;
        let data_block = SizedBlock::begin(&mut self.file)?;

        tracing::trace!("opened {} chunk at {}", compression, record_pos);
        self.chunk = Some(OpenChunk {
            record_pos,
            compression,
            codec,
            data_block,
            buffer: Cursor::new(Vec::new()),
            index: BTreeMap::new(),
            start: None,
            end: None,
        });
        self.state = WriterState::ChunkOpen;
        Ok(())
    }

    fn append_message(&mut self, conn: u32, time: Time, payload: &[u8]) -> Result<()> {
        let chunk = self
            .chunk
            .as_mut()
            .ok_or_else(|| BagError::WriterState("no chunk is open".to_string()))?;

        // a connection's record precedes its first message in the bag
        if !self.announced.contains(&conn) {
            self.connections[conn as usize].write_to(&mut chunk.buffer)?;
            self.announced.insert(conn);
        }

        let offset = u32::try_from(chunk.buffer.position()).map_err(|_| {
            BagError::WriterState("chunk exceeds the 4 GiB offset limit".to_string())
        })?;
        MessageDataHeader { conn, time }.write_to(&mut chunk.buffer)?;
        let data = SizedBlock::begin(&mut chunk.buffer)?;
        chunk.buffer.write_all(payload)?;
        data.commit(&mut chunk.buffer)?;

        chunk.index.entry(conn).or_default().push((time, offset));
        chunk.start = Some(chunk.start.map_or(time, |s| s.min(time)));
        chunk.end = Some(chunk.end.map_or(time, |e| e.max(time)));
        self.message_count += 1;
        Ok(())
    }

    fn close_chunk(&mut self, chunk: OpenChunk) -> Result<()> {
        let contents = chunk.buffer.into_inner();
        let size = u32::try_from(contents.len()).map_err(|_| {
            BagError::WriterState("chunk exceeds the 4 GiB size limit".to_string())
        })?;
        let stored = chunk.codec.compress(&contents)?;

        let data_slot = chunk.data_block.slot();
        self.file.write_all(&stored)?;
        let size_compressed = chunk.data_block.commit(&mut self.file)?;
        let end = self.file.stream_position()?;

        // patch the reserved chunk header with the real size
        self.file.seek(SeekFrom::Start(chunk.record_pos))?;
        ChunkHeader {
            compression: chunk.compression.clone(),
            size,
        }
        .write_to(&mut self.file)?;
        if self.file.stream_position()? != data_slot {
            return Err(BagError::WriterState(format!(
                "chunk header at {} changed size when patched",
                chunk.record_pos
            )));
        }
        self.file.seek(SeekFrom::Start(end))?;

        let mut connections = Vec::with_capacity(chunk.index.len());
        for (conn, mut entries) in chunk.index {
            entries.sort_by_key(|(time, _)| *time);
            let count = entries.len() as u32;
            IndexDataHeader::new(conn, count).write_to(&mut self.file)?;
            let data = SizedBlock::begin(&mut self.file)?;
            for (time, offset) in &entries {
                self.file.write_all(&encode_time(*time))?;
                self.file.write_all(&offset.to_le_bytes())?;
            }
            data.commit(&mut self.file)?;
            connections.push(ChunkConnection { conn, count });
        }

        tracing::debug!(
            "closed {} chunk at {}: {} connections, {} -> {} bytes",
            chunk.compression,
            chunk.record_pos,
            connections.len(),
            size,
            size_compressed
        );
        self.chunks.push(ClosedChunk {
            record_pos: chunk.record_pos,
            start: chunk.start.unwrap_or(Time::ZERO),
            end: chunk.end.unwrap_or(Time::ZERO),
            connections,
        });
        self.state = WriterState::ChunkClosed;
        Ok(())
    }

    fn write_index(&mut self) -> Result<BagHeader> {
        let index_pos = self.file.seek(SeekFrom::End(0))?;

        for connection in &self.connections {
            connection.write_to(&mut self.file)?;
        }

        for chunk in &self.chunks {
            ChunkInfoHeader::new(
                chunk.record_pos,
                chunk.start,
                chunk.end,
                chunk.connections.len() as u32,
            )
            .write_to(&mut self.file)?;
            let data = SizedBlock::begin(&mut self.file)?;
            for c in &chunk.connections {
                self.file.write_all(&c.conn.to_le_bytes())?;
                self.file.write_all(&c.count.to_le_bytes())?;
            }
            data.commit(&mut self.file)?;
        }

        let header = BagHeader {
            index_pos,
            conn_count: self.connections.len() as u32,
            chunk_count: self.chunks.len() as u32,
        };
        self.write_header(&header)?;
        self.file.flush()?;
        self.file.get_ref().sync_all()?;

        self.state = WriterState::Finalized;
        tracing::debug!(
            "finalized {}: {} connections, {} chunks, {} messages",
            self.path.display(),
            header.conn_count,
            header.chunk_count,
            self.message_count
        );
        Ok(header)
    }
}
