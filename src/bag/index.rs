//! Per-connection time index
//!
//! Maps each connection id to the time-ordered list of locations of its
//! messages. Built once when a bag is opened, immutable afterwards.

use std::collections::BTreeMap;

use crate::wire::Time;

/// Location of one message: which chunk, and where inside its decompressed data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub time: Time,
    /// Offset of the owning chunk record in the file
    pub chunk_pos: u64,
    /// Offset of the message record within the decompressed chunk data
    pub offset: u32,
}

impl IndexEntry {
    pub fn new(time: Time, chunk_pos: u64, offset: u32) -> Self {
        Self {
            time,
            chunk_pos,
            offset,
        }
    }
}

/// Connection id → index entries ordered by time
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: BTreeMap<u32, Vec<IndexEntry>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty list for a connection
    pub(crate) fn register(&mut self, conn: u32) {
        self.entries.entry(conn).or_default();
    }

    pub(crate) fn push(&mut self, conn: u32, entry: IndexEntry) {
        self.entries.entry(conn).or_default().push(entry);
    }

    /// Stable-sort any connection whose entries are out of time order
    ///
    /// Returns the ids of the connections that had to be sorted.
    pub(crate) fn sort_unordered(&mut self) -> Vec<u32> {
        let mut sorted = Vec::new();
        for (conn, entries) in self.entries.iter_mut() {
            if !entries.windows(2).all(|w| w[0].time <= w[1].time) {
                entries.sort_by_key(|e| e.time);
                sorted.push(*conn);
            }
        }
        sorted
    }

    /// Drop connections with no entries, returning the dropped ids
    pub(crate) fn prune_empty(&mut self) -> Vec<u32> {
        let empty: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, entries)| entries.is_empty())
            .map(|(conn, _)| *conn)
            .collect();
        for conn in &empty {
            self.entries.remove(conn);
        }
        empty
    }

    /// Entries for a connection, or `None` if it has no messages
    pub fn entries(&self, conn: u32) -> Option<&[IndexEntry]> {
        self.entries.get(&conn).map(|e| e.as_slice())
    }

    pub fn contains(&self, conn: u32) -> bool {
        self.entries.contains_key(&conn)
    }

    /// Connection ids with at least one entry, ascending
    pub fn connection_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[IndexEntry])> {
        self.entries.iter().map(|(c, e)| (*c, e.as_slice()))
    }

    /// Number of connections in the index
    pub fn connection_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of messages across all connections
    pub fn message_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest message time in the index
    pub fn start_time(&self) -> Option<Time> {
        self.entries.values().filter_map(|e| e.first()).map(|e| e.time).min()
    }

    /// Latest message time in the index
    pub fn end_time(&self) -> Option<Time> {
        self.entries.values().filter_map(|e| e.last()).map(|e| e.time).max()
    }
}
