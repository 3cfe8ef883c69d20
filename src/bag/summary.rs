//! Bag summary
//!
//! Aggregate statistics computed from the index and chunk table, in the
//! spirit of `rosbag info`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::wire::{Duration, Time};

use super::reader::Bag;

/// Per-topic statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub topic: String,
    pub type_name: String,
    pub md5sum: String,
    pub message_count: usize,
    /// Number of connections recorded under this topic
    pub connections: usize,
}

/// Statistics for a whole bag
#[derive(Debug, Clone)]
pub struct BagSummary {
    pub path: PathBuf,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub message_count: usize,
    pub chunk_count: usize,
    /// Chunk count per compression name
    pub compression: BTreeMap<String, usize>,
    pub size_compressed: u64,
    pub size_uncompressed: u64,
    /// Sorted by topic name
    pub topics: Vec<TopicSummary>,
}

impl BagSummary {
    pub fn from_bag(bag: &Bag) -> Self {
        let mut topics: BTreeMap<&str, TopicSummary> = BTreeMap::new();
        for connection in bag.connections() {
            let count = bag
                .index()
                .entries(connection.id)
                .map_or(0, |entries| entries.len());
            let topic = topics
                .entry(connection.topic.as_str())
                .or_insert_with(|| TopicSummary {
                    topic: connection.topic.clone(),
                    type_name: connection.type_name.clone(),
                    md5sum: connection.md5sum.clone(),
                    message_count: 0,
                    connections: 0,
                });
            topic.message_count += count;
            topic.connections += 1;
        }

        let mut compression = BTreeMap::new();
        let mut size_compressed = 0u64;
        let mut size_uncompressed = 0u64;
        for chunk in bag.chunks() {
            *compression
                .entry(chunk.compression.as_str().to_string())
                .or_insert(0) += 1;
            size_compressed += u64::from(chunk.size_compressed);
            size_uncompressed += u64::from(chunk.size_uncompressed);
        }

        Self {
            path: bag.path().to_path_buf(),
            start_time: bag.start_time(),
            end_time: bag.end_time(),
            message_count: bag.message_count(),
            chunk_count: bag.chunks().len(),
            compression,
            size_compressed,
            size_uncompressed,
            topics: topics.into_values().collect(),
        }
    }

    /// Time between the first and last message
    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end - start,
            _ => Duration::ZERO,
        }
    }
}

impl fmt::Display for BagSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "path:        {}", self.path.display())?;
        writeln!(f, "version:     2.0")?;
        writeln!(f, "duration:    {}", self.duration())?;
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                writeln!(f, "start:       {}", start)?;
                writeln!(f, "end:         {}", end)?;
            }
            _ => writeln!(f, "start/end:   (empty)")?,
        }
        writeln!(f, "messages:    {}", self.message_count)?;
        write!(f, "compression: ")?;
        let parts: Vec<String> = self
            .compression
            .iter()
            .map(|(name, count)| format!("{} [{}/{} chunks]", name, count, self.chunk_count))
            .collect();
        writeln!(f, "{}", if parts.is_empty() { "none".to_string() } else { parts.join(", ") })?;
        writeln!(
            f,
            "size:        {} bytes ({} uncompressed)",
            self.size_compressed, self.size_uncompressed
        )?;
        writeln!(f, "topics:")?;
        for topic in &self.topics {
            write!(
                f,
                "  {:<32} {:>8} msgs : {}",
                topic.topic, topic.message_count, topic.type_name
            )?;
            if topic.connections > 1 {
                write!(f, " ({} connections)", topic.connections)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
