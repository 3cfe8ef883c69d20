//! Query engine
//!
//! Merges the per-connection index lists of the selected connections into
//! one time-ordered stream, bounded by an optional time range.
//!
//! ## Merge
//! ```text
//!   conn 0: [1, 4, 7]  ─┐
//!   conn 1: [2, 5, 8]  ─┼─► min-heap (time, input) ─► 1 2 3 4 5 6 7 8 9
//!   conn 2: [3, 6, 9]  ─┘
//! ```
//! The heap holds at most one pending entry per input. Ties on time are
//! broken by input order, and each input keeps its own order, so the merge
//! is stable. The first entry past `end` stops the whole merge: every
//! input is sorted, so nothing after it can be in range.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::iter::Copied;
use std::slice;

use crate::error::{BagError, Result};
use crate::wire::Time;

use super::chunk::ChunkFetcher;
use super::index::IndexEntry;
use super::message::BagMessage;
use super::reader::Bag;

/// Iterator over one connection's slice of the index
pub type EntryIter<'a> = Copied<slice::Iter<'a, IndexEntry>>;

// =============================================================================
// Query
// =============================================================================

/// Which messages to read: an optional topic set and optional time bounds
///
/// Both bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub topics: Option<HashSet<String>>,
    pub start: Option<Time>,
    pub end: Option<Time>,
}

impl Query {
    /// Every message in the bag
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to the given topics
    ///
    /// An empty set places no restriction, the same as not calling this.
    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = Some(topics.into_iter().map(Into::into).collect());
        self
    }

    /// Skip messages before `start`
    pub fn start(mut self, start: Time) -> Self {
        self.start = Some(start);
        self
    }

    /// Stop at the first message after `end`
    pub fn end(mut self, end: Time) -> Self {
        self.end = Some(end);
        self
    }

    /// Whether a time falls inside the query's bounds
    pub fn contains_time(&self, time: Time) -> bool {
        self.start.map_or(true, |s| time >= s) && self.end.map_or(true, |e| time <= e)
    }
}

// =============================================================================
// K-way Merge
// =============================================================================

/// Pending head of one input
#[derive(Debug, PartialEq, Eq)]
struct Head {
    entry: IndexEntry,
    input: usize,
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.entry
            .time
            .cmp(&other.entry.time)
            .then(self.input.cmp(&other.input))
    }
}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lazy, single-pass merge of time-sorted entry streams
///
/// Inputs are pulled one entry at a time and only when needed. Nothing is
/// pulled before the first call to `next`.
pub struct EntryMerge<I> {
    inputs: Vec<I>,
    heap: BinaryHeap<Reverse<Head>>,
    start: Option<Time>,
    end: Option<Time>,
    primed: bool,
    done: bool,
}

impl<I: Iterator<Item = IndexEntry>> EntryMerge<I> {
    pub fn new(inputs: Vec<I>, start: Option<Time>, end: Option<Time>) -> Self {
        let capacity = inputs.len();
        Self {
            inputs,
            heap: BinaryHeap::with_capacity(capacity),
            start,
            end,
            primed: false,
            done: false,
        }
    }

    /// Pull the next in-range-or-later entry from one input onto the heap
    fn advance(&mut self, input: usize) {
        while let Some(entry) = self.inputs[input].next() {
            if self.start.is_some_and(|s| entry.time < s) {
                continue;
            }
            self.heap.push(Reverse(Head { entry, input }));
            return;
        }
    }
}

impl<I: Iterator<Item = IndexEntry>> Iterator for EntryMerge<I> {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<IndexEntry> {
        if self.done {
            return None;
        }
        if !self.primed {
            for input in 0..self.inputs.len() {
                self.advance(input);
            }
            self.primed = true;
        }

        let Some(Reverse(head)) = self.heap.pop() else {
            self.done = true;
            return None;
        };
        if self.end.is_some_and(|e| head.entry.time > e) {
            self.done = true;
            self.heap.clear();
            return None;
        }

        self.advance(head.input);
        Some(head.entry)
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Messages matching a query, in time order
///
/// Each item is resolved independently: a damaged chunk yields an error for
/// the entries that point into it and iteration can continue past them.
pub struct Messages<'a> {
    bag: &'a Bag,
    entries: EntryMerge<EntryIter<'a>>,
    fetcher: ChunkFetcher<'a, BufReader<File>>,
}

impl<'a> Messages<'a> {
    pub(crate) fn new(
        bag: &'a Bag,
        entries: EntryMerge<EntryIter<'a>>,
        fetcher: ChunkFetcher<'a, BufReader<File>>,
    ) -> Self {
        Self {
            bag,
            entries,
            fetcher,
        }
    }

    fn fetch(&mut self, entry: &IndexEntry) -> Result<BagMessage<'a>> {
        let raw = self.fetcher.resolve(entry)?;
        let bag = self.bag;
        let connection = bag
            .connection(raw.connection_id)
            .ok_or(BagError::UnknownConnection(raw.connection_id))?;
        Ok(BagMessage {
            connection,
            time: raw.time,
            data: raw.data,
        })
    }
}

impl<'a> Iterator for Messages<'a> {
    type Item = Result<BagMessage<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        Some(self.fetch(&entry))
    }
}
