//! Tests for queries and the k-way merge
//!
//! These tests verify:
//! - Time-ordered merge across connections
//! - Topic and time filtering
//! - Early termination past the end bound
//! - Stable ordering of equal timestamps

use std::cell::Cell;
use std::rc::Rc;

use bagkit::bag::{EntryMerge, IndexEntry};
use bagkit::{Bag, BagWriter, Compression, Query, Time};

use crate::common::{connection, payload, setup_temp_bag, t, write_interleaved};

// =============================================================================
// Helper Functions
// =============================================================================

fn open_interleaved() -> (tempfile::TempDir, Bag) {
    let (temp, path) = setup_temp_bag();
    write_interleaved(&path, Compression::None);
    let bag = Bag::open(&path).unwrap();
    (temp, bag)
}

fn times(bag: &Bag, query: &Query) -> Vec<u32> {
    bag.query(query)
        .unwrap()
        .map(|m| m.unwrap().time.secs)
        .collect()
}

fn entry(secs: u32, offset: u32) -> IndexEntry {
    IndexEntry::new(Time::new(secs, 0), 0, offset)
}

/// Iterator wrapper that counts how many items were pulled from it
struct Counting<I> {
    inner: I,
    pulls: Rc<Cell<usize>>,
}

impl<I: Iterator> Iterator for Counting<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        let item = self.inner.next();
        if item.is_some() {
            self.pulls.set(self.pulls.get() + 1);
        }
        item
    }
}

// =============================================================================
// Query Tests
// =============================================================================

#[test]
fn test_merge_across_connections() {
    let (_temp, bag) = open_interleaved();

    let messages: Vec<_> = bag.messages().unwrap().map(|m| m.unwrap()).collect();
    let secs: Vec<u32> = messages.iter().map(|m| m.time.secs).collect();
    assert_eq!(secs, (1..=9).collect::<Vec<_>>());

    for message in &messages {
        assert_eq!(
            message.data.as_ref(),
            payload(message.topic(), message.time.secs).as_slice()
        );
    }
}

#[test]
fn test_topic_filter() {
    let (_temp, bag) = open_interleaved();

    assert_eq!(times(&bag, &Query::all().topics(["/b"])), vec![2, 5, 8]);
    assert_eq!(
        times(&bag, &Query::all().topics(["/a", "/c"])),
        vec![1, 3, 4, 6, 7, 9]
    );
}

#[test]
fn test_unknown_topic_is_empty() {
    let (_temp, bag) = open_interleaved();
    assert!(times(&bag, &Query::all().topics(["/nope"])).is_empty());
}

#[test]
fn test_empty_topic_set_selects_all() {
    let (_temp, bag) = open_interleaved();

    let query = Query::all().topics(Vec::<String>::new());
    assert_eq!(times(&bag, &query), (1..=9).collect::<Vec<_>>());
    assert_eq!(bag.connections_for(query.topics.as_ref()).len(), 3);
}

#[test]
fn test_time_bounds_inclusive() {
    let (_temp, bag) = open_interleaved();

    let query = Query::all().start(t(3)).end(t(6));
    assert_eq!(times(&bag, &query), vec![3, 4, 5, 6]);
    assert!(query.contains_time(t(3)));
    assert!(!query.contains_time(t(7)));
}

#[test]
fn test_start_equals_end() {
    let (_temp, bag) = open_interleaved();
    assert_eq!(times(&bag, &Query::all().start(t(5)).end(t(5))), vec![5]);
}

#[test]
fn test_bounds_outside_bag() {
    let (_temp, bag) = open_interleaved();

    assert!(times(&bag, &Query::all().start(t(10))).is_empty());
    assert!(times(&bag, &Query::all().end(Time::new(0, 999))).is_empty());
    assert_eq!(times(&bag, &Query::all().start(t(0)).end(t(100))).len(), 9);
}

#[test]
fn test_start_after_end_is_empty() {
    let (_temp, bag) = open_interleaved();
    assert!(times(&bag, &Query::all().start(t(6)).end(t(3))).is_empty());
}

#[test]
fn test_combined_filters() {
    let (_temp, bag) = open_interleaved();
    let query = Query::all().topics(["/a", "/b"]).start(t(2)).end(t(7));
    assert_eq!(times(&bag, &query), vec![2, 4, 5, 7]);
}

#[test]
fn test_entries_without_fetching() {
    let (_temp, bag) = open_interleaved();

    let entries: Vec<IndexEntry> = bag.entries(&Query::all().start(t(8))).collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].chunk_pos, bag.chunks()[1].record_pos);
    assert_eq!(entries[1].chunk_pos, bag.chunks()[2].record_pos);
    assert!(bag.cache().is_empty());
}

#[test]
fn test_equal_timestamps_keep_connection_order() {
    let (_temp, path) = setup_temp_bag();
    let mut writer = BagWriter::create(&path).unwrap();
    let a = writer.add_connection(connection("/a")).unwrap();
    let b = writer.add_connection(connection("/b")).unwrap();
    writer.begin_chunk(Compression::None).unwrap();
    writer.append(b, t(1), b"b1").unwrap();
    writer.append(a, t(1), b"a1").unwrap();
    writer.append(a, t(1), b"a2").unwrap();
    writer.end_chunk().unwrap();
    writer.finalize().unwrap();

    let bag = Bag::open(&path).unwrap();
    let payloads: Vec<Vec<u8>> = bag
        .messages()
        .unwrap()
        .map(|m| m.unwrap().data.to_vec())
        .collect();
    assert_eq!(payloads, vec![b"a1".to_vec(), b"a2".to_vec(), b"b1".to_vec()]);
}

#[test]
fn test_concurrent_queries_share_bag() {
    let (_temp, bag) = open_interleaved();

    std::thread::scope(|scope| {
        let handles: Vec<_> = ["/a", "/b", "/c"]
            .into_iter()
            .map(|topic| {
                let bag = &bag;
                scope.spawn(move || times(bag, &Query::all().topics([topic])).len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 3);
        }
    });
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_merge_is_lazy() {
    let pulls = Rc::new(Cell::new(0));
    let input = Counting {
        inner: vec![entry(1, 0), entry(2, 1)].into_iter(),
        pulls: Rc::clone(&pulls),
    };

    let mut merge = EntryMerge::new(vec![input], None, None);
    assert_eq!(pulls.get(), 0);

    assert_eq!(merge.next().unwrap().offset, 0);
    assert_eq!(pulls.get(), 2);
}

#[test]
fn test_merge_stops_at_end_bound() {
    let counters: Vec<Rc<Cell<usize>>> = (0..3).map(|_| Rc::new(Cell::new(0))).collect();
    let inputs: Vec<_> = (0..3u32)
        .map(|k| Counting {
            inner: (0..100u32).map(move |i| entry(i * 3 + k, i)),
            pulls: Rc::clone(&counters[k as usize]),
        })
        .collect();

    let end = Time::new(10, 0);
    let merged: Vec<u32> = EntryMerge::new(inputs, None, Some(end))
        .map(|e| e.time.secs)
        .collect();
    assert_eq!(merged, (0..=10).collect::<Vec<_>>());

    // each input is read at most one entry past its last in-range entry
    let in_range = [4, 4, 3];
    for (counter, expected) in counters.iter().zip(in_range) {
        assert!(counter.get() <= expected + 1);
    }
}

#[test]
fn test_merge_skips_before_start() {
    let inputs = vec![
        vec![entry(1, 0), entry(5, 1)].into_iter(),
        vec![entry(2, 2), entry(3, 3), entry(6, 4)].into_iter(),
    ];
    let merged: Vec<u32> = EntryMerge::new(inputs, Some(Time::new(3, 0)), None)
        .map(|e| e.offset)
        .collect();
    assert_eq!(merged, vec![3, 1, 4]);
}

#[test]
fn test_merge_empty_inputs() {
    let inputs: Vec<std::vec::IntoIter<IndexEntry>> = vec![Vec::new().into_iter()];
    assert_eq!(EntryMerge::new(inputs, None, None).count(), 0);

    let none: Vec<std::vec::IntoIter<IndexEntry>> = Vec::new();
    assert_eq!(EntryMerge::new(none, None, None).count(), 0);
}

#[test]
fn test_merge_fused_after_end() {
    let inputs = vec![vec![entry(1, 0), entry(9, 1), entry(2, 2)].into_iter()];
    let mut merge = EntryMerge::new(inputs, None, Some(Time::new(5, 0)));

    assert_eq!(merge.next().unwrap().offset, 0);
    assert!(merge.next().is_none());
    // the unsorted entry after the stop is never seen
    assert!(merge.next().is_none());
}
