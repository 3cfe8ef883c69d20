//! Tests for opening bags
//!
//! These tests verify:
//! - Version and header validation
//! - Detection of bags that were never finalized
//! - Connection table and chunk summaries
//! - Index construction, including out-of-order and empty connections
//! - Bag summary

use std::fs;

use bagkit::{Bag, BagError, BagWriter, Compression, Config};

use crate::common::{connection, find, payload, setup_temp_bag, t, write_interleaved, write_small};

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_open_missing_file() {
    let (_temp, path) = setup_temp_bag();
    assert!(matches!(Bag::open(&path), Err(BagError::Io(_))));
}

#[test]
fn test_open_wrong_version() {
    let (_temp, path) = setup_temp_bag();
    let mut bytes = b"#ROSBAG V1.2\n".to_vec();
    bytes.resize(5000, b' ');
    fs::write(&path, bytes).unwrap();

    match Bag::open(&path) {
        Err(BagError::UnsupportedVersion(version)) => assert_eq!(version, "#ROSBAG V1.2"),
        other => panic!("expected UnsupportedVersion, got {:?}", other),
    }
}

#[test]
fn test_open_not_a_bag() {
    let (_temp, path) = setup_temp_bag();
    fs::write(&path, b"hello world, this is not a bag").unwrap();

    assert!(matches!(
        Bag::open(&path),
        Err(BagError::UnsupportedVersion(_))
    ));
}

#[test]
fn test_open_truncated_header() {
    let (_temp, path) = setup_temp_bag();
    fs::write(&path, b"#ROSBAG V2.0\n\x40\x00\x00\x00op=").unwrap();

    assert!(matches!(
        Bag::open(&path),
        Err(BagError::TruncatedInput { .. })
    ));
}

#[test]
fn test_open_unfinalized_bag() {
    let (_temp, path) = setup_temp_bag();
    {
        let mut writer = BagWriter::create(&path).unwrap();
        let a = writer.add_connection(connection("/a")).unwrap();
        writer.begin_chunk(Compression::None).unwrap();
        writer.append(a, t(1), b"x").unwrap();
        writer.end_chunk().unwrap();
        // dropped without finalize
    }

    assert!(matches!(Bag::open(&path), Err(BagError::Unindexed(0))));
}

#[test]
fn test_open_truncated_index() {
    let (_temp, path) = setup_temp_bag();
    write_interleaved(&path, Compression::None);

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

    assert!(matches!(
        Bag::open(&path),
        Err(BagError::TruncatedInput { .. })
    ));
}

/// Overwrite the u32 value of a header field
fn patch_header_count(path: &std::path::Path, field: &[u8], value: u32) {
    let mut bytes = fs::read(path).unwrap();
    let at = find(&bytes, field).unwrap() + field.len();
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    fs::write(path, bytes).unwrap();
}

#[test]
fn test_open_huge_connection_count() {
    let (_temp, path) = setup_temp_bag();
    {
        let mut writer = BagWriter::create(&path).unwrap();
        writer.add_connection(connection("/a")).unwrap();
        writer.finalize().unwrap();
    }
    patch_header_count(&path, b"conn_count=", u32::MAX);

    assert!(matches!(
        Bag::open(&path),
        Err(BagError::TruncatedInput { .. })
    ));
}

#[test]
fn test_open_huge_chunk_count() {
    let (_temp, path) = setup_temp_bag();
    write_small(&path, Compression::None);
    patch_header_count(&path, b"chunk_count=", u32::MAX);

    assert!(matches!(
        Bag::open(&path),
        Err(BagError::TruncatedInput { .. })
    ));
}

#[test]
fn test_open_connection_count_past_table() {
    let (_temp, path) = setup_temp_bag();
    write_small(&path, Compression::None);
    patch_header_count(&path, b"conn_count=", u32::MAX);

    // the record after the last connection is a chunk info
    assert!(matches!(
        Bag::open(&path),
        Err(BagError::UnexpectedOpcode { .. })
    ));
}

// =============================================================================
// Metadata Tests
// =============================================================================

#[test]
fn test_connections_and_topics() {
    let (_temp, path) = setup_temp_bag();
    write_interleaved(&path, Compression::None);
    let bag = Bag::open(&path).unwrap();

    assert_eq!(bag.connections().len(), 3);
    assert_eq!(bag.connection(1).unwrap().topic, "/b");
    assert!(bag.connection(9).is_none());

    let topics = bag.topics();
    assert_eq!(topics.len(), 3);
    assert!(topics.contains("/c"));

    let wanted = ["/a".to_string(), "/c".to_string()].into_iter().collect();
    let selected: Vec<&str> = bag
        .connections_for(Some(&wanted))
        .into_iter()
        .map(|c| c.topic.as_str())
        .collect();
    assert_eq!(selected, vec!["/a", "/c"]);
    assert_eq!(bag.connections_for(None).len(), 3);
}

#[test]
fn test_connection_metadata_preserved() {
    let (_temp, path) = setup_temp_bag();
    let mut writer = BagWriter::create(&path).unwrap();
    let info = connection("/latched")
        .with_caller_id("/node")
        .with_latching("1");
    let id = writer.add_connection(info.clone()).unwrap();
    writer.write(id, t(1), b"x").unwrap();
    writer.finalize().unwrap();

    let bag = Bag::open(&path).unwrap();
    let read = bag.connection(id).unwrap();
    assert_eq!(read.caller_id.as_deref(), Some("/node"));
    assert!(read.is_latching());
    assert_eq!(read.type_name, info.type_name);
    assert_eq!(read.message_definition, info.message_definition);
}

#[test]
fn test_chunk_summaries() {
    let (_temp, path) = setup_temp_bag();
    write_interleaved(&path, Compression::None);
    let bag = Bag::open(&path).unwrap();

    let chunks = bag.chunks();
    assert_eq!(chunks.len(), 3);
    assert!(chunks.windows(2).all(|w| w[0].record_pos < w[1].record_pos));
    assert_eq!((chunks[1].time_start, chunks[1].time_end), (t(2), t(8)));
    assert_eq!(chunks[2].connections[0].conn, 2);
    assert_eq!(chunks[2].connections[0].count, 3);
    for chunk in chunks {
        assert_eq!(chunk.compression, Compression::None);
        assert_eq!(chunk.size_compressed, chunk.size_uncompressed);
        assert!(chunk.data_pos > chunk.record_pos);
    }
}

// =============================================================================
// Index Tests
// =============================================================================

#[test]
fn test_index_per_connection() {
    let (_temp, path) = setup_temp_bag();
    write_interleaved(&path, Compression::None);
    let bag = Bag::open(&path).unwrap();

    let index = bag.index();
    assert_eq!(index.connection_count(), 3);
    assert_eq!(index.message_count(), 9);

    let times: Vec<u32> = index
        .entries(1)
        .unwrap()
        .iter()
        .map(|e| e.time.secs)
        .collect();
    assert_eq!(times, vec![2, 5, 8]);
    assert_eq!(bag.start_time(), Some(t(1)));
    assert_eq!(bag.end_time(), Some(t(9)));
}

#[test]
fn test_index_entries_point_into_owning_chunk() {
    let (_temp, path) = setup_temp_bag();
    write_interleaved(&path, Compression::None);
    let bag = Bag::open(&path).unwrap();

    for (conn, entries) in bag.index().iter() {
        let chunk = &bag.chunks()[conn as usize];
        for entry in entries {
            assert_eq!(entry.chunk_pos, chunk.record_pos);
            assert!(entry.offset < chunk.size_uncompressed);
        }
    }
}

#[test]
fn test_connection_without_messages_not_indexed() {
    let (_temp, path) = setup_temp_bag();
    let mut writer = BagWriter::create(&path).unwrap();
    let a = writer.add_connection(connection("/a")).unwrap();
    let idle = writer.add_connection(connection("/idle")).unwrap();
    writer.write(a, t(1), b"x").unwrap();
    writer.finalize().unwrap();

    let bag = Bag::open(&path).unwrap();
    assert_eq!(bag.connections().len(), 2);
    assert!(bag.connection(idle).is_some());
    assert!(!bag.index().contains(idle));
    assert!(bag.index().contains(a));
}

#[test]
fn test_out_of_order_index_is_sorted() {
    let (_temp, path) = setup_temp_bag();
    let mut writer = BagWriter::create(&path).unwrap();
    let a = writer.add_connection(connection("/a")).unwrap();
    for secs in [5, 3, 4] {
        writer.begin_chunk(Compression::None).unwrap();
        writer.append(a, t(secs), &payload("/a", secs)).unwrap();
        writer.end_chunk().unwrap();
    }
    writer.finalize().unwrap();

    let bag = Bag::open(&path).unwrap();
    let times: Vec<u32> = bag
        .index()
        .entries(a)
        .unwrap()
        .iter()
        .map(|e| e.time.secs)
        .collect();
    assert_eq!(times, vec![3, 4, 5]);

    let payloads: Vec<Vec<u8>> = bag
        .messages()
        .unwrap()
        .map(|m| m.unwrap().data.to_vec())
        .collect();
    assert_eq!(
        payloads,
        vec![payload("/a", 3), payload("/a", 4), payload("/a", 5)]
    );
}

#[test]
fn test_out_of_order_within_chunk() {
    let (_temp, path) = setup_temp_bag();
    let mut writer = BagWriter::create(&path).unwrap();
    let a = writer.add_connection(connection("/a")).unwrap();
    writer.begin_chunk(Compression::None).unwrap();
    for secs in [9, 2, 6] {
        writer.append(a, t(secs), &payload("/a", secs)).unwrap();
    }
    writer.end_chunk().unwrap();
    writer.finalize().unwrap();

    let bag = Bag::open(&path).unwrap();
    let times: Vec<u32> = bag
        .messages()
        .unwrap()
        .map(|m| m.unwrap().time.secs)
        .collect();
    assert_eq!(times, vec![2, 6, 9]);
}

// =============================================================================
// Summary Tests
// =============================================================================

#[test]
fn test_summary() {
    let (_temp, path) = setup_temp_bag();
    let mut writer = BagWriter::create(&path).unwrap();
    let a = writer.add_connection(connection("/a")).unwrap();
    let a2 = writer.add_connection(connection("/a")).unwrap();
    let b = writer.add_connection(connection("/b")).unwrap();
    writer.begin_chunk(Compression::None).unwrap();
    writer.append(a, t(10), b"1").unwrap();
    writer.append(a2, t(11), b"2").unwrap();
    writer.append(b, t(14), b"3").unwrap();
    writer.end_chunk().unwrap();
    writer.finalize().unwrap();

    let summary = Bag::open(&path).unwrap().summary();
    assert_eq!(summary.message_count, 3);
    assert_eq!(summary.chunk_count, 1);
    assert_eq!(summary.duration().as_secs_f64(), 4.0);
    assert_eq!(summary.compression.get("none"), Some(&1));
    assert_eq!(summary.topics.len(), 2);
    assert_eq!(summary.topics[0].topic, "/a");
    assert_eq!(summary.topics[0].message_count, 2);
    assert_eq!(summary.topics[0].connections, 2);

    let text = summary.to_string();
    assert!(text.contains("messages:    3"));
    assert!(text.contains("/b"));
}

#[test]
fn test_open_without_cache() {
    let (_temp, path) = setup_temp_bag();
    write_interleaved(&path, Compression::None);
    let config = Config::builder().cache_chunks(false).build();
    let bag = Bag::open_with_config(&path, config).unwrap();

    assert_eq!(bag.messages().unwrap().count(), 9);
    assert!(bag.cache().is_empty());
}
