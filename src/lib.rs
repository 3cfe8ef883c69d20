//! # bagkit
//!
//! Reader and writer for chunked, indexed message logs in the ROS bag 2.0
//! container format:
//! - Length-prefixed field-block records
//! - Whole-chunk compression (bz2, lz4)
//! - Per-connection time index built at open
//! - Time-ordered, topic-filtered queries over many connections
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Bag (reader) / BagWriter                     │
//! └─────────────┬───────────────────────────────┬───────────────┘
//!               │                               │
//!               ▼                               ▼
//!   ┌───────────────────────┐       ┌───────────────────────┐
//!   │  Index + Query merge  │       │  Chunk fetcher/cache  │
//!   │   (k-way, by time)    │       │  (decompress, slice)  │
//!   └───────────┬───────────┘       └───────────┬───────────┘
//!               │                               │
//!               └───────────────┬───────────────┘
//!                               ▼
//!                 ┌───────────────────────────┐
//!                 │  Records (typed headers)  │
//!                 └─────────────┬─────────────┘
//!                               ▼
//!                 ┌───────────────────────────┐
//!                 │  Wire (field blocks, LE)  │
//!                 └───────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wire;
pub mod record;
pub mod bag;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BagError, Result};
pub use config::{Config, ConfigBuilder};
pub use wire::{Duration, Time};
pub use record::{Compression, ConnectionInfo, OpCode};
pub use bag::{
    Bag, BagMessage, BagSummary, BagWriter, PayloadDecoder, Query, TopicSummary, WriterState,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of bagkit
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
