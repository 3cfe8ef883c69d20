//! Configuration for bagkit
//!
//! Centralized configuration with sensible defaults.

use crate::error::{BagError, Result};
use crate::record::Compression;

/// Default uncompressed chunk size before `BagWriter::write` rolls over (768 KiB)
pub const DEFAULT_CHUNK_THRESHOLD: usize = 768 * 1024;

/// Main configuration shared by readers and writers
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Writer Configuration
    // -------------------------------------------------------------------------
    /// Compression used for chunks opened implicitly by `BagWriter::write`
    pub compression: Compression,

    /// Uncompressed chunk size (bytes) after which `BagWriter::write`
    /// closes the current chunk and starts a new one
    pub chunk_threshold: usize,

    // -------------------------------------------------------------------------
    // Reader Configuration
    // -------------------------------------------------------------------------
    /// Keep decompressed chunks in memory, keyed by chunk record position
    pub cache_chunks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            cache_chunks: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.chunk_threshold == 0 {
            return Err(BagError::Config(
                "chunk_threshold must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the compression for implicitly opened chunks
    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    /// Set the chunk rollover threshold (in uncompressed bytes)
    pub fn chunk_threshold(mut self, bytes: usize) -> Self {
        self.config.chunk_threshold = bytes;
        self
    }

    /// Enable or disable the decompressed-chunk cache
    pub fn cache_chunks(mut self, enabled: bool) -> Self {
        self.config.cache_chunks = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
