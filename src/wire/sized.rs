//! Reserve-then-commit length slots
//!
//! Every block in the format is preceded by a 4-byte length that is not
//! known until the block has been written. A `SizedBlock` writes a zero
//! placeholder, lets the caller stream the content, then seeks back and
//! patches the slot with the measured length.
//!
//! ```text
//!   begin()          content written           commit()
//!  ┌────────┐      ┌────────┬──────────┐     ┌────────┬──────────┐
//!  │ 0 0 0 0│  →   │ 0 0 0 0│ content  │  →  │  len   │ content  │
//!  └────────┘      └────────┴──────────┘     └────────┴──────────┘
//!   ^slot                               ^end                      ^cursor
//! ```

use std::io::{Seek, SeekFrom, Write};

use crate::error::{BagError, Result};

/// A reserved 4-byte length slot awaiting its final value
#[derive(Debug)]
#[must_use = "a reserved length slot must be committed"]
pub struct SizedBlock {
    slot: u64,
}

impl SizedBlock {
    /// Reserve a length slot at the writer's current position
    pub fn begin<W: Write + Seek>(writer: &mut W) -> Result<Self> {
        let slot = writer.stream_position()?;
        writer.write_all(&0u32.to_le_bytes())?;
        Ok(Self { slot })
    }

    /// Position of the reserved slot
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Position of the first content byte
    pub fn content_start(&self) -> u64 {
        self.slot + 4
    }

    /// Patch the slot with the number of bytes written since `begin`
    ///
    /// Leaves the writer positioned at the end of the content and returns
    /// the committed length.
    pub fn commit<W: Write + Seek>(self, writer: &mut W) -> Result<u32> {
        let end = writer.stream_position()?;
        let len = end.checked_sub(self.content_start()).ok_or_else(|| {
            BagError::WriterState(format!(
                "writer moved before reserved block at {}",
                self.slot
            ))
        })?;
        let len = u32::try_from(len).map_err(|_| {
            BagError::WriterState(format!("block of {} bytes exceeds the 4 GiB limit", len))
        })?;

        writer.seek(SeekFrom::Start(self.slot))?;
        writer.write_all(&len.to_le_bytes())?;
        writer.seek(SeekFrom::Start(end))?;
        Ok(len)
    }
}
