//! Byte cursor
//!
//! Positioned, bounds-checked reads over an in-memory buffer. Used to walk
//! decompressed chunk contents and record data blocks without copying.

use crate::error::{BagError, Result};

use super::primitives::{decode_u32, decode_u64};
use super::time::{decode_time, Time};

/// Read cursor over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the current position
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Move to an absolute offset; the offset may equal the buffer length
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(BagError::truncated(pos, self.buf.len()));
        }
        self.pos = pos;
        Ok(())
    }

    /// Take the next `len` bytes
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| BagError::truncated(len, self.remaining()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        decode_u32(self.take(4)?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        decode_u64(self.take(8)?)
    }

    pub fn read_time(&mut self) -> Result<Time> {
        decode_time(self.take(8)?)
    }

    /// Read a `[len: u32][bytes]` block, returning the bytes
    pub fn read_sized(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Skip a `[len: u32][bytes]` block
    pub fn skip_sized(&mut self) -> Result<()> {
        self.read_sized().map(|_| ())
    }
}
