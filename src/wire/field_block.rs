//! Field block codec
//!
//! The record envelope used by every record kind: a length-prefixed list of
//! `name=value` fields. Values are raw bytes; typed accessors decode them on
//! demand.

use std::io::{Read, Seek, Write};

use crate::error::{BagError, Result};
use crate::record::OpCode;

use super::cursor::ByteCursor;
use super::primitives::{decode_u32, decode_u64, read_sized};
use super::sized::SizedBlock;
use super::time::{decode_time, Time};

/// Separator between a field's name and its value
pub const FIELD_SEPARATOR: u8 = b'=';

/// Name of the field that carries a record's opcode
const OP_FIELD: &str = "op";

/// Ordered collection of named byte-valued fields
///
/// Fields keep insertion order on encode. Inserting an existing name
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldBlock {
    fields: Vec<(String, Vec<u8>)>,
}

impl FieldBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a block whose first field is `op`
    pub fn with_op(op: OpCode) -> Self {
        let mut block = Self::new();
        block.insert(OP_FIELD, [op.as_byte()]);
        block
    }

    /// Builder-style insert
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    // =========================================================================
    // Typed Accessors
    // =========================================================================

    /// Get a field that must be present
    pub fn require(&self, name: &str) -> Result<&[u8]> {
        self.get(name)
            .ok_or_else(|| BagError::MalformedHeader(format!("missing field '{}'", name)))
    }

    pub fn require_u32(&self, name: &str) -> Result<u32> {
        decode_u32(self.require(name)?)
    }

    pub fn require_u64(&self, name: &str) -> Result<u64> {
        decode_u64(self.require(name)?)
    }

    pub fn require_time(&self, name: &str) -> Result<Time> {
        decode_time(self.require(name)?)
    }

    pub fn require_string(&self, name: &str) -> Result<String> {
        utf8_field(name, self.require(name)?)
    }

    pub fn optional_string(&self, name: &str) -> Result<Option<String>> {
        self.get(name).map(|v| utf8_field(name, v)).transpose()
    }

    /// Decode the `op` field
    pub fn op(&self) -> Result<OpCode> {
        let raw = self.require(OP_FIELD)?;
        match raw {
            [byte] => OpCode::try_from(*byte),
            _ => Err(BagError::MalformedHeader(format!(
                "op field must be 1 byte, got {}",
                raw.len()
            ))),
        }
    }

    /// Check that the `op` field equals `expected`
    pub fn expect_op(&self, expected: OpCode) -> Result<()> {
        let actual = self.op()?;
        if actual != expected {
            return Err(BagError::UnexpectedOpcode { expected, actual });
        }
        Ok(())
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Size of the encoded fields, excluding the 4-byte total length
    pub fn body_len(&self) -> usize {
        self.fields
            .iter()
            .map(|(n, v)| 4 + n.len() + 1 + v.len())
            .sum()
    }

    /// Encode to `[total_len][field]*`
    pub fn encode(&self) -> Vec<u8> {
        let body_len = self.body_len();
        let mut out = Vec::with_capacity(4 + body_len);
        out.extend_from_slice(&(body_len as u32).to_le_bytes());
        for (name, value) in &self.fields {
            let field_len = (name.len() + 1 + value.len()) as u32;
            out.extend_from_slice(&field_len.to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.push(FIELD_SEPARATOR);
            out.extend_from_slice(value);
        }
        out
    }

    /// Write the block through a reserved length slot, returning the body length
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<u32> {
        let block = SizedBlock::begin(writer)?;
        for (name, value) in &self.fields {
            let field_len = (name.len() + 1 + value.len()) as u32;
            writer.write_all(&field_len.to_le_bytes())?;
            writer.write_all(name.as_bytes())?;
            writer.write_all(&[FIELD_SEPARATOR])?;
            writer.write_all(value)?;
        }
        block.commit(writer)
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Decode the fields of a block body (without its total-length prefix)
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(body);
        let mut block = Self::new();

        while !cursor.is_empty() {
            let field = cursor.read_sized().map_err(|_| {
                BagError::MalformedHeader(format!(
                    "field length at offset {} runs past the end of a {}-byte block",
                    cursor.position(),
                    body.len()
                ))
            })?;
            let split = field
                .iter()
                .position(|&b| b == FIELD_SEPARATOR)
                .ok_or_else(|| {
                    BagError::MalformedHeader(format!(
                        "field without '=' separator: {:?}",
                        String::from_utf8_lossy(field)
                    ))
                })?;
            let name = std::str::from_utf8(&field[..split]).map_err(|_| {
                BagError::MalformedHeader("field name is not valid UTF-8".to_string())
            })?;
            block.insert(name, &field[split + 1..]);
        }

        Ok(block)
    }

    /// Read a `[total_len][field]*` block from a stream
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Self::decode(&read_sized(reader)?)
    }

    /// Read a block from a stream and check its opcode
    pub fn read_expecting<R: Read>(reader: &mut R, expected: OpCode) -> Result<Self> {
        let block = Self::read_from(reader)?;
        block.expect_op(expected)?;
        Ok(block)
    }

    /// Read a `[total_len][field]*` block from an in-memory cursor
    pub fn read_from_cursor(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Self::decode(cursor.read_sized()?)
    }
}

fn utf8_field(name: &str, value: &[u8]) -> Result<String> {
    String::from_utf8(value.to_vec())
        .map_err(|_| BagError::MalformedHeader(format!("field '{}' is not valid UTF-8", name)))
}
