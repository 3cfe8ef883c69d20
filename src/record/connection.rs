//! Connection metadata
//!
//! A connection record is an outer header (`op`, `conn`, `topic`) followed
//! by a data block that is itself a field block describing the stream.

use std::io::{Read, Seek, Write};

use crate::error::{BagError, Result};
use crate::wire::FieldBlock;

use super::headers::{ConnectionHeader, RecordHeader};

/// One logical stream of messages within a bag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Connection id, unique within the bag
    pub id: u32,
    /// Topic the connection was recorded under
    pub topic: String,
    /// Topic as published (before any remapping)
    pub topic_original: String,
    /// Declared message type name, e.g. `std_msgs/String`
    pub type_name: String,
    pub md5sum: String,
    /// Full message definition text
    pub message_definition: String,
    pub caller_id: Option<String>,
    pub latching: Option<String>,
}

impl ConnectionInfo {
    /// Describe a new connection; the id is assigned by the writer
    pub fn new(
        topic: impl Into<String>,
        type_name: impl Into<String>,
        md5sum: impl Into<String>,
        message_definition: impl Into<String>,
    ) -> Self {
        let topic = topic.into();
        Self {
            id: 0,
            topic_original: topic.clone(),
            topic,
            type_name: type_name.into(),
            md5sum: md5sum.into(),
            message_definition: message_definition.into(),
            caller_id: None,
            latching: None,
        }
    }

    pub fn with_caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    pub fn with_latching(mut self, latching: impl Into<String>) -> Self {
        self.latching = Some(latching.into());
        self
    }

    pub fn is_latching(&self) -> bool {
        self.latching.as_deref() == Some("1")
    }

    /// Combine an outer connection header with its nested data block
    pub fn from_blocks(outer: &FieldBlock, inner: &FieldBlock) -> Result<Self> {
        let header = ConnectionHeader::from_fields(outer)?;
        for name in ["topic", "type", "md5sum", "message_definition"] {
            if !inner.contains(name) {
                return Err(BagError::MalformedHeader(format!(
                    "connection {} data is missing field '{}'",
                    header.conn, name
                )));
            }
        }
        Ok(Self {
            id: header.conn,
            topic: header.topic,
            topic_original: inner.require_string("topic")?,
            type_name: inner.require_string("type")?,
            md5sum: inner.require_string("md5sum")?,
            message_definition: inner.require_string("message_definition")?,
            caller_id: inner.optional_string("callerid")?,
            latching: inner.optional_string("latching")?,
        })
    }

    pub fn header(&self) -> ConnectionHeader {
        ConnectionHeader {
            conn: self.id,
            topic: self.topic.clone(),
        }
    }

    /// The nested field block stored in the record's data section
    pub fn data_fields(&self) -> FieldBlock {
        let mut block = FieldBlock::new()
            .field("topic", self.topic_original.as_bytes())
            .field("type", self.type_name.as_bytes())
            .field("md5sum", self.md5sum.as_bytes())
            .field("message_definition", self.message_definition.as_bytes());
        if let Some(caller_id) = &self.caller_id {
            block.insert("callerid", caller_id.as_bytes());
        }
        if let Some(latching) = &self.latching {
            block.insert("latching", latching.as_bytes());
        }
        block
    }

    /// Read a full connection record (header and data) from a stream
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let outer = FieldBlock::read_expecting(reader, ConnectionHeader::OP)?;
        let inner = FieldBlock::read_from(reader)?;
        Self::from_blocks(&outer, &inner)
    }

    /// Write a full connection record (header and data)
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        self.header().write_to(writer)?;
        // the data block is itself a field block; its length prefix doubles as the data length
        self.data_fields().write_to(writer)?;
        Ok(())
    }
}
