//! Messages returned by queries
//!
//! The bag never interprets payloads. Turning payload bytes into a typed
//! value is the job of a `PayloadDecoder`, typically backed by a registry
//! keyed on the connection's type name and md5sum.

use bytes::Bytes;

use crate::record::ConnectionInfo;
use crate::wire::Time;

/// Decodes message payloads for the connections it knows about
pub trait PayloadDecoder {
    type Output;
    type Error;

    fn decode(
        &self,
        connection: &ConnectionInfo,
        payload: &[u8],
    ) -> std::result::Result<Self::Output, Self::Error>;
}

/// One message from a bag, payload still in its serialized form
#[derive(Debug, Clone)]
pub struct BagMessage<'a> {
    pub connection: &'a ConnectionInfo,
    pub time: Time,
    pub data: Bytes,
}

impl<'a> BagMessage<'a> {
    pub fn topic(&self) -> &'a str {
        &self.connection.topic
    }

    pub fn type_name(&self) -> &'a str {
        &self.connection.type_name
    }

    /// Decode the payload with an external decoder
    pub fn decode<D: PayloadDecoder>(&self, decoder: &D) -> std::result::Result<D::Output, D::Error> {
        decoder.decode(self.connection, &self.data)
    }
}
