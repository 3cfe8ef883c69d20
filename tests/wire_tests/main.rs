//! Tests for the wire codec and typed record headers
