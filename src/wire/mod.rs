//! Wire Module
//!
//! Low-level encoding shared by every record in a bag.
//!
//! ## Responsibilities
//! - Fixed-width little-endian primitives and the two-field time values
//! - Length-prefixed byte blocks
//! - The field block ("record header") envelope
//! - Reserve-then-commit length slots for blocks whose size is unknown
//!   until their content has been written
//!
//! ## Field Block Format
//! ```text
//! ┌───────────┬──────────────────────────────────────────────────┐
//! │ Len (4)   │ Field 1                     │ Field 2 │ ...     │
//! │           │ ┌─────────┬──────┬───┬──────┐│         │         │
//! │           │ │FieldLen │ Name │ = │Value ││         │         │
//! │           │ │  (4)    │      │   │      ││         │         │
//! │           │ └─────────┴──────┴───┴──────┘│         │         │
//! └───────────┴──────────────────────────────────────────────────┘
//! ```
//! `Len` covers every field; `FieldLen` covers `Name`, `=` and `Value`.

mod cursor;
mod field_block;
mod primitives;
mod sized;
mod time;

pub use cursor::ByteCursor;
pub use field_block::{FieldBlock, FIELD_SEPARATOR};
pub use primitives::{
    decode_bool, decode_f32, decode_f64, decode_i16, decode_i32, decode_i64, decode_i8,
    decode_sized, decode_u16, decode_u32, decode_u64, decode_u8, encode_bool, encode_f32,
    encode_f64, encode_i16, encode_i32, encode_i64, encode_i8, encode_sized, encode_string,
    encode_u16, encode_u32, encode_u64, encode_u8, read_sized, read_u32, read_u64, skip_sized,
};
pub use sized::SizedBlock;
pub use time::{decode_duration, decode_time, encode_duration, encode_time, Duration, Time};
