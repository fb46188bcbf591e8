//! NDJSON wire format for typed streams.
//!
//! One compact JSON value per line, `\n` delimited. Readers tolerate a
//! `\r` before the delimiter, writers never emit one. A final line without
//! delimiter is still a complete record.

mod framing;
mod record;
mod text;

pub use framing::LineFramer;
pub use record::{RecordDecoder, encode_record};
pub use text::Utf8Decoder;

/// Record delimiter.
pub const DELIMITER: char = '\n';

/// Media type advertised for typed stream bodies.
pub const CONTENT_TYPE: &str = "application/x-ndjson";
