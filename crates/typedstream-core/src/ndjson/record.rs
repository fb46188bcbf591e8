//! Record codec: one line of JSON per value.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Decodes framed lines into values of the element type `T`.
///
/// Decoding is fail-fast: the first line that does not parse as `T` is an
/// error, and callers are expected to end the stream there rather than
/// skip ahead.
pub struct RecordDecoder<T> {
    records: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> RecordDecoder<T> {
    /// Create a decoder positioned before the first record.
    pub const fn new() -> Self {
        Self {
            records: 0,
            _marker: PhantomData,
        }
    }

    /// Decode one line.
    pub fn decode(&mut self, line: &str) -> Result<T> {
        self.records += 1;
        serde_json::from_str(line).map_err(|source| Error::Decode {
            record: self.records,
            source,
        })
    }
}

impl<T> RecordDecoder<T> {
    /// Number of lines handed to [`decode`](Self::decode) so far.
    pub const fn records(&self) -> u64 {
        self.records
    }
}

impl<T: DeserializeOwned> Default for RecordDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for RecordDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordDecoder")
            .field("records", &self.records)
            .finish()
    }
}

/// Serialize `value` as compact JSON, without the trailing delimiter.
///
/// JSON escapes control characters inside strings, so the result never
/// contains a raw newline.
pub fn encode_record<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Error::Encode)
}
