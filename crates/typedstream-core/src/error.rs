//! Error types for the typed stream core library.

use thiserror::Error;

/// Boxed error used for transport failures of unknown concrete type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using the typed stream `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for typed stream operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The response handed to the consumer has no body.
    #[error("Response body is missing")]
    MissingBody,

    /// A record could not be decoded into the element type.
    #[error("Failed to decode record {record}: {source}")]
    Decode {
        /// 1-based position of the record in the stream.
        record: u64,
        #[source]
        source: serde_json::Error,
    },

    /// A line grew past the configured limit before its delimiter arrived.
    #[error("Line exceeds the maximum length of {limit} bytes")]
    LineTooLong { limit: usize },

    /// A value could not be serialized into a record.
    #[error("Failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// A fallible value source yielded an error.
    #[error("Stream source failed: {0}")]
    Source(#[source] BoxError),

    /// The receiving side of the response body is gone.
    #[error("Transport write failed: response body closed")]
    TransportWrite,

    /// Reading the response body failed.
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error ended a stream because of its content rather
    /// than because of the transport.
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::LineTooLong { .. })
    }
}
