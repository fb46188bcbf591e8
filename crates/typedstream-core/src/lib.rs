//! Typed NDJSON streams over HTTP.
//!
//! A server streams values of some type `T` as newline-delimited JSON; a
//! client reads them back as `T`. The element type travels only in the
//! Rust types of [`StreamRoute`], [`TypedStreamResponse`] and
//! [`ClientResponse`], never on the wire.
//!
//! - [`ndjson`]: line framing, record codec, streaming UTF-8 decoding
//! - [`producer`]: axum response streaming a value source
//! - [`consumer`]: decoding a response body into a value stream
//! - [`route`]: typed routes tying both sides to one `T`
//! - [`config`], [`error`], [`tracing_init`]: shared plumbing

pub mod config;
pub mod consumer;
pub mod error;
pub mod ndjson;
pub mod producer;
pub mod route;
pub mod tracing_init;

pub use config::StreamConfig;
pub use consumer::{ClientResponse, TypedStream, receive_typed_stream, receive_typed_stream_with};
pub use error::{Error, Result};
pub use producer::{StreamSource, TypedStreamResponse, stream_text, typed_stream};
pub use route::{StreamRoute, TypedStreamMarker};
