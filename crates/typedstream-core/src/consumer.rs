//! Consuming side: a response body in, typed values out.
//!
//! Bytes pass through [`Utf8Decoder`], [`LineFramer`] and [`RecordDecoder`]
//! inside one lazy [`TypedStream`]. The first failure ends the stream;
//! values already yielded stay valid.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::config::StreamConfig;
use crate::error::{BoxError, Error, Result};
use crate::ndjson::{LineFramer, RecordDecoder, Utf8Decoder};
use crate::route::TypedStreamMarker;

/// Type-erased response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, BoxError>> + Send>>;

/// Statuses whose responses never carry a body.
const fn is_null_body_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 101 | 103 | 204 | 205 | 304)
}

/// A received response whose body is a typed stream of `T`.
pub struct ClientResponse<T> {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<ByteStream>,
    _marker: PhantomData<fn() -> (T, TypedStreamMarker)>,
}

impl<T> ClientResponse<T> {
    /// Wrap an arbitrary byte stream as the response body.
    pub fn new<S, B, E>(status: StatusCode, body: S) -> Self
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: Into<Bytes>,
        E: Into<BoxError>,
    {
        let body = body.map(|chunk| chunk.map(Into::<Bytes>::into).map_err(Into::<BoxError>::into));
        Self {
            status,
            headers: HeaderMap::new(),
            body: Some(Box::pin(body)),
            _marker: PhantomData,
        }
    }

    /// A response that carries no body at all.
    pub fn without_body(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
            _marker: PhantomData,
        }
    }

    /// Attach the headers received with the response.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// HTTP status of the response.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether a body is present; receiving fails with `MissingBody` otherwise.
    pub const fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

impl<T> std::fmt::Debug for ClientResponse<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

impl<T> From<reqwest::Response> for ClientResponse<T> {
    fn from(res: reqwest::Response) -> Self {
        let status = res.status();
        let headers = res.headers().clone();
        if is_null_body_status(status) {
            Self::without_body(status).with_headers(headers)
        } else {
            Self::new(status, res.bytes_stream()).with_headers(headers)
        }
    }
}

impl<T> From<axum::response::Response> for ClientResponse<T> {
    fn from(res: axum::response::Response) -> Self {
        let (parts, body) = res.into_parts();
        if is_null_body_status(parts.status) {
            Self::without_body(parts.status).with_headers(parts.headers)
        } else {
            Self::new(parts.status, body.into_data_stream()).with_headers(parts.headers)
        }
    }
}

/// Lazy, single-pass stream of decoded values.
///
/// Dropping it releases the underlying body. After an error it yields
/// `None`.
pub struct TypedStream<T> {
    inner: Pin<Box<dyn Stream<Item = Result<T>> + Send>>,
}

impl<T> std::fmt::Debug for TypedStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedStream").finish_non_exhaustive()
    }
}

impl<T> Stream for TypedStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Turn a received response into a stream of `T`.
///
/// Fails with [`Error::MissingBody`] before reading anything when the
/// response has no body.
pub fn receive_typed_stream<T>(res: ClientResponse<T>) -> Result<TypedStream<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    receive_typed_stream_with(res, &StreamConfig::default())
}

/// Like [`receive_typed_stream`], applying the line limit from `config`.
pub fn receive_typed_stream_with<T>(
    res: ClientResponse<T>,
    config: &StreamConfig,
) -> Result<TypedStream<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let Some(body) = res.body else {
        return Err(Error::MissingBody);
    };
    debug!(status = %res.status, "Receiving typed stream");
    Ok(TypedStream {
        inner: Box::pin(decode_records(body, framer_for(config))),
    })
}

/// Decode NDJSON from any byte stream, e.g. a file or a child process.
pub fn decode_byte_stream<T, S, B, E>(stream: S, config: &StreamConfig) -> TypedStream<T>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: Into<Bytes>,
    E: Into<BoxError>,
{
    let body: ByteStream = Box::pin(
        stream.map(|chunk| chunk.map(Into::<Bytes>::into).map_err(Into::<BoxError>::into)),
    );
    TypedStream {
        inner: Box::pin(decode_records(body, framer_for(config))),
    }
}

fn framer_for(config: &StreamConfig) -> LineFramer {
    config
        .max_line_bytes
        .map_or_else(LineFramer::new, LineFramer::with_max_line_len)
}

fn decode_records<T>(mut body: ByteStream, mut framer: LineFramer) -> impl Stream<Item = Result<T>> + Send
where
    T: DeserializeOwned + Send + 'static,
{
    async_stream::try_stream! {
        let mut text = Utf8Decoder::new();
        let mut records = RecordDecoder::<T>::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Error::Transport)?;
            for line in framer.feed(&text.decode(&chunk))? {
                yield decode_line(&mut records, &line)?;
            }
            framer.check()?;
        }

        if let Some(tail) = text.finish() {
            for line in framer.feed(&tail)? {
                yield decode_line(&mut records, &line)?;
            }
            framer.check()?;
        }
        if let Some(line) = framer.flush() {
            yield decode_line(&mut records, &line)?;
        }
        debug!(records = records.records(), "Typed stream completed");
    }
}

fn decode_line<T: DeserializeOwned>(records: &mut RecordDecoder<T>, line: &str) -> Result<T> {
    records.decode(line).inspect_err(|err| {
        warn!(error = %err, "Ending typed stream at undecodable record");
    })
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Message {
        message: String,
    }

    fn response<T>(chunks: &[&'static [u8]]) -> ClientResponse<T> {
        ClientResponse::new(
            StatusCode::OK,
            tokio_stream::iter(chunks.to_vec().into_iter().map(Ok::<_, Infallible>)),
        )
    }

    async fn collect<T>(stream: TypedStream<T>) -> Vec<Result<T>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn yields_values_in_order() {
        let res = response::<Message>(&[
            b"{\"message\":\"Hel",
            b"lo\"}\n{\"message\":",
            b"\"World\"}\n",
        ]);
        let values: Vec<Message> = collect(receive_typed_stream(res).unwrap())
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            values,
            vec![
                Message { message: "Hello".into() },
                Message { message: "World".into() },
            ]
        );
    }

    #[tokio::test]
    async fn missing_body_fails_before_reading() {
        let res = ClientResponse::<Message>::without_body(StatusCode::NO_CONTENT);
        assert!(matches!(receive_typed_stream(res), Err(Error::MissingBody)));
    }

    #[tokio::test]
    async fn final_line_without_delimiter_is_decoded() {
        let res = response::<u32>(&[b"1\r\n2\r\n", b"3"]);
        let values: Vec<u32> = collect(receive_typed_stream(res).unwrap())
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn multibyte_character_split_across_chunks() {
        let res = response::<String>(&[b"\"caf\xc3", b"\xa9\"\n"]);
        let mut stream = receive_typed_stream(res).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "café");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn malformed_record_ends_stream_after_valid_values() {
        let res = response::<u32>(&[b"1\n2\nnope\n4\n"]);
        let mut stream = receive_typed_stream(res).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        assert_eq!(stream.next().await.unwrap().unwrap(), 2);
        assert!(matches!(
            stream.next().await,
            Some(Err(Error::Decode { record: 3, .. }))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_line_is_a_decode_error() {
        let res = response::<u32>(&[b"1\n\n2\n"]);
        let results = collect(receive_typed_stream(res).unwrap()).await;
        assert_eq!(results.len(), 2);
        assert!(matches!(results[1], Err(Error::Decode { record: 2, .. })));
    }

    #[tokio::test]
    async fn transport_error_surfaces_in_stream() {
        let chunks: Vec<std::result::Result<&'static [u8], std::io::Error>> = vec![
            Ok(&b"1\n"[..]),
            Err(std::io::Error::other("connection reset")),
        ];
        let res = ClientResponse::<u32>::new(StatusCode::OK, tokio_stream::iter(chunks));
        let results = collect(receive_typed_stream(res).unwrap()).await;
        assert!(matches!(results[0], Ok(1)));
        assert!(matches!(results[1], Err(Error::Transport(_))));
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn line_limit_applies_from_config() {
        let config = StreamConfig {
            max_line_bytes: Some(8),
            ..StreamConfig::default()
        };
        let res = response::<String>(&[b"\"short\"\n\"far too long\"\n"]);
        let results = collect(receive_typed_stream_with(res, &config).unwrap()).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "short");
        assert!(matches!(results[1], Err(Error::LineTooLong { limit: 8 })));
    }

    #[tokio::test]
    async fn line_limit_does_not_depend_on_chunking() {
        let config = StreamConfig {
            max_line_bytes: Some(8),
            ..StreamConfig::default()
        };
        let whole: &[&'static [u8]] = &[b"\"a\"\n\"b\"\n\"far too long\"\n"];
        let after_first: &[&'static [u8]] = &[b"\"a\"\n", b"\"b\"\n\"far too long\"\n"];
        let mid_line: &[&'static [u8]] = &[b"\"a\"\n\"b\"\n\"far too", b" long\"\n"];
        for chunks in [whole, after_first, mid_line] {
            let res = response::<String>(chunks);
            let results = collect(receive_typed_stream_with(res, &config).unwrap()).await;
            let values: Vec<&str> = results.iter().filter_map(|r| r.as_deref().ok()).collect();
            assert_eq!(values, vec!["a", "b"], "{chunks:?}");
            assert!(matches!(results.last(), Some(Err(Error::LineTooLong { limit: 8 }))));
        }
    }

    #[tokio::test]
    async fn empty_body_yields_nothing() {
        let res = response::<u32>(&[]);
        assert!(collect(receive_typed_stream(res).unwrap()).await.is_empty());
    }

    #[tokio::test]
    async fn null_body_status_from_axum_response() {
        let res = axum::response::Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(axum::body::Body::empty())
            .unwrap();
        let res = ClientResponse::<u32>::from(res);
        assert!(!res.has_body());
    }

    #[tokio::test]
    async fn reqwest_response_is_decoded() {
        let res = reqwest::Response::from(
            axum::http::Response::builder()
                .status(StatusCode::OK)
                .body("{\"message\":\"from reqwest\"}\n")
                .unwrap(),
        );
        let res = ClientResponse::<Message>::from(res);
        assert_eq!(res.status(), StatusCode::OK);
        let mut stream = receive_typed_stream(res).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().message, "from reqwest");
    }

    #[tokio::test]
    async fn decodes_arbitrary_byte_stream() {
        let chunks = tokio_stream::iter([Ok::<_, Infallible>(Bytes::from_static(b"[1,2]\n[3]"))]);
        let values: Vec<Vec<u8>> = decode_byte_stream(chunks, &StreamConfig::default())
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(values, vec![vec![1, 2], vec![3]]);
    }
}
