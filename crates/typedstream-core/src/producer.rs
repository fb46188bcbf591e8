//! Producing side: values in, an NDJSON response body out.
//!
//! [`typed_stream`] turns a value source into a [`TypedStreamResponse`]. When
//! axum converts it into a response, a task is spawned that pulls values,
//! encodes each one as a record and writes it through a [`TextStreamWriter`].
//! The writer feeds a bounded channel drained by the response body, so a
//! slow client suspends the producer.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, trace, warn};

use crate::config::StreamConfig;
use crate::error::{BoxError, Error, Result};
use crate::ndjson::{self, encode_record};
use crate::route::TypedStreamMarker;

type Frame = std::result::Result<Bytes, std::io::Error>;
/// Boxed, type-erased value source.
pub type ValueStream<T> = Pin<Box<dyn Stream<Item = std::result::Result<T, BoxError>> + Send>>;

/// Write handle passed to a [`stream_text`] callback.
#[derive(Debug)]
pub struct TextStreamWriter {
    tx: mpsc::Sender<Frame>,
}

impl TextStreamWriter {
    /// Write `text` as is.
    pub async fn write(&mut self, text: &str) -> Result<()> {
        self.send(Ok(Bytes::copy_from_slice(text.as_bytes()))).await
    }

    /// Write `text` followed by one `\n`.
    pub async fn writeln(&mut self, text: &str) -> Result<()> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push(ndjson::DELIMITER);
        self.send(Ok(Bytes::from(line))).await
    }

    /// Whether the response body has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolve once the response body has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// End the body with an error so the HTTP layer aborts the response
    /// instead of terminating it cleanly.
    pub async fn abort(self, reason: String) {
        let _ = self.tx.send(Err(std::io::Error::other(reason))).await;
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.tx.send(frame).await.map_err(|_| Error::TransportWrite)
    }
}

/// Start a streaming text body.
///
/// `callback` runs on its own task and receives the writer. At most
/// `capacity` writes are buffered ahead of the body. An error returned by
/// the callback is logged; bytes already written stay written.
pub fn stream_text<F, Fut>(capacity: usize, callback: F) -> Body
where
    F: FnOnce(TextStreamWriter) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = callback(TextStreamWriter { tx });
    tokio::spawn(async move {
        match task.await {
            Ok(()) => {}
            Err(Error::TransportWrite) => debug!("Text stream receiver closed early"),
            Err(e) => warn!(error = %e, "Text stream aborted"),
        }
    });
    Body::from_stream(ReceiverStream::new(rx))
}

/// Where the values of a typed stream come from.
pub enum StreamSource<C, T> {
    /// A stream built ahead of the response.
    Stream(ValueStream<T>),
    /// A function invoked with the request context to build the stream.
    Generator(Box<dyn FnOnce(C) -> ValueStream<T> + Send>),
}

impl<C, T: Send + 'static> StreamSource<C, T> {
    /// A prebuilt stream of values that cannot fail.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self::Stream(Box::pin(stream.map(Ok::<T, BoxError>)))
    }

    /// A prebuilt stream whose items may fail. The first error aborts the
    /// response.
    pub fn try_from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::Stream(Box::pin(
            stream.map(|item| item.map_err(Into::<BoxError>::into)),
        ))
    }

    /// A generator called with the request context.
    pub fn from_fn<F, S>(generator: F) -> Self
    where
        F: FnOnce(C) -> S + Send + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        Self::Generator(Box::new(move |ctx| -> ValueStream<T> {
            Box::pin(generator(ctx).map(Ok::<T, BoxError>))
        }))
    }

    /// A generator called with the request context whose items may fail.
    pub fn try_from_fn<F, S, E>(generator: F) -> Self
    where
        F: FnOnce(C) -> S + Send + 'static,
        S: Stream<Item = std::result::Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::Generator(Box::new(move |ctx| -> ValueStream<T> {
            Box::pin(generator(ctx).map(|item| item.map_err(Into::<BoxError>::into)))
        }))
    }

    fn open(self, ctx: C) -> ValueStream<T> {
        match self {
            Self::Stream(stream) => stream,
            Self::Generator(generator) => generator(ctx),
        }
    }
}

/// A response streaming values of type `T` as NDJSON.
///
/// `T` and [`TypedStreamMarker`] exist only in the type, so client code
/// sharing the same [`StreamRoute`](crate::route::StreamRoute) decodes the
/// body as `T` without any negotiation on the wire.
pub struct TypedStreamResponse<T> {
    values: ValueStream<T>,
    config: StreamConfig,
    _marker: PhantomData<fn() -> (T, TypedStreamMarker)>,
}

impl<T> TypedStreamResponse<T> {
    /// Use `config` for the channel capacity instead of the defaults.
    #[must_use]
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }
}

impl<T> std::fmt::Debug for TypedStreamResponse<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedStreamResponse")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Build a typed NDJSON response from `source`.
///
/// A generator source is invoked here with `ctx`; its stream is only
/// polled once the response body is being sent.
pub fn typed_stream<C, T>(ctx: C, source: StreamSource<C, T>) -> TypedStreamResponse<T>
where
    T: Serialize + Send + 'static,
{
    TypedStreamResponse {
        values: source.open(ctx),
        config: StreamConfig::default(),
        _marker: PhantomData,
    }
}

impl<T> IntoResponse for TypedStreamResponse<T>
where
    T: Serialize + Send + 'static,
{
    fn into_response(self) -> Response {
        let Self {
            mut values, config, ..
        } = self;

        let body = stream_text(config.channel_capacity, move |mut writer| async move {
            let mut records = 0u64;
            loop {
                // An idle source must not outlive the body, so wait on both.
                let item = tokio::select! {
                    item = values.next() => item,
                    () = writer.closed() => {
                        debug!(records, "Body dropped, releasing value source");
                        return Err(Error::TransportWrite);
                    }
                };
                let Some(item) = item else { break };
                let value = match item {
                    Ok(value) => value,
                    Err(source) => {
                        let err = Error::Source(source);
                        writer.abort(err.to_string()).await;
                        return Err(err);
                    }
                };
                let line = match encode_record(&value) {
                    Ok(line) => line,
                    Err(err) => {
                        writer.abort(err.to_string()).await;
                        return Err(err);
                    }
                };
                writer.writeln(&line).await?;
                records += 1;
                trace!(records, "Record written");
            }
            debug!(records, "Typed stream finished");
            Ok(())
        });

        (
            [
                (CONTENT_TYPE, ndjson::CONTENT_TYPE),
                (X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            body,
        )
            .into_response()
    }
}
