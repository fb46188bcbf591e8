//! Typed routes shared by server and client code.
//!
//! A `const` [`StreamRoute`] names a path and its element type once. The
//! server answers it with [`StreamRoute::respond`], the client calls it with
//! [`StreamRoute::fetch`], and both sides are checked against the same `T`
//! at compile time.

use std::marker::PhantomData;

use axum::http::header::ACCEPT;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::consumer::ClientResponse;
use crate::error::Result;
use crate::ndjson;
use crate::producer::{StreamSource, TypedStreamResponse, typed_stream};

/// Type-level tag marking a response as a typed stream. Never constructed.
#[derive(Debug, Clone, Copy)]
pub enum TypedStreamMarker {}

/// A GET endpoint streaming values of type `T`.
pub struct StreamRoute<T> {
    path: &'static str,
    _marker: PhantomData<fn() -> (T, TypedStreamMarker)>,
}

impl<T> StreamRoute<T> {
    pub const fn new(path: &'static str) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub const fn path(&self) -> &'static str {
        self.path
    }

    /// Absolute URL of this route under `base_url`.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path)
    }
}

impl<T> Clone for StreamRoute<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StreamRoute<T> {}

impl<T> std::fmt::Debug for StreamRoute<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRoute")
            .field("path", &self.path)
            .finish()
    }
}

impl<T> StreamRoute<T>
where
    T: Serialize + Send + 'static,
{
    /// Answer a request on this route.
    pub fn respond<C>(&self, ctx: C, source: StreamSource<C, T>) -> TypedStreamResponse<T> {
        typed_stream(ctx, source)
    }
}

impl<T> StreamRoute<T>
where
    T: DeserializeOwned,
{
    /// Start a GET request against this route. Callers may add query
    /// parameters or headers before passing it to [`send`](Self::send).
    pub fn request(&self, client: &reqwest::Client, base_url: &str) -> reqwest::RequestBuilder {
        client
            .get(self.url(base_url))
            .header(ACCEPT, ndjson::CONTENT_TYPE)
    }

    /// Like [`request`](Self::request), appending an already encoded query
    /// string.
    pub fn request_with_query(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        query: &str,
    ) -> reqwest::RequestBuilder {
        client
            .get(format!("{}?{query}", self.url(base_url)))
            .header(ACCEPT, ndjson::CONTENT_TYPE)
    }

    /// Send a request built by [`request`](Self::request).
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<ClientResponse<T>> {
        let res = request.send().await?;
        debug!(path = self.path, status = %res.status(), "Typed stream response received");
        Ok(res.into())
    }

    /// GET this route and return the response typed with `T`.
    pub async fn fetch(&self, client: &reqwest::Client, base_url: &str) -> Result<ClientResponse<T>> {
        self.send(self.request(client, base_url)).await
    }
}

/// Build an HTTP client for consuming typed streams.
pub fn http_client() -> Result<reqwest::Client> {
    // Ensure a TLS crypto provider is installed (reqwest uses rustls-no-provider).
    // The `Err` case just means it was already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
    Ok(reqwest::Client::builder().build()?)
}
