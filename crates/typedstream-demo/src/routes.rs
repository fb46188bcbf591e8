use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;

use typedstream_core::{StreamConfig, StreamSource};

use crate::events::{self, TICKS, WORDS};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Delay between ticks.
    pub interval: Duration,
    /// Ticks sent when the request does not ask for a count.
    pub default_count: u64,
    /// Largest count a request may ask for.
    pub max_count: u64,
    pub stream: StreamConfig,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            default_count: 10,
            max_count: 10_000,
            stream: StreamConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TickParams {
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct WordParams {
    text: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(TICKS.path(), get(ticks))
        .route(WORDS.path(), get(words))
        .with_state(state)
}

/// `GET /health`
async fn health() -> &'static str {
    "ok"
}

/// `GET /ticks`: a clock stream built per request from the context.
async fn ticks(State(state): State<AppState>, Query(params): Query<TickParams>) -> Response {
    let count = params.count.unwrap_or(state.default_count);
    if count > state.max_count {
        return (
            StatusCode::BAD_REQUEST,
            format!("count must not exceed {}", state.max_count),
        )
            .into_response();
    }

    let config = state.stream.clone();
    TICKS
        .respond(
            (count, state.interval),
            StreamSource::from_fn(|(count, interval)| events::ticks(count, interval)),
        )
        .with_config(config)
        .into_response()
}

/// `GET /words`: a finite stream prepared before responding.
async fn words(State(state): State<AppState>, Query(params): Query<WordParams>) -> Response {
    let words = events::words(&params.text);
    WORDS
        .respond((), StreamSource::from_stream(tokio_stream::iter(words)))
        .with_config(state.stream)
        .into_response()
}
