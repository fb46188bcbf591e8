//! Example server and client for typed NDJSON streams.

pub mod events;
pub mod routes;
