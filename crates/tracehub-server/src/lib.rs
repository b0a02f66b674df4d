//! HTTP API, event ingestion, and the stream consumer.
//!
//! The binary wires three long-lived pieces together: an axum router for the
//! read/write API, a Redis-streams consumer that turns ingested events into
//! database state through the handler registry, and the pipeline queue that
//! post-processes ended sessions.

pub mod auth;
pub mod config;
pub mod consumer;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod stream;

pub use config::Config;
pub use error::ApiError;
pub use state::AppState;
