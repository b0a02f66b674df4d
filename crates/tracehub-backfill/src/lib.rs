//! Library surface of the backfill CLI: transcript discovery, the API
//! client, the ingest loop, and the completion wait. The binary in `main.rs`
//! is argument parsing plus printing.

pub mod client;
pub mod ingest;
pub mod resolve;
pub mod scan;
pub mod wait;
