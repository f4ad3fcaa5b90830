//! Stock-price ingestion handlers.
//!
//! A batch generator stages random daily closes as CSV, a batch processor
//! appends the closes `price_by_date` does not hold yet, a tick publisher
//! pushes random ticks onto a stream, and a stream processor appends
//! delivered ticks to history and rebuilds the latest price per symbol.
//! Datasets are year-partitioned Parquet on an object store.

pub mod clean;
pub mod clock;
pub mod config;
pub mod delta;
pub mod error;
pub mod events;
pub mod generator;
pub mod handlers;
pub mod ingest;
#[cfg(feature = "cli")]
pub mod logging;
pub mod model;
pub mod store;
pub mod table;
pub mod transport;
pub mod warehouse;

pub use error::{Error, Phase, Result};
