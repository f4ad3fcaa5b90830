//! Row types flowing between the cleaner, the delta engine and the datasets.

use serde::{Deserialize, Serialize};
use time::{Date, PrimitiveDateTime};

/// Daily close as it arrives in a staging CSV, fields still untyped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDailyRow {
    pub company: Option<String>,
    pub date: Option<String>,
    pub close_price: Option<String>,
}

/// A streamed tick as it arrives in a delivered JSON-lines object.
///
/// `None` means the field was absent from the line, `Some(Value::Null)` that
/// it was present but null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTick {
    pub symbol: Option<serde_json::Value>,
    pub price: Option<serde_json::Value>,
    pub produced_at: Option<serde_json::Value>,
}

/// A cleaned incoming daily close, keyed by `(company, date)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyClose {
    pub company: String,
    pub date: Date,
    pub close_price: i64,
}

/// A row of the persisted `price_by_date` dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    pub company: String,
    pub close_date: Date,
    pub close_price: i64,
    pub partition_year: i32,
}

/// A snapshot row read back from `price_by_date`. The price may be null in
/// files written by other tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedClose {
    pub company: String,
    pub close_date: Date,
    pub close_price: Option<i64>,
    pub partition_year: i32,
}

/// A cleaned tick, as stored in the append-only history dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRecord {
    pub symbol: String,
    pub price: i64,
    pub observed_at: PrimitiveDateTime,
    pub loaded_at: PrimitiveDateTime,
    pub partition_year: i32,
}

/// One row of the latest-price view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestPrice {
    pub symbol: String,
    pub price: i64,
    pub observed_at: PrimitiveDateTime,
    pub loaded_at: PrimitiveDateTime,
}

/// A generated tick, serialized one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: i64,
    pub produced_at: String,
}

/// A generated daily close, serialized as a CSV row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedClose {
    pub company: String,
    pub date: String,
    pub close_price: i64,
}
