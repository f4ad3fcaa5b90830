//! Row-level validation and type coercion.
//!
//! Bad rows never fail a batch: they are dropped and counted. Price and
//! date checks run independently over the raw batch, so a row failing both
//! is counted once for each.

use log::{info, warn};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::model::{DailyClose, PriceRecord, RawDailyRow, RawTick};

/// Outcome of cleaning one raw batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleaned<T> {
    pub rows: Vec<T>,
    pub invalid_price: usize,
    pub invalid_date: usize,
    pub missing_key: usize,
}

impl<T> Cleaned<T> {
    fn empty() -> Self {
        Self {
            rows: Vec::new(),
            invalid_price: 0,
            invalid_date: 0,
            missing_key: 0,
        }
    }

    /// Rows invalid on price plus rows invalid on date.
    pub fn bad_records(&self) -> usize {
        self.invalid_price + self.invalid_date
    }

    /// True when no row was rejected for any reason, null keys included.
    pub fn is_clean(&self) -> bool {
        self.bad_records() == 0 && self.missing_key == 0
    }

    fn log_counts(&self) {
        info!("Number of records with bad data: {}", self.bad_records());
        if self.missing_key > 0 {
            warn!("Number of records without a key: {}", self.missing_key);
        }
    }
}

pub fn clean_daily(raw: Vec<RawDailyRow>) -> Cleaned<DailyClose> {
    let mut cleaned = Cleaned::empty();
    for row in raw {
        let price = row.close_price.as_deref().and_then(coerce_price_str);
        let date = row.date.as_deref().and_then(parse_date);
        cleaned.invalid_price += usize::from(price.is_none());
        cleaned.invalid_date += usize::from(date.is_none());
        cleaned.missing_key += usize::from(row.company.is_none());

        if let (Some(company), Some(date), Some(close_price)) = (row.company, date, price) {
            cleaned.rows.push(DailyClose {
                company,
                date,
                close_price,
            });
        }
    }
    cleaned.log_counts();
    cleaned
}

/// Clean streamed ticks, stamping every kept row with the run's load time.
pub fn clean_ticks(raw: Vec<RawTick>, loaded_at: PrimitiveDateTime) -> Cleaned<PriceRecord> {
    let mut cleaned = Cleaned::empty();
    for row in raw {
        let price = row.price.as_ref().and_then(coerce_price_value);
        let observed_at = row.produced_at.as_ref().and_then(parse_timestamp_value);
        let symbol = row.symbol.as_ref().and_then(symbol_value);
        cleaned.invalid_price += usize::from(price.is_none());
        cleaned.invalid_date += usize::from(observed_at.is_none());
        cleaned.missing_key += usize::from(symbol.is_none());

        if let (Some(symbol), Some(observed_at), Some(price)) = (symbol, observed_at, price) {
            cleaned.rows.push(PriceRecord {
                symbol,
                price,
                observed_at,
                loaded_at,
                partition_year: observed_at.year(),
            });
        }
    }
    cleaned.log_counts();
    cleaned
}

/// Coerce a price to a positive integer. Decimals truncate toward zero.
pub fn coerce_price_str(value: &str) -> Option<i64> {
    let value = value.trim();
    let price = match value.parse::<i64>() {
        Ok(price) => price,
        Err(_) => truncate(value.parse::<f64>().ok()?)?,
    };
    (price > 0).then_some(price)
}

fn coerce_price_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => {
            let price = match number.as_i64() {
                Some(price) => price,
                None => truncate(number.as_f64()?)?,
            };
            (price > 0).then_some(price)
        }
        Value::String(text) => coerce_price_str(text),
        _ => None,
    }
}

fn truncate(value: f64) -> Option<i64> {
    if !value.is_finite() || value >= i64::MAX as f64 || value <= i64::MIN as f64 {
        return None;
    }
    Some(value.trunc() as i64)
}

fn symbol_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn parse_timestamp_value(value: &Value) -> Option<PrimitiveDateTime> {
    match value {
        Value::String(text) => parse_timestamp(text),
        _ => None,
    }
}

/// Parse a calendar date; a trailing time of day is accepted and dropped.
/// The day is taken in the value's own offset.
pub fn parse_date(value: &str) -> Option<Date> {
    parse_local(value).map(|(ts, _)| ts.date())
}

/// Parse a timestamp in one of the accepted layouts. Offsets are
/// normalized to UTC and dropped.
pub fn parse_timestamp(value: &str) -> Option<PrimitiveDateTime> {
    let (local, offset) = parse_local(value)?;
    let utc = local.assume_offset(offset).to_offset(UtcOffset::UTC);
    Some(PrimitiveDateTime::new(utc.date(), utc.time()))
}

/// Wall-clock reading of the value together with its offset (UTC when
/// none is written).
fn parse_local(value: &str) -> Option<(PrimitiveDateTime, UtcOffset)> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let date_only = [
        format_description!("[year]-[month padding:none]-[day padding:none]"),
        format_description!("[year]/[month padding:none]/[day padding:none]"),
    ];
    for format in date_only {
        if let Ok(date) = Date::parse(value, format) {
            return Some((PrimitiveDateTime::new(date, Time::MIDNIGHT), UtcOffset::UTC));
        }
    }

    let date_time = [
        format_description!(
            "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]:[second]"
        ),
        format_description!(
            "[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]:[second]"
        ),
        format_description!(
            "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]:[second].[subsecond]"
        ),
        format_description!(
            "[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]:[second].[subsecond]"
        ),
    ];
    for format in date_time {
        if let Ok(ts) = PrimitiveDateTime::parse(value, format) {
            return Some((ts, UtcOffset::UTC));
        }
    }

    let with_offset = OffsetDateTime::parse(value, &Rfc3339).ok()?;
    Some((
        PrimitiveDateTime::new(with_offset.date(), with_offset.time()),
        with_offset.offset(),
    ))
}
