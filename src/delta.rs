//! Delta computation against persisted state.
//!
//! Daily batches are compared with the full `price_by_date` snapshot on the
//! `(company, close_date)` key. Streamed ticks are appended without any
//! comparison; the latest-price view is then recomputed from history.

use std::collections::{BTreeMap, HashSet};

use time::{Date, PrimitiveDateTime};

use crate::model::{BatchRecord, DailyClose, LatestPrice, PersistedClose, PriceRecord};

/// Rows of `batch` whose `(company, date)` has no priced row in `snapshot`.
///
/// Incoming order is kept. Duplicate incoming rows that are absent from the
/// snapshot are all returned.
pub fn daily_delta(batch: &[DailyClose], snapshot: &[PersistedClose]) -> Vec<BatchRecord> {
    let persisted: HashSet<(&str, Date)> = snapshot
        .iter()
        .filter(|row| row.close_price.is_some())
        .map(|row| (row.company.as_str(), row.close_date))
        .collect();

    batch
        .iter()
        .filter(|row| !persisted.contains(&(row.company.as_str(), row.date)))
        .map(|row| BatchRecord {
            company: row.company.clone(),
            close_date: row.date,
            close_price: row.close_price,
            partition_year: row.date.year(),
        })
        .collect()
}

/// Years covered by a cleaned batch, for a pruned snapshot scan.
pub fn batch_years(batch: &[DailyClose]) -> Vec<i32> {
    let mut years: Vec<i32> = batch.iter().map(|row| row.date.year()).collect();
    years.sort_unstable();
    years.dedup();
    years
}

/// Most recent history row per symbol.
///
/// Only rows stored in the partition of their own observation year take
/// part. Among rows sharing the maximum `observed_at`, the one later in
/// scan order wins. Output is sorted by symbol and stamped with `loaded_at`.
pub fn latest_per_symbol(history: &[PriceRecord], loaded_at: PrimitiveDateTime) -> Vec<LatestPrice> {
    let mut best: BTreeMap<&str, &PriceRecord> = BTreeMap::new();
    for row in history {
        if row.partition_year != row.observed_at.year() {
            continue;
        }
        match best.get(row.symbol.as_str()) {
            Some(current) if current.observed_at > row.observed_at => {}
            _ => {
                best.insert(row.symbol.as_str(), row);
            }
        }
    }

    best.into_values()
        .map(|row| LatestPrice {
            symbol: row.symbol.clone(),
            price: row.price,
            observed_at: row.observed_at,
            loaded_at,
        })
        .collect()
}
