//! Year-partitioned Parquet datasets.
//!
//! A dataset is a prefix in an [`ObjectStore`](crate::store::ObjectStore)
//! holding Snappy-compressed Parquet part files. Partitioned datasets keep
//! the year in the key (`p_year=2024/`) rather than in the file, and the
//! scan restores it from the path.
//!
//! ```no_run
//! use std::sync::Arc;
//! use stockflow::model::BatchRecord;
//! use stockflow::store::{LocalObjectStore, ObjectUri};
//! use stockflow::table::Dataset;
//! use time::macros::{date, datetime};
//!
//! let store = Arc::new(LocalObjectStore::new("./lake"));
//! let dataset = Dataset::new(store, ObjectUri::parse_prefix("s3://lake/price_by_date")?);
//!
//! // Writes p_year=2024/part-<micros>-<hash>.snappy.parquet
//! dataset.append(
//!     &[BatchRecord {
//!         company: "AAPL".to_string(),
//!         close_date: date!(2024 - 01 - 01),
//!         close_price: 200,
//!         partition_year: 2024,
//!     }],
//!     datetime!(2025-01-25 08:00:00 UTC),
//! )?;
//! # Ok::<(), stockflow::Error>(())
//! ```

mod dataset;
mod partition;
mod schema;
mod sink;

pub use dataset::{Dataset, WriteOutcome};
pub use partition::{PartitionValues, YearFilter, YEAR_COLUMN};
pub use schema::{
    daily_schema, date_to_days, days_to_date, from_micros, tick_schema, to_micros, Decode, Encode,
};
pub use sink::{ParquetSink, RowSink};
