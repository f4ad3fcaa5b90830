//! Year-partitioned Parquet datasets on an object store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use time::OffsetDateTime;

use crate::error::Result;
use crate::store::{ObjectStore, ObjectUri};
use crate::table::partition::{PartitionValues, YearFilter};
use crate::table::schema::{Decode, Encode};
use crate::table::sink::{ParquetSink, RowSink};

const PART_SUFFIX: &str = ".snappy.parquet";

static PART_SEQ: AtomicU64 = AtomicU64::new(0);

/// Result of an append or overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub rows: usize,
    pub objects: Vec<ObjectUri>,
}

/// A dataset rooted at an object-store prefix.
///
/// Partitioned rows land under `<prefix>p_year=<YYYY>/`, unpartitioned rows
/// directly under the prefix. Every write creates new part files with
/// unique names, so concurrent appends never collide.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use stockflow::store::{LocalObjectStore, ObjectUri};
/// use stockflow::table::{Dataset, YearFilter};
/// use stockflow::model::PersistedClose;
///
/// let store = Arc::new(LocalObjectStore::new("./lake"));
/// let prefix = ObjectUri::parse_prefix("s3://lake/price_by_date")?;
/// let dataset = Dataset::new(store, prefix);
/// let rows: Vec<PersistedClose> = dataset.scan(&YearFilter::Years(vec![2024]))?;
/// # Ok::<(), stockflow::Error>(())
/// ```
#[derive(Clone)]
pub struct Dataset {
    store: Arc<dyn ObjectStore>,
    prefix: ObjectUri,
}

impl Dataset {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: ObjectUri) -> Self {
        Self {
            store,
            prefix: prefix.into_prefix(),
        }
    }

    /// Append rows, one new part file per year partition. Empty input
    /// writes nothing.
    pub fn append<R: Encode>(
        &self,
        rows: &[R],
        written_at: OffsetDateTime,
    ) -> Result<WriteOutcome> {
        if rows.is_empty() {
            return Ok(WriteOutcome::default());
        }

        let mut by_partition: BTreeMap<Option<i32>, Vec<&R>> = BTreeMap::new();
        for row in rows {
            by_partition.entry(row.partition_year()).or_default().push(row);
        }

        let mut outcome = WriteOutcome::default();
        for (year, group) in by_partition {
            let dir = match year {
                Some(year) => format!("{}/", PartitionValues::year(year).to_path()),
                None => String::new(),
            };
            let uri = self.write_part(&dir, &group, written_at)?;
            outcome.rows += group.len();
            outcome.objects.push(uri);
        }
        Ok(outcome)
    }

    /// Replace the whole dataset with `rows` in a single unpartitioned part
    /// file. Empty input writes nothing and leaves the dataset untouched.
    pub fn overwrite<R: Encode>(
        &self,
        rows: &[R],
        written_at: OffsetDateTime,
    ) -> Result<WriteOutcome> {
        if rows.is_empty() {
            return Ok(WriteOutcome::default());
        }

        let previous = self.store.list(&self.prefix)?;
        let refs: Vec<&R> = rows.iter().collect();
        let uri = self.write_part("", &refs, written_at)?;
        for old in previous.iter().filter(|old| **old != uri) {
            self.store.delete(old)?;
        }
        debug!(
            "overwrote {} with {} rows, removed {} objects",
            self.prefix,
            rows.len(),
            previous.len()
        );
        Ok(WriteOutcome {
            rows: rows.len(),
            objects: vec![uri],
        })
    }

    /// Read every part file whose partition passes `filter`, in key order.
    pub fn scan<R: Decode>(&self, filter: &YearFilter) -> Result<Vec<R>> {
        let mut rows = Vec::new();
        for object in self.store.list(&self.prefix)? {
            let Some(relative) = object.strip_prefix(&self.prefix) else {
                continue;
            };
            if !relative.ends_with(".parquet") {
                continue;
            }
            let partition = PartitionValues::from_relative_key(relative)?;
            let year = partition.partition_year()?;
            if !filter.matches(year) {
                continue;
            }

            let bytes = Bytes::from(self.store.get(&object)?);
            let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)?
                .with_batch_size(8192)
                .build()?;
            for batch in reader {
                rows.extend(R::decode(&batch?, year)?);
            }
        }
        Ok(rows)
    }

    /// Check the dataset location is reachable.
    pub fn probe(&self) -> Result<()> {
        self.store.list(&self.prefix).map(|_| ())
    }

    fn write_part<R: Encode>(
        &self,
        dir: &str,
        rows: &[&R],
        written_at: OffsetDateTime,
    ) -> Result<ObjectUri> {
        let batch = R::encode(rows)?;
        let mut sink = ParquetSink::in_memory(R::schema())?;
        sink.write_batch(&batch)?;
        let bytes = sink.finish()?;

        let name = part_name(&bytes, written_at);
        let uri = self.prefix.join(&format!("{dir}{name}"))?;
        self.store.put(&uri, &bytes)?;
        debug!("wrote {} rows to {}", rows.len(), uri);
        Ok(uri)
    }
}

fn part_name(bytes: &[u8], written_at: OffsetDateTime) -> String {
    let micros = written_at.unix_timestamp_nanos() / 1_000;
    let mut hasher = blake3::Hasher::new();
    hasher.update(bytes);
    hasher.update(&micros.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&PART_SEQ.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let hash = hasher.finalize().to_hex();
    format!("part-{micros:020}-{}{PART_SUFFIX}", &hash[..16])
}
