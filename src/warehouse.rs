//! Queryable view over the persisted datasets.
//!
//! Handlers never read datasets by path; they go through a [`Warehouse`],
//! which resolves table names through a [`TableCatalog`]. A table is
//! queryable when it is registered and its location is reachable.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{LatestPrice, PersistedClose, PriceRecord};
use crate::store::{ObjectStore, ObjectUri};
use crate::table::{Dataset, YearFilter};

pub const PRICE_BY_DATE: &str = "price_by_date";
pub const STREAM_PRICES_HISTORY: &str = "stream_prices_history";
pub const LATEST_PRICES: &str = "latest_prices";

/// Read access to the persisted tables.
pub trait Warehouse: Send + Sync {
    /// Fail unless every named table is queryable.
    fn probe(&self, tables: &[&str]) -> Result<()>;

    /// Snapshot of `price_by_date`, optionally restricted to some years.
    fn daily_closes(&self, years: &YearFilter) -> Result<Vec<PersistedClose>>;

    /// Full `stream_prices_history`, in scan order.
    fn stream_history(&self) -> Result<Vec<PriceRecord>>;

    /// Current contents of `latest_prices`.
    fn latest_prices(&self) -> Result<Vec<LatestPrice>>;
}

/// Table name to dataset location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCatalog {
    tables: BTreeMap<String, String>,
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, table: &str, location: &ObjectUri) {
        self.tables
            .insert(table.to_string(), location.clone().into_prefix().to_string());
    }

    pub fn with_table(mut self, table: &str, location: &ObjectUri) -> Self {
        self.register(table, location);
        self
    }

    pub fn location(&self, table: &str) -> Result<ObjectUri> {
        let raw = self
            .tables
            .get(table)
            .ok_or_else(|| Error::TableUnavailable {
                table: table.to_string(),
                reason: "table is not registered in the catalog".to_string(),
            })?;
        ObjectUri::parse_prefix(raw).map_err(|err| Error::TableUnavailable {
            table: table.to_string(),
            reason: err.to_string(),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

/// [`Warehouse`] reading Parquet datasets straight from an object store.
#[derive(Clone)]
pub struct ParquetWarehouse {
    store: Arc<dyn ObjectStore>,
    catalog: TableCatalog,
}

impl ParquetWarehouse {
    pub fn new(store: Arc<dyn ObjectStore>, catalog: TableCatalog) -> Self {
        Self { store, catalog }
    }

    fn dataset(&self, table: &str) -> Result<Dataset> {
        let location = self.catalog.location(table)?;
        let dataset = Dataset::new(Arc::clone(&self.store), location);
        dataset.probe().map_err(|err| Error::TableUnavailable {
            table: table.to_string(),
            reason: err.to_string(),
        })?;
        Ok(dataset)
    }
}

impl Warehouse for ParquetWarehouse {
    fn probe(&self, tables: &[&str]) -> Result<()> {
        for table in tables {
            self.dataset(table)?;
        }
        Ok(())
    }

    fn daily_closes(&self, years: &YearFilter) -> Result<Vec<PersistedClose>> {
        self.dataset(PRICE_BY_DATE)?.scan(years)
    }

    fn stream_history(&self) -> Result<Vec<PriceRecord>> {
        self.dataset(STREAM_PRICES_HISTORY)?.scan(&YearFilter::All)
    }

    fn latest_prices(&self) -> Result<Vec<LatestPrice>> {
        self.dataset(LATEST_PRICES)?.scan(&YearFilter::All)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalObjectStore;
    use tempfile::tempdir;

    #[test]
    fn unregistered_table_is_unavailable() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.create_bucket("lake").unwrap();
        let catalog = TableCatalog::new().with_table(
            STREAM_PRICES_HISTORY,
            &ObjectUri::parse_prefix("s3://lake/history").unwrap(),
        );
        let warehouse = ParquetWarehouse::new(Arc::new(store), catalog);

        warehouse.probe(&[STREAM_PRICES_HISTORY]).unwrap();
        let err = warehouse
            .probe(&[STREAM_PRICES_HISTORY, LATEST_PRICES])
            .unwrap_err();
        assert_eq!(err.kind(), "TableUnavailable");
    }

    #[test]
    fn missing_bucket_is_unavailable() {
        let dir = tempdir().unwrap();
        let catalog = TableCatalog::new().with_table(
            PRICE_BY_DATE,
            &ObjectUri::parse_prefix("s3://nowhere/price_by_date").unwrap(),
        );
        let warehouse = ParquetWarehouse::new(Arc::new(LocalObjectStore::new(dir.path())), catalog);
        let err = warehouse.daily_closes(&YearFilter::All).unwrap_err();
        assert!(matches!(err, Error::TableUnavailable { .. }));
    }

    #[test]
    fn empty_table_scans_to_nothing() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.create_bucket("lake").unwrap();
        let catalog = TableCatalog::new().with_table(
            PRICE_BY_DATE,
            &ObjectUri::parse_prefix("s3://lake/price_by_date").unwrap(),
        );
        let warehouse = ParquetWarehouse::new(Arc::new(store), catalog);
        assert!(warehouse.daily_closes(&YearFilter::All).unwrap().is_empty());
    }

    #[test]
    fn catalog_round_trips_through_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = TableCatalog::new().with_table(
            LATEST_PRICES,
            &ObjectUri::parse("s3://lake/latest").unwrap(),
        );
        catalog.save(&path).unwrap();
        let loaded = TableCatalog::load(&path).unwrap();
        assert_eq!(loaded.location(LATEST_PRICES).unwrap().key(), "latest/");
    }
}
