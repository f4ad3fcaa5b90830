//! Hive-style partition paths.
//!
//! Datasets are partitioned by a single integer column, the year, stored in
//! object keys as `p_year=<YYYY>/` and not inside the Parquet files.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Name of the partition column, as it appears in object keys.
pub const YEAR_COLUMN: &str = "p_year";

/// Partition values decoded from a key (key-value map).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionValues(HashMap<String, String>);

impl PartitionValues {
    /// Values of a single year partition.
    pub fn year(year: i32) -> Self {
        let mut values = HashMap::new();
        values.insert(YEAR_COLUMN.to_string(), year.to_string());
        Self(values)
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The year partition, if present.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPartition`: the `p_year` value is not an integer
    pub fn partition_year(&self) -> Result<Option<i32>> {
        let Some(raw) = self.get(YEAR_COLUMN) else {
            return Ok(None);
        };
        raw.parse::<i32>()
            .map(Some)
            .map_err(|_| Error::InvalidPartition(format!("{YEAR_COLUMN}={raw}")))
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to a Hive-style path with keys sorted (e.g. "p_year=2024").
    pub fn to_path(&self) -> String {
        let mut pairs: Vec<_> = self.0.iter().collect();
        pairs.sort_by_key(|(k, _)| k.as_str());
        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Parse the directory part of a key relative to the dataset root.
    ///
    /// Only `key=value` segments are accepted; the file name is ignored.
    pub fn from_relative_key(relative: &str) -> Result<Self> {
        let mut values = HashMap::new();
        let dirs = match relative.rsplit_once('/') {
            Some((dirs, _file)) => dirs,
            None => return Ok(Self(values)),
        };
        for part in dirs.split('/') {
            if part.is_empty() {
                continue;
            }
            let Some((key, value)) = part.split_once('=') else {
                return Err(Error::InvalidPartition(format!(
                    "invalid partition path segment: '{}'",
                    part
                )));
            };
            values.insert(key.to_string(), value.to_string());
        }
        Ok(Self(values))
    }
}

/// Which year partitions a scan reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum YearFilter {
    #[default]
    All,
    Years(Vec<i32>),
}

impl YearFilter {
    pub fn matches(&self, year: Option<i32>) -> bool {
        match (self, year) {
            (YearFilter::All, _) => true,
            (YearFilter::Years(years), Some(year)) => years.contains(&year),
            (YearFilter::Years(_), None) => false,
        }
    }
}
