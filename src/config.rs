//! Named configuration values resolved at the start of every invocation.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::store::ObjectUri;

pub const DEST_BUCKET_PATH: &str = "dest_bucket_path";
pub const DEST_BUCKET_PATH_OVERWRITE: &str = "dest_bucket_path_overwrite";
pub const STREAM_NAME: &str = "stream_name";
pub const PRUNE_SNAPSHOT_YEARS: &str = "prune_snapshot_years";

/// Lookup of named configuration values.
pub trait ConfigSource {
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads values from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

fn required(source: &dyn ConfigSource, name: &str) -> Result<String> {
    match source.get(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(Error::MissingConfig(name.to_string())),
    }
}

fn required_uri(source: &dyn ConfigSource, name: &str) -> Result<ObjectUri> {
    let value = required(source, name)?;
    ObjectUri::parse_prefix(&value).map_err(|err| Error::InvalidConfig {
        name: name.to_string(),
        reason: err.to_string(),
    })
}

fn optional_bool(source: &dyn ConfigSource, name: &str) -> Result<bool> {
    let Some(value) = source.get(name) else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => Err(Error::InvalidConfig {
            name: name.to_string(),
            reason: format!("expected a boolean, got `{other}`"),
        }),
    }
}

/// Configuration of the daily batch generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Staging prefix the CSV object is written under.
    pub staging_path: ObjectUri,
}

impl GeneratorConfig {
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            staging_path: required_uri(source, DEST_BUCKET_PATH)?,
        })
    }
}

/// Configuration of the daily batch processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProcessorConfig {
    /// Prefix of the year-partitioned `price_by_date` dataset.
    pub dest_path: ObjectUri,
    /// Restrict the snapshot scan to the years present in the batch.
    pub prune_snapshot_years: bool,
}

impl BatchProcessorConfig {
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            dest_path: required_uri(source, DEST_BUCKET_PATH)?,
            prune_snapshot_years: optional_bool(source, PRUNE_SNAPSHOT_YEARS)?,
        })
    }
}

/// Configuration of the stream processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProcessorConfig {
    /// Prefix of the append-only tick history dataset.
    pub history_path: ObjectUri,
    /// Prefix of the latest-price view, replaced on every run.
    pub latest_path: ObjectUri,
}

impl StreamProcessorConfig {
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self> {
        // The overwrite destination is resolved first so a run without it
        // never touches the history path.
        let latest_path = required_uri(source, DEST_BUCKET_PATH_OVERWRITE)?;
        let history_path = required_uri(source, DEST_BUCKET_PATH)?;
        Ok(Self {
            history_path,
            latest_path,
        })
    }
}

/// Configuration of the tick publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    pub stream_name: String,
}

impl PublisherConfig {
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            stream_name: required(source, STREAM_NAME)?,
        })
    }
}
