//! Object store abstraction.
//!
//! Objects are addressed by `s3://bucket/key` URIs. The staging area, the
//! Parquet datasets and the delivered stream files all live behind the
//! [`ObjectStore`] trait so handlers never touch paths directly.

mod local;

pub use local::LocalObjectStore;

use std::fmt;
use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::{Error, Result};

const SCHEME: &str = "s3://";

/// Location of an object, or of a prefix when the key ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectUri {
    bucket: String,
    key: String,
}

impl ObjectUri {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        let key = key.into();
        validate_bucket(&bucket)?;
        validate_key(&key)?;
        Ok(Self { bucket, key })
    }

    /// Parse `s3://bucket/key`.
    pub fn parse(value: &str) -> Result<Self> {
        let rest = value
            .strip_prefix(SCHEME)
            .ok_or_else(|| Error::InvalidUri(value.to_string()))?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        Self::new(bucket, key).map_err(|_| Error::InvalidUri(value.to_string()))
    }

    /// Parse a URI and force it to denote a prefix.
    pub fn parse_prefix(value: &str) -> Result<Self> {
        Ok(Self::parse(value)?.into_prefix())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_prefix(&self) -> bool {
        self.key.is_empty() || self.key.ends_with('/')
    }

    pub fn into_prefix(mut self) -> Self {
        if !self.is_prefix() {
            self.key.push('/');
        }
        self
    }

    /// Append a relative key below this prefix.
    pub fn join(&self, relative: &str) -> Result<Self> {
        let mut key = self.key.clone();
        if !key.is_empty() && !key.ends_with('/') {
            key.push('/');
        }
        key.push_str(relative.trim_start_matches('/'));
        Self::new(self.bucket.clone(), key)
    }

    /// Key of this object relative to `prefix`, if it lies below it.
    pub fn strip_prefix(&self, prefix: &ObjectUri) -> Option<&str> {
        if self.bucket != prefix.bucket {
            return None;
        }
        self.key.strip_prefix(prefix.key.as_str())
    }

    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or("")
    }

    pub fn is_gzip(&self) -> bool {
        self.key.ends_with(".gz")
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}

fn validate_bucket(bucket: &str) -> Result<()> {
    let valid = !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && !bucket.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidUri(format!("bucket `{bucket}`")))
    }
}

fn validate_key(key: &str) -> Result<()> {
    let body = key.strip_suffix('/').unwrap_or(key);
    if body.is_empty() {
        return Ok(());
    }
    for part in body.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            return Err(Error::InvalidUri(format!("key `{key}`")));
        }
    }
    Ok(())
}

/// Durable object storage.
pub trait ObjectStore: Send + Sync {
    /// Read a whole object.
    fn get(&self, uri: &ObjectUri) -> Result<Vec<u8>>;

    /// Create or replace an object.
    fn put(&self, uri: &ObjectUri, bytes: &[u8]) -> Result<()>;

    /// List objects below a prefix, sorted by key. Fails when the bucket
    /// itself is unreachable; a missing prefix yields an empty list.
    fn list(&self, prefix: &ObjectUri) -> Result<Vec<ObjectUri>>;

    /// Remove an object. Removing a missing object is not an error.
    fn delete(&self, uri: &ObjectUri) -> Result<()>;
}

/// Read an object, transparently gunzipping `.gz` keys.
pub fn read_decoded(store: &dyn ObjectStore, uri: &ObjectUri) -> Result<Vec<u8>> {
    let raw = store.get(uri)?;
    if !uri.is_gzip() {
        return Ok(raw);
    }
    let mut decoded = Vec::with_capacity(raw.len() * 4);
    GzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_key() {
        let uri = ObjectUri::parse("s3://stock-staging/batch/20240101.csv").unwrap();
        assert_eq!(uri.bucket(), "stock-staging");
        assert_eq!(uri.key(), "batch/20240101.csv");
        assert_eq!(uri.file_name(), "20240101.csv");
        assert!(!uri.is_prefix());
        assert_eq!(uri.to_string(), "s3://stock-staging/batch/20240101.csv");
    }

    #[test]
    fn prefix_join_and_strip() {
        let prefix = ObjectUri::parse_prefix("s3://lake/price_by_date").unwrap();
        assert_eq!(prefix.key(), "price_by_date/");
        let part = prefix.join("p_year=2024/part-1.parquet").unwrap();
        assert_eq!(part.key(), "price_by_date/p_year=2024/part-1.parquet");
        assert_eq!(part.strip_prefix(&prefix), Some("p_year=2024/part-1.parquet"));

        let root = ObjectUri::parse_prefix("s3://lake").unwrap();
        assert_eq!(root.key(), "");
        assert_eq!(root.join("a.csv").unwrap().key(), "a.csv");
    }

    #[test]
    fn rejects_traversal_and_bad_scheme() {
        assert!(ObjectUri::parse("s3://lake/../etc/passwd").is_err());
        assert!(ObjectUri::parse("s3://lake/a//b").is_err());
        assert!(ObjectUri::parse("gs://lake/a").is_err());
        assert!(ObjectUri::parse("s3:///a").is_err());
        assert!(ObjectUri::parse("s3://Upper/a").is_err());
    }
}
