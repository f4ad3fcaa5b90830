//! Streaming transport for published ticks.
//!
//! [`FileStreamTransport`] keeps each stream as a directory of shard files.
//! Records are routed by partition key, so every record sharing a key lands
//! in the same shard in publish order. [`FileStreamTransport::deliver`]
//! drains the shards into one staging object, the way a delivery stream
//! would, and returns its location.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::error::{Error, Result};
use crate::generator::compact_timestamp;
use crate::store::{ObjectStore, ObjectUri};

const META_FILE: &str = "stream.json";

/// One record handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub data: Vec<u8>,
    pub partition_key: String,
}

/// Outcome of a `put_records` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PutRecordsOutput {
    pub failed_record_count: usize,
}

pub trait StreamTransport: Send + Sync {
    /// Publish a batch of records. Individual records may fail without
    /// failing the call; an unknown stream fails the call.
    fn put_records(&self, stream: &str, records: &[StreamRecord]) -> Result<PutRecordsOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescription {
    pub name: String,
    pub shard_count: u32,
}

/// Directory-backed stream: `<root>/<stream>/shard-NNNN.log`.
#[derive(Debug, Clone)]
pub struct FileStreamTransport {
    root: PathBuf,
}

impl FileStreamTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a stream, or leave an existing one with the same shard count
    /// untouched.
    pub fn create_stream(&self, name: &str, shard_count: u32) -> Result<StreamDescription> {
        validate_stream_name(name)?;
        if shard_count == 0 {
            return Err(Error::InvalidConfig {
                name: "shard_count".to_string(),
                reason: "a stream needs at least one shard".to_string(),
            });
        }

        let description = StreamDescription {
            name: name.to_string(),
            shard_count,
        };
        let dir = self.root.join(name);
        if let Ok(existing) = self.describe(name) {
            if existing != description {
                return Err(Error::InvalidConfig {
                    name: name.to_string(),
                    reason: format!(
                        "stream already exists with {} shards",
                        existing.shard_count
                    ),
                });
            }
            return Ok(existing);
        }

        std::fs::create_dir_all(&dir)?;
        for shard in 0..shard_count {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(shard_path(&dir, shard))?;
        }
        std::fs::write(dir.join(META_FILE), serde_json::to_vec_pretty(&description)?)?;
        info!("created stream {} with {} shards", name, shard_count);
        Ok(description)
    }

    pub fn describe(&self, name: &str) -> Result<StreamDescription> {
        validate_stream_name(name)?;
        let path = self.root.join(name).join(META_FILE);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::UnknownStream(name.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Drain every shard into one object under `prefix`.
    ///
    /// Returns `None` when the stream holds no data. Shards are truncated
    /// only after the object is stored.
    pub fn deliver(
        &self,
        stream: &str,
        store: &dyn ObjectStore,
        prefix: &ObjectUri,
        now: PrimitiveDateTime,
    ) -> Result<Option<ObjectUri>> {
        let description = self.describe(stream)?;
        let dir = self.root.join(stream);

        let mut payload = Vec::new();
        for shard in 0..description.shard_count {
            match std::fs::read(shard_path(&dir, shard)) {
                Ok(bytes) => payload.extend_from_slice(&bytes),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        if payload.is_empty() {
            debug!("stream {} has nothing to deliver", stream);
            return Ok(None);
        }

        let hash = blake3::hash(&payload).to_hex();
        let name = format!("{stream}-{}-{}", compact_timestamp(now), &hash[..8]);
        let uri = prefix.clone().into_prefix().join(&name)?;
        store.put(&uri, &payload)?;

        for shard in 0..description.shard_count {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(shard_path(&dir, shard))?;
        }
        info!("delivered {} bytes from stream {} to {}", payload.len(), stream, uri);
        Ok(Some(uri))
    }
}

impl StreamTransport for FileStreamTransport {
    fn put_records(&self, stream: &str, records: &[StreamRecord]) -> Result<PutRecordsOutput> {
        let description = self.describe(stream)?;
        let dir = self.root.join(stream);

        let mut shards: Vec<Vec<u8>> = vec![Vec::new(); description.shard_count as usize];
        let mut failed = 0;
        for record in records {
            if record.partition_key.is_empty() {
                failed += 1;
                continue;
            }
            let shard = shard_for(&record.partition_key, description.shard_count);
            shards[shard as usize].extend_from_slice(&record.data);
        }

        for (shard, bytes) in shards.iter().enumerate() {
            if bytes.is_empty() {
                continue;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(shard_path(&dir, shard as u32))?;
            file.write_all(bytes)?;
            file.sync_data()?;
        }
        Ok(PutRecordsOutput {
            failed_record_count: failed,
        })
    }
}

/// Shard a partition key maps to.
pub fn shard_for(partition_key: &str, shard_count: u32) -> u32 {
    crc32fast::hash(partition_key.as_bytes()) % shard_count.max(1)
}

fn shard_path(dir: &Path, shard: u32) -> PathBuf {
    dir.join(format!("shard-{shard:04}.log"))
}

fn validate_stream_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidConfig {
            name: "stream_name".to_string(),
            reason: format!("`{name}` is not a valid stream name"),
        })
    }
}
