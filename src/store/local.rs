use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::{ObjectStore, ObjectUri};

/// Object store backed by a directory: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory backing a bucket.
    pub fn create_bucket(&self, bucket: &str) -> Result<()> {
        // Validates the name the same way URIs do.
        ObjectUri::new(bucket, "")?;
        std::fs::create_dir_all(self.root.join(bucket))?;
        Ok(())
    }

    fn bucket_dir(&self, uri: &ObjectUri) -> Result<PathBuf> {
        let dir = self.root.join(uri.bucket());
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("bucket {}", uri.bucket())));
        }
        Ok(dir)
    }

    fn object_path(&self, uri: &ObjectUri) -> Result<PathBuf> {
        let mut path = self.bucket_dir(uri)?;
        for part in uri.key().split('/').filter(|part| !part.is_empty()) {
            path.push(part);
        }
        Ok(path)
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, uri: &ObjectUri) -> Result<Vec<u8>> {
        let path = self.object_path(uri)?;
        if !path.is_file() {
            return Err(Error::NotFound(uri.to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    fn put(&self, uri: &ObjectUri, bytes: &[u8]) -> Result<()> {
        if uri.is_prefix() {
            return Err(Error::InvalidUri(format!("{uri} names a prefix")));
        }
        let path = self.object_path(uri)?;
        let parent = path
            .parent()
            .ok_or_else(|| Error::InvalidUri(uri.to_string()))?;
        std::fs::create_dir_all(parent)?;
        let tmp = tmp_path_for(&path);
        let _ = std::fs::remove_file(&tmp);
        let mut output = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        output.write_all(bytes)?;
        output.sync_all()?;
        std::fs::rename(&tmp, &path)?;
        fsync_dir(parent)?;
        Ok(())
    }

    fn list(&self, prefix: &ObjectUri) -> Result<Vec<ObjectUri>> {
        let bucket_dir = self.bucket_dir(prefix)?;
        let mut keys = Vec::new();
        collect_keys(&bucket_dir, "", &mut keys)?;
        let mut objects = keys
            .into_iter()
            .filter(|key| key.starts_with(prefix.key()))
            .map(|key| ObjectUri::new(prefix.bucket(), key))
            .collect::<Result<Vec<_>>>()?;
        objects.sort();
        Ok(objects)
    }

    fn delete(&self, uri: &ObjectUri) -> Result<()> {
        let path = self.object_path(uri)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn collect_keys(dir: &Path, relative: &str, keys: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".tmp") {
            continue;
        }
        let key = if relative.is_empty() {
            name
        } else {
            format!("{relative}/{name}")
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_keys(&entry.path(), &key, keys)?;
        } else if file_type.is_file() {
            keys.push(key);
        }
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}

fn fsync_dir(path: &Path) -> Result<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_get_list_delete() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.create_bucket("lake").unwrap();

        let a = ObjectUri::parse("s3://lake/t/p_year=2024/a.parquet").unwrap();
        let b = ObjectUri::parse("s3://lake/t/p_year=2023/b.parquet").unwrap();
        let other = ObjectUri::parse("s3://lake/other/c.csv").unwrap();
        for uri in [&a, &b, &other] {
            store.put(uri, b"x").unwrap();
        }

        assert_eq!(store.get(&a).unwrap(), b"x");
        let listed = store.list(&ObjectUri::parse_prefix("s3://lake/t").unwrap()).unwrap();
        assert_eq!(listed, vec![b.clone(), a.clone()]);

        store.delete(&a).unwrap();
        store.delete(&a).unwrap();
        assert!(matches!(store.get(&a), Err(Error::NotFound(_))));
    }

    #[test]
    fn missing_bucket_is_not_found() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let prefix = ObjectUri::parse_prefix("s3://absent/t").unwrap();
        assert!(matches!(store.list(&prefix), Err(Error::NotFound(_))));

        store.create_bucket("absent").unwrap();
        assert!(store.list(&prefix).unwrap().is_empty());
    }
}
