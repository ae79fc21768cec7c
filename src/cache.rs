//! On-disk key/value store backing lesson persistence.
//!
//! Each key lives in its own JSON file under `<cache_dir>/store/`, named by a
//! hash of the key so lesson ids with slashes or spaces stay filesystem-safe.
//! Writes land in a temp file first and are renamed into place.

use lessonflow_core::{KeyValueStore, StoreError};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) the store below `cache_dir`.
    pub fn open(cache_dir: &Path) -> Result<Self, StoreError> {
        let root = cache_dir.join("store");
        fs::create_dir_all(&root).map_err(|err| unavailable(&root, err))?;
        debug!(path = %root.display(), "Opened persistence store");
        Ok(Self { root })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", hash_key(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(unavailable(&path, err)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(|err| unavailable(&tmp, err))?;
        file.write_all(value.as_bytes())
            .map_err(|err| unavailable(&tmp, err))?;
        fs::rename(&tmp, &path).map_err(|err| unavailable(&path, err))
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(unavailable(&path, err)),
        }
    }
}

pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn unavailable(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}
