use crate::error::CacheResult;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Key/value store behind the cache provider. Values are serialized records.
pub trait CacheBackend: Send + Sync {
    fn get(&self, id: &str) -> CacheResult<Option<String>>;

    fn put(&self, id: &str, value: String) -> CacheResult<()>;

    /// Returns whether a record was removed
    fn remove(&self, id: &str) -> CacheResult<bool>;

    fn contains(&self, id: &str) -> CacheResult<bool> {
        Ok(self.get(id)?.is_some())
    }
}

/// Process-local backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, id: &str) -> CacheResult<Option<String>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn put(&self, id: &str, value: String) -> CacheResult<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), value);
        Ok(())
    }

    fn remove(&self, id: &str) -> CacheResult<bool> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some())
    }

    fn contains(&self, id: &str) -> CacheResult<bool> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id))
    }
}

const MAX_HEX_NAME: usize = 200;

/// One file per record under a directory, so drafts survive a restart.
///
/// File names are the hex-encoded record id. Ids too long for a file name
/// are stored under the SHA-256 of the id instead.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    // serializes write-then-rename against concurrent writers of this process
    write_lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        // hex doubles the length; leave room for the extensions within 255 bytes
        let name: String = if id.len() * 2 <= MAX_HEX_NAME {
            id.bytes().map(|b| format!("{:02x}", b)).collect()
        } else {
            format!("sha256-{:x}", Sha256::digest(id.as_bytes()))
        };
        self.dir.join(format!("{}.json", name))
    }
}

impl CacheBackend for FileBackend {
    fn get(&self, id: &str) -> CacheResult<Option<String>> {
        match fs::read_to_string(self.record_path(id)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, id: &str, value: String) -> CacheResult<()> {
        let path = self.record_path(id);
        let tmp = path.with_extension("json.tmp");
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, id: &str) -> CacheResult<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, id: &str) -> CacheResult<bool> {
        Ok(self.record_path(id).exists())
    }
}
