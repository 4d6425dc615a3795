// Key-value blob storage backends

use crate::error::BlobError;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Host-provided key-value storage for opaque text values
pub trait BlobStore {
    /// Read the value stored under `key`, `None` if nothing is stored
    fn get(&self, key: &str) -> Result<Option<String>, BlobError>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<(), BlobError>;

    /// Remove `key`. Removing a missing key succeeds.
    fn remove(&mut self, key: &str) -> Result<(), BlobError>;
}

/// Keys end up as file names, so only a conservative alphabet is accepted
pub fn validate_key(key: &str) -> Result<(), BlobError> {
    if key.is_empty() {
        return Err(BlobError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > 64 {
        return Err(BlobError::InvalidKey(format!("{} (max 64 chars)", key)));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(BlobError::InvalidKey(format!(
            "{} (must be alphanumeric with _/-)",
            key
        )));
    }
    Ok(())
}

/// Directory-backed blob store: one `{key}.json` file per key
///
/// Writes go to a temporary file that is synced and renamed over the target,
/// under an exclusive lock on `.lock` in the same directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Open or create a blob store rooted at `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, BlobError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!(dir = ?dir, "Opened file blob store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn write_replace(tmp: &Path, target: &Path, value: &str) -> std::io::Result<()> {
        let mut file = File::create(tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(tmp, target)
    }

    fn lock(&self) -> Result<File, BlobError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(".lock"))?;
        file.lock_exclusive()?;
        // Released when the handle drops
        Ok(file)
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, BlobError> {
        validate_key(key)?;
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BlobError> {
        validate_key(key)?;
        let _lock = self.lock()?;

        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));

        if let Err(e) = Self::write_replace(&tmp, &target, value) {
            if let Err(cleanup) = fs::remove_file(&tmp)
                && cleanup.kind() != ErrorKind::NotFound
            {
                warn!(path = ?tmp, error = %cleanup, "Failed to remove temporary blob file");
            }
            return Err(e.into());
        }
        debug!(key, bytes = value.len(), "Wrote blob");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), BlobError> {
        validate_key(key)?;
        let _lock = self.lock()?;

        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {
                debug!(key, "Removed blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blob store for tests and embedders that persist elsewhere
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    entries: HashMap<String, String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, BlobError> {
        validate_key(key)?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BlobError> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), BlobError> {
        validate_key(key)?;
        self.entries.remove(key);
        Ok(())
    }
}

/// Blob store that fails on demand, for exercising error paths
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FlakyBlobStore {
    pub inner: MemoryBlobStore,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

#[cfg(test)]
impl BlobStore for FlakyBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, BlobError> {
        if self.fail_reads {
            return Err(BlobError::Unavailable("read refused".to_string()));
        }
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BlobError> {
        if self.fail_writes {
            return Err(BlobError::Unavailable("write refused".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), BlobError> {
        if self.fail_writes {
            return Err(BlobError::Unavailable("remove refused".to_string()));
        }
        self.inner.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("jiffy_app_state").is_ok());
        assert!(validate_key("app-state-2").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("has space").is_err());
        assert!(validate_key("@jiffy").is_err());
        assert!(validate_key(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_file_store_get_missing() {
        let temp = TempDir::new().unwrap();
        let store = FileBlobStore::open(temp.path()).unwrap();

        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_file_store_set_get_remove() {
        let temp = TempDir::new().unwrap();
        let mut store = FileBlobStore::open(temp.path().join("data")).unwrap();
        assert_eq!(store.dir(), temp.path().join("data"));

        store.set("state", r#"{"a":1}"#).unwrap();
        assert!(temp.path().join("data/state.json").exists());
        assert_eq!(store.get("state").unwrap().as_deref(), Some(r#"{"a":1}"#));

        store.set("state", r#"{"a":2}"#).unwrap();
        assert_eq!(store.get("state").unwrap().as_deref(), Some(r#"{"a":2}"#));
        assert!(!temp.path().join("data/.state.json.tmp").exists());

        store.remove("state").unwrap();
        assert_eq!(store.get("state").unwrap(), None);

        // Removing again is fine
        store.remove("state").unwrap();
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let temp = TempDir::new().unwrap();

        {
            let mut store = FileBlobStore::open(temp.path()).unwrap();
            store.set("state", "hello").unwrap();
        }

        let store = FileBlobStore::open(temp.path()).unwrap();
        assert_eq!(store.get("state").unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let mut store = FileBlobStore::open(temp.path()).unwrap();

        // A directory at the target path makes the rename fail
        fs::create_dir(store.path_for("state")).unwrap();
        fs::write(store.path_for("state").join("occupied"), "x").unwrap();

        let err = store.set("state", "value").unwrap_err();
        assert!(matches!(err, BlobError::Io(_)));
        assert!(!temp.path().join(".state.json.tmp").exists());
    }

    #[test]
    fn test_file_store_rejects_bad_key() {
        let temp = TempDir::new().unwrap();
        let mut store = FileBlobStore::open(temp.path()).unwrap();

        let err = store.set("../outside", "x").unwrap_err();
        assert!(matches!(err, BlobError::InvalidKey(_)));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryBlobStore::new();
        assert!(store.is_empty());

        store.set("k", "v").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
