//! Persistence for key material and identity records.
//!
//! The identity core never touches paths; callers inject a [`KeyStore`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use zkid_merkle::StorageError;

use crate::error::{IdentityError, Result};

/// Byte blobs addressed by a short identifier.
pub trait KeyStore: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<Vec<u8>>>;

    fn store(&self, id: &str, bytes: &[u8]) -> Result<()>;
}

fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(IdentityError::Encoding(format!("invalid key store id '{}'", id)))
    }
}

#[derive(Default)]
pub struct MemoryKeyStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> IdentityError {
    IdentityError::Storage(StorageError::Backend("key store lock poisoned".into()))
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, id: &str) -> Result<Option<Vec<u8>>> {
        validate_id(id)?;
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(id).cloned())
    }

    fn store(&self, id: &str, bytes: &[u8]) -> Result<()> {
        validate_id(id)?;
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// One file per id inside a directory.
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(id))
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err).into()),
        }
    }

    fn store(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(id)?;
        fs::create_dir_all(&self.dir).map_err(StorageError::Io)?;
        // Atomic replace.
        let tmp = self.dir.join(format!(".{}.tmp", id));
        fs::write(&tmp, bytes).map_err(StorageError::Io)?;
        fs::rename(&tmp, &path).map_err(StorageError::Io)?;
        tracing::debug!(path = %path.display(), "stored key material");
        Ok(())
    }
}
