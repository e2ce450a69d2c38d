use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(String),
    #[error("atomic replace failed: {0}")]
    Persist(String),
}

/// Ranked storage backends, most durable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierKind {
    /// Survives restarts (app data directory)
    Persistent,
    /// Lives for one session (per-process temp directory)
    Session,
    /// Higher-capacity embedded map file, async access
    Embedded,
    /// Always available, never durable
    Memory,
}

/// Uniform key-value contract over one backend.
///
/// Values are envelope JSON text; tiers store bytes and know nothing about
/// schema.
#[async_trait]
pub trait StorageTier: Send + Sync {
    fn kind(&self) -> TierKind;
    /// Probe whether this tier can currently service operations.
    fn available(&self) -> bool;
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn atomic_write(dir: &Path, target: &Path, contents: &str) -> Result<(), StorageError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(target)
        .map_err(|err| StorageError::Persist(err.to_string()))?;
    Ok(())
}

/// One file per key under a root directory. Used for both the persistent
/// tier (app data dir) and the session tier (per-process temp dir).
pub struct FileTier {
    kind: TierKind,
    root: PathBuf,
}

impl FileTier {
    pub fn new(kind: TierKind, root: PathBuf) -> Self {
        Self { kind, root }
    }

    /// Persistent tier rooted in the platform data directory.
    pub fn persistent(namespace: &str) -> Option<Self> {
        let root = dirs::data_local_dir()?.join(namespace);
        Some(Self::new(TierKind::Persistent, root))
    }

    /// Session tier rooted in a per-process temp directory, gone when the
    /// session ends.
    pub fn session(namespace: &str) -> Self {
        let root = std::env::temp_dir().join(format!("{namespace}-{}", std::process::id()));
        Self::new(TierKind::Session, root)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }
}

#[async_trait]
impl StorageTier for FileTier {
    fn kind(&self) -> TierKind {
        self.kind
    }

    fn available(&self) -> bool {
        if std::fs::create_dir_all(&self.root).is_err() {
            return false;
        }
        // Probe writability, not just existence
        let probe = self.root.join(".probe");
        let ok = std::fs::write(&probe, b"ok").is_ok();
        let _ = std::fs::remove_file(&probe);
        ok
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root)?;
        atomic_write(&self.root, &self.path_for(key), value)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn clear(&self) -> Result<(), StorageError> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}

/// Single-file embedded map, MessagePack on disk, loaded lazily and written
/// back atomically on every mutation. The higher-capacity asynchronous tier.
pub struct EmbeddedTier {
    path: PathBuf,
    map: tokio::sync::Mutex<Option<BTreeMap<String, String>>>,
}

impl EmbeddedTier {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            map: tokio::sync::Mutex::new(None),
        }
    }

    pub fn in_dir(namespace: &str) -> Option<Self> {
        let root = dirs::data_local_dir()?.join(namespace);
        Some(Self::new(root.join("store.mpk")))
    }

    fn load(&self) -> BTreeMap<String, String> {
        match std::fs::read(&self.path) {
            Ok(bytes) => rmp_serde::from_slice(&bytes).unwrap_or_else(|err| {
                debug!("embedded store unreadable, starting empty: {err}");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }

    fn write_back(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| StorageError::Persist("store path has no parent".to_string()))?;
        std::fs::create_dir_all(parent)?;
        let bytes =
            rmp_serde::to_vec(map).map_err(|err| StorageError::Encode(err.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&self.path)
            .map_err(|err| StorageError::Persist(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl StorageTier for EmbeddedTier {
    fn kind(&self) -> TierKind {
        TierKind::Embedded
    }

    fn available(&self) -> bool {
        self.path
            .parent()
            .is_some_and(|parent| std::fs::create_dir_all(parent).is_ok())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut guard = self.map.lock().await;
        let map = guard.get_or_insert_with(|| self.load());
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.map.lock().await;
        let map = guard.get_or_insert_with(|| self.load());
        map.insert(key.to_string(), value.to_string());
        self.write_back(map)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.map.lock().await;
        let map = guard.get_or_insert_with(|| self.load());
        map.remove(key);
        self.write_back(map)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self.map.lock().await;
        let map = guard.get_or_insert_with(BTreeMap::new);
        map.clear();
        self.write_back(map)
    }
}

/// The final fallback: a plain in-memory map. Always available, never
/// persists across restarts.
#[derive(Default)]
pub struct MemoryTier {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageTier for MemoryTier {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    fn available(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.lock().clear();
        Ok(())
    }
}
