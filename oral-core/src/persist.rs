//! Advisory persistence: a best-effort recovery copy of the store.
//!
//! The host's own storage, fed through snapshot export, is the durable source
//! of truth. The recovery slot only exists to survive a reload, so every
//! failure here is logged and swallowed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::snapshot::Snapshot;
use crate::store::{ElementStore, StoreChange, StoreObserver};
use crate::{CanvasError, CanvasResult};

/// Default key of the recovery record.
pub const DEFAULT_RECOVERY_KEY: &str = "oralCanvasData";

/// A durable key-value slot holding serialized snapshots.
pub trait RecoverySlot: Send + Sync {
    /// Store `value` under `key`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Persistence`] if the record cannot be written.
    fn write(&self, key: &str, value: &str) -> CanvasResult<()>;

    /// Fetch the record under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Persistence`] if the slot exists but cannot be read.
    fn read(&self, key: &str) -> CanvasResult<Option<String>>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileRecoverySlot {
    dir: PathBuf,
}

impl FileRecoverySlot {
    /// Use `dir` for recovery files, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Persistence`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> CanvasResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            CanvasError::Persistence(format!("cannot create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_filename(key)))
    }
}

impl RecoverySlot for FileRecoverySlot {
    fn write(&self, key: &str, value: &str) -> CanvasResult<()> {
        let path = self.path_for(key);
        std::fs::write(&path, value)
            .map_err(|e| CanvasError::Persistence(format!("write {}: {e}", path.display())))
    }

    fn read(&self, key: &str) -> CanvasResult<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CanvasError::Persistence(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }
}

/// In-process slot, for tests and hosts without a disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecoverySlot {
    records: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryRecoverySlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecoverySlot for MemoryRecoverySlot {
    fn write(&self, key: &str, value: &str) -> CanvasResult<()> {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn read(&self, key: &str) -> CanvasResult<Option<String>> {
        let records = self
            .records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(records.get(key).cloned())
    }
}

/// Store observer that mirrors the store into a [`RecoverySlot`] after every change.
pub struct AdvisoryPersistence {
    slot: Arc<dyn RecoverySlot>,
    key: String,
}

impl std::fmt::Debug for AdvisoryPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisoryPersistence")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl AdvisoryPersistence {
    /// Persist under `key` into `slot`.
    #[must_use]
    pub fn new(slot: Arc<dyn RecoverySlot>, key: impl Into<String>) -> Self {
        Self {
            slot,
            key: key.into(),
        }
    }

    /// Write the current store contents. Failures are logged only.
    pub fn save(&self, store: &ElementStore) {
        let json = match store.export_snapshot().to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize recovery snapshot: {e}");
                return;
            }
        };
        if let Err(e) = self.slot.write(&self.key, &json) {
            tracing::warn!("Advisory save to '{}' failed: {e}", self.key);
        }
    }

    /// Load the recovery record into `store`, if there is a usable one.
    ///
    /// Returns `true` if the store was restored.
    pub fn restore(&self, store: &mut ElementStore) -> bool {
        let record = match self.slot.read(&self.key) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("No recovery record under '{}'", self.key);
                return false;
            }
            Err(e) => {
                tracing::warn!("Recovery record '{}' unreadable: {e}", self.key);
                return false;
            }
        };
        match Snapshot::from_json(&record) {
            Ok(snapshot) => {
                store.restore(snapshot);
                tracing::info!("Restored {} elements from '{}'", store.len(), self.key);
                true
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt recovery record '{}': {e}", self.key);
                false
            }
        }
    }
}

impl StoreObserver for AdvisoryPersistence {
    fn store_changed(&mut self, store: &ElementStore, change: &StoreChange) {
        tracing::trace!("Persisting after {change:?}");
        self.save(store);
    }
}

/// Sanitize a key for use as a filename.
///
/// Replaces any character that is not alphanumeric, `-`, or `_` with `_`.
fn sanitize_filename(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, ElementKind, TextLabel};

    struct BrokenSlot;

    impl RecoverySlot for BrokenSlot {
        fn write(&self, _key: &str, _value: &str) -> CanvasResult<()> {
            Err(CanvasError::Persistence("quota exceeded".into()))
        }

        fn read(&self, _key: &str) -> CanvasResult<Option<String>> {
            Err(CanvasError::Persistence("unavailable".into()))
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("oralCanvasData"), "oralCanvasData");
        assert_eq!(sanitize_filename("../etc/passwd"), "___etc_passwd");
    }

    #[test]
    fn test_memory_slot_mirrors_store() {
        let slot = Arc::new(MemoryRecoverySlot::new());
        let mut store = ElementStore::with_session_id("s1");
        store.subscribe(Box::new(AdvisoryPersistence::new(
            slot.clone(),
            DEFAULT_RECOVERY_KEY,
        )));
        store
            .insert(Element::Text(TextLabel::new("N", 1.0, 1.0, "#000", 12.0)))
            .unwrap();

        let record = slot.read(DEFAULT_RECOVERY_KEY).unwrap().unwrap();
        let snapshot = Snapshot::from_json(&record).unwrap();
        assert_eq!(snapshot.labels.len(), 1);
        assert_eq!(snapshot.session_id, "s1");
    }

    #[test]
    fn test_broken_slot_never_fails_mutation() {
        let mut store = ElementStore::new();
        store.subscribe(Box::new(AdvisoryPersistence::new(
            Arc::new(BrokenSlot),
            DEFAULT_RECOVERY_KEY,
        )));
        let id = store
            .insert(Element::Text(TextLabel::new("N", 1.0, 1.0, "#000", 12.0)))
            .unwrap();
        assert!(store.remove(ElementKind::Text, &id));

        let persistence = AdvisoryPersistence::new(Arc::new(BrokenSlot), DEFAULT_RECOVERY_KEY);
        assert!(!persistence.restore(&mut store));
    }

    #[test]
    fn test_restore_ignores_corrupt_record() {
        let slot = Arc::new(MemoryRecoverySlot::new());
        slot.write(DEFAULT_RECOVERY_KEY, "garbage").unwrap();
        let persistence = AdvisoryPersistence::new(slot, DEFAULT_RECOVERY_KEY);
        let mut store = ElementStore::new();
        assert!(!persistence.restore(&mut store));
        assert!(store.is_empty());
    }
}
