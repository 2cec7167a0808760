//! Recovery snapshot storage
//!
//! One snapshot slot under a fixed key. Saves happen after every record
//! change and are best effort: a failed write is logged by the caller and
//! the session continues. Loads discard snapshots older than the TTL, so a
//! crash from last week does not resurrect a half-finished form.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use voice_intake_core::ConversationLog;
use voice_intake_form::PatientRecord;

use crate::PersistenceError;

/// Everything needed to resume an interrupted session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySnapshot {
    pub record: PatientRecord,
    pub conversation: ConversationLog,
    /// Field saved most recently, used to re-anchor the conversation
    pub last_updated_field: Option<String>,
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

impl RecoverySnapshot {
    pub fn age_at(&self, now: DateTime<Utc>) -> ChronoDuration {
        now - self.saved_at
    }
}

/// Single-slot snapshot storage
pub trait RecoveryStore: Send + Sync {
    fn save(&self, snapshot: &RecoverySnapshot) -> Result<(), PersistenceError>;

    /// Load the snapshot if one exists and is younger than `ttl_secs`.
    /// A stale snapshot is cleared and reported as absent.
    fn load(&self, ttl_secs: u64) -> Result<Option<RecoverySnapshot>, PersistenceError>;

    fn clear(&self) -> Result<(), PersistenceError>;
}

/// In-memory store for tests and headless runs
#[derive(Default)]
pub struct InMemoryRecoveryStore {
    slot: Mutex<Option<RecoverySnapshot>>,
}

impl InMemoryRecoveryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecoveryStore for InMemoryRecoveryStore {
    fn save(&self, snapshot: &RecoverySnapshot) -> Result<(), PersistenceError> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self, ttl_secs: u64) -> Result<Option<RecoverySnapshot>, PersistenceError> {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(snapshot) if snapshot.age_at(Utc::now()).num_seconds() <= ttl_secs as i64 => {
                Ok(Some(snapshot.clone()))
            }
            Some(_) => {
                *slot = None;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// JSON file under `<dir>/<key>.json`
pub struct FileRecoveryStore {
    path: PathBuf,
}

impl FileRecoveryStore {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecoveryStore for FileRecoveryStore {
    fn save(&self, snapshot: &RecoverySnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec(snapshot)?;
        // Write-then-rename so a crash mid-save cannot corrupt the slot
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn load(&self, ttl_secs: u64) -> Result<Option<RecoverySnapshot>, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: RecoverySnapshot = match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Corrupt slot: clear it rather than wedging every startup
                tracing::warn!("discarding unreadable recovery snapshot: {e}");
                self.clear()?;
                return Ok(None);
            }
        };

        if snapshot.age_at(Utc::now()).num_seconds() > ttl_secs as i64 {
            tracing::info!("recovery snapshot expired, clearing");
            self.clear()?;
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_intake_core::Turn;

    fn snapshot() -> RecoverySnapshot {
        let mut record = PatientRecord::new();
        record.set("full_name", "Jane Roe");
        let mut conversation = ConversationLog::new();
        conversation.push(Turn::user("my name is Jane Roe"));
        RecoverySnapshot {
            record,
            conversation,
            last_updated_field: Some("full_name".to_string()),
            started_at: Utc::now(),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn test_memory_roundtrip() {
        let store = InMemoryRecoveryStore::new();
        store.save(&snapshot()).unwrap();

        let loaded = store.load(3_600).unwrap().unwrap();
        assert_eq!(loaded.record.get("full_name"), Some("Jane Roe"));
        assert_eq!(loaded.conversation.len(), 1);
    }

    #[test]
    fn test_memory_stale_cleared() {
        let store = InMemoryRecoveryStore::new();
        let mut old = snapshot();
        old.saved_at = Utc::now() - ChronoDuration::hours(2);
        store.save(&old).unwrap();

        assert!(store.load(3_600).unwrap().is_none());
        // The stale slot was dropped, not merely hidden
        assert!(store.load(u64::MAX >> 1).unwrap().is_none());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecoveryStore::new(dir.path(), "voice_flow_recovery_session");
        store.save(&snapshot()).unwrap();

        let loaded = store.load(3_600).unwrap().unwrap();
        assert_eq!(loaded.last_updated_field.as_deref(), Some("full_name"));
    }

    #[test]
    fn test_file_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecoveryStore::new(dir.path(), "missing");
        assert!(store.load(3_600).unwrap().is_none());
    }

    #[test]
    fn test_file_corrupt_slot_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecoveryStore::new(dir.path(), "slot");
        fs::write(store.path(), b"{ not json").unwrap();

        assert!(store.load(3_600).unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_clear_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecoveryStore::new(dir.path(), "slot");
        store.save(&snapshot()).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load(3_600).unwrap().is_none());
    }
}
