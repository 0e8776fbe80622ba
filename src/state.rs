//! File-backed state store
//!
//! State lives in `state.toml` under the state directory. Every write
//! replaces the whole file through a temp file and a rename, so a crash
//! leaves either the previous or the next version on disk.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::{StateRecord, StateStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Current on-disk format version
pub const STATE_VERSION: u32 = 1;

// ============================================================================
// State Structures
// ============================================================================

/// On-disk state document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,

    /// Incremented on every write
    pub serial: u64,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,

    /// Records by resource identifier
    #[serde(default)]
    pub resources: BTreeMap<String, StateRecord>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            last_updated: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

// ============================================================================
// FileStateStore
// ============================================================================

/// State store persisted to a TOML file
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Mutex<StateFile>,
}

impl FileStateStore {
    /// Load state from disk, or start empty if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read state file: {}", path.display()))?;
            let state: StateFile = toml::from_str(&content)
                .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
            if state.version > STATE_VERSION {
                anyhow::bail!(
                    "State file {} has version {}, newer than supported version {}",
                    path.display(),
                    state.version,
                    STATE_VERSION
                );
            }
            log::debug!(
                "Loaded state from {} (serial {}, {} resources)",
                path.display(),
                state.serial,
                state.resources.len()
            );
            state
        } else {
            log::debug!("State file does not exist, using empty state");
            StateFile::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn serial(&self) -> u64 {
        self.lock().serial
    }

    fn lock(&self) -> MutexGuard<'_, StateFile> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Apply a change and persist it while holding the lock
    fn update<F>(&self, change: F) -> declarative::Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, StateRecord>),
    {
        let mut state = self.lock();
        let mut next = state.clone();
        change(&mut next.resources);
        next.serial += 1;
        next.last_updated = Utc::now();

        write_atomic(&self.path, &next)
            .map_err(|e| declarative::Error::State(format!("{e:#}")))?;
        *state = next;
        Ok(())
    }
}

fn write_atomic(path: &Path, state: &StateFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
    }

    let content = toml::to_string_pretty(state).context("Failed to serialize state to TOML")?;
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, content)
        .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

    log::trace!("Saved state to {} (serial {})", path.display(), state.serial);
    Ok(())
}

impl StateStore for FileStateStore {
    fn get(&self, id: &str) -> declarative::Result<Option<StateRecord>> {
        Ok(self.lock().resources.get(id).cloned())
    }

    fn put(&self, id: &str, record: StateRecord) -> declarative::Result<()> {
        if record.id != id {
            return Err(declarative::Error::State(format!(
                "record for `{}` stored under `{id}`",
                record.id
            )));
        }
        self.update(|resources| {
            resources.insert(id.to_string(), record);
        })
    }

    fn remove(&self, id: &str) -> declarative::Result<()> {
        if !self.lock().resources.contains_key(id) {
            return Ok(());
        }
        self.update(|resources| {
            resources.remove(id);
        })
    }

    fn snapshot(&self) -> declarative::Result<BTreeMap<String, StateRecord>> {
        Ok(self.lock().resources.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Attributes, Reference, ResourceKind, ResourceStatus, Value};

    fn function_record() -> StateRecord {
        let mut env = Attributes::new();
        env.insert("BUCKET_NAME".into(), Value::reference("bucket", "name"));

        let mut record =
            StateRecord::new("function", ResourceKind::Function, ResourceStatus::Applied);
        record.config.insert("environment".into(), Value::Map(env));
        record.config.insert("timeout".into(), Value::from(30_i64));
        record.attributes.insert("memory".into(), Value::from(0.5));
        record.attributes.insert("publish".into(), Value::from(true));
        record.attributes.insert(
            "layers".into(),
            Value::List(vec![Value::from("base"), Value::from("tools")]),
        );
        record.attributes.insert("arn".into(), Value::from("arn:local:function:::fn"));
        record.depends_on = vec!["bucket".into(), "role".into()];
        record
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::load(&dir.path().join("state.toml")).unwrap();
        assert!(store.snapshot().unwrap().is_empty());
        assert_eq!(store.serial(), 0);
    }

    #[test]
    fn test_put_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");
        let record = function_record();

        let store = FileStateStore::load(&path).unwrap();
        store.put("function", record.clone()).unwrap();
        assert_eq!(store.serial(), 1);
        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());

        let reloaded = FileStateStore::load(&path).unwrap();
        assert_eq!(reloaded.get("function").unwrap(), Some(record));
        assert_eq!(reloaded.serial(), 1);
        assert_eq!(
            reloaded.lookup(&Reference::new("function", "arn")).unwrap(),
            Some(Value::from("arn:local:function:::fn"))
        );
    }

    #[test]
    fn test_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");

        let store = FileStateStore::load(&path).unwrap();
        store
            .put(
                "bucket",
                StateRecord::new("bucket", ResourceKind::Bucket, ResourceStatus::Applied),
            )
            .unwrap();
        store.remove("bucket").unwrap();
        store.remove("bucket").unwrap();
        assert_eq!(store.serial(), 2);

        let reloaded = FileStateStore::load(&path).unwrap();
        assert!(reloaded.get("bucket").unwrap().is_none());
    }

    #[test]
    fn test_put_rejects_mismatched_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::load(&dir.path().join("state.toml")).unwrap();
        let record = StateRecord::new("bucket", ResourceKind::Bucket, ResourceStatus::Applied);
        assert!(store.put("role", record).is_err());
        assert_eq!(store.serial(), 0);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "version = [").unwrap();
        assert!(FileStateStore::load(&path).is_err());
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(
            &path,
            "version = 99\nserial = 0\nlast_updated = \"2026-01-01T00:00:00Z\"\n",
        )
        .unwrap();
        let err = FileStateStore::load(&path).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }
}
