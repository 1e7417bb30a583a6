use crate::model::Task;
use anyhow::{anyhow, bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Blob store the task store persists through: one opaque string per key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, blob: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Stores each key as `<dir>/<key>.yml`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating {:?}", dir))?;
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            bail!("invalid storage key: {:?}", key);
        }
        Ok(self.dir.join(format!("{key}.yml")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        Ok(Some(data))
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // Write beside the target and rename so a reader never sees half a snapshot.
        let staging = path.with_extension("yml.tmp");
        fs::write(&staging, blob).with_context(|| format!("writing {:?}", staging))?;
        fs::rename(&staging, &path).with_context(|| format!("replacing {:?}", path))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("removing {:?}", path))?;
        }
        Ok(())
    }
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> Result<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(f(&mut entries))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), blob.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "descaos").context("locating data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything the task store persists.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub categories: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    state: T,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_yaml::Error),
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, SnapshotError> {
    let envelope = Envelope {
        version: SNAPSHOT_VERSION,
        state: snapshot,
    };
    Ok(serde_yaml::to_string(&envelope)?)
}

pub fn decode_snapshot(blob: &str) -> Result<Snapshot, SnapshotError> {
    let header: VersionHeader = serde_yaml::from_str(blob)?;
    if header.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: header.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    let envelope: Envelope<Snapshot> = serde_yaml::from_str(blob)?;
    Ok(envelope.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, Recurrence};
    use chrono::{TimeZone, Utc};

    fn sample() -> Snapshot {
        let mut gym = Task::new(
            "gym01".into(),
            "Gym".into(),
            "Saude".into(),
            Recurrence::weekdays(),
            Priority::High,
            Utc.with_ymd_and_hms(2026, 10, 18, 7, 30, 0).unwrap(),
        );
        gym.is_completed = true;
        let sunday = chrono::NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        gym.last_completed_date = Some(sunday.into());
        Snapshot {
            tasks: vec![gym],
            categories: vec!["Geral".into(), "Saude".into()],
        }
    }

    #[test]
    fn snapshot_survives_encoding() {
        let snapshot = sample();
        let blob = encode_snapshot(&snapshot).unwrap();
        assert!(blob.starts_with("version: 1"));
        assert_eq!(decode_snapshot(&blob).unwrap(), snapshot);
    }

    #[test]
    fn future_versions_are_rejected() {
        let blob = "version: 7\nstate:\n  whatever: true\n";
        assert!(matches!(
            decode_snapshot(blob),
            Err(SnapshotError::UnsupportedVersion { found: 7, .. })
        ));
        assert!(matches!(
            decode_snapshot("not: [valid"),
            Err(SnapshotError::Malformed(_))
        ));
    }

    #[test]
    fn memory_store_clones_share_entries() {
        let store = MemoryStore::default();
        let view = store.clone();
        store.set("k", "v").unwrap();
        assert_eq!(view.get("k").unwrap().as_deref(), Some("v"));
        view.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn file_store_round_trips_and_rejects_unsafe_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nested")).unwrap();
        assert_eq!(store.get("tasks-storage").unwrap(), None);
        store.set("tasks-storage", "version: 1").unwrap();
        assert_eq!(
            store.get("tasks-storage").unwrap().as_deref(),
            Some("version: 1")
        );
        assert!(store.dir().join("tasks-storage.yml").exists());
        store.remove("tasks-storage").unwrap();
        assert_eq!(store.get("tasks-storage").unwrap(), None);
        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("").is_err());
    }
}
