use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Key/value persistence port. Engines never touch the underlying storage
/// mechanism directly; they receive a `Store` so any backend can stand in.
pub trait Store {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn put_raw(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn delete(&mut self, key: &str) -> anyhow::Result<()>;
}

/// Reads and deserializes a key. Missing keys and malformed JSON both
/// resolve to `None`; malformed payloads are logged, never propagated.
pub fn load_json<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Option<T> {
    let raw = store.get_raw(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "malformed persisted value; using defaults");
            None
        }
    }
}

/// Serializes and writes a key. Persistence is best-effort: failures are
/// logged and swallowed so a full disk never takes the dashboard down.
pub fn save_json<T: Serialize>(store: &mut dyn Store, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => {
            if let Err(err) = store.put_raw(key, &raw) {
                warn!(key, error = %err, "failed to persist value");
            }
        }
        Err(err) => warn!(key, error = %err, "failed to serialize value"),
    }
}

/// File-per-key JSON store rooted in the data directory.
#[derive(Debug)]
pub struct JsonFileStore {
    pub data_dir: PathBuf,
}

impl JsonFileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened store");
        Ok(Self { data_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl Store for JsonFileStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Some(raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "failed reading key");
                None
            }
        }
    }

    fn put_raw(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.key_path(key);
        debug!(file = %path.display(), "writing key atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to delete {}", path.display())),
        }
    }
}

/// In-memory store for test harnesses and one-shot evaluation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    fn put_raw(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> anyhow::Result<()> {
        self.map.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStore, Store, load_json, save_json};

    #[test]
    fn malformed_json_loads_as_none() {
        let mut store = MemoryStore::new();
        store.put_raw("layout", "{not json").expect("put");
        let loaded: Option<Vec<u32>> = load_json(&store, "layout");
        assert!(loaded.is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut store = MemoryStore::new();
        save_json(&mut store, "numbers", &vec![1u32, 2, 3]);
        let loaded: Option<Vec<u32>> = load_json(&store, "numbers");
        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }
}
