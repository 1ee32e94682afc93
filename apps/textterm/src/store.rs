use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use textterm_core::{HistoryStore, StoreError};

/// Key-value blobs kept as one JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&raw)
            .map_err(|err| StoreError::Unavailable(format!("{}: {err}", self.path.display())))
    }
}

impl HistoryStore for FileHistoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.load().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string(&entries)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(serialized.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textterm_core::{HISTORY_KEY, History};

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path().join("nested/history.json"));
        assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn history_survives_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/history.json");

        let mut history = History::load(Box::new(FileHistoryStore::new(&path)));
        history.push("ls");
        history.push("cd /tmp");

        let reloaded = History::load(Box::new(FileHistoryStore::new(&path)));
        assert_eq!(reloaded.entries(), ["ls", "cd /tmp"]);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "not json").unwrap();
        let store = FileHistoryStore::new(&path);
        assert!(matches!(store.get(HISTORY_KEY), Err(StoreError::Unavailable(_))));

        let mut store = store;
        store.set(HISTORY_KEY, "[]").unwrap();
        assert_eq!(store.get(HISTORY_KEY).unwrap().as_deref(), Some("[]"));
    }
}
