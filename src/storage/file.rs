use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{PortalError, PortalResult};
use crate::storage::KeyValueStorage;

/// Storage persisted as one JSON object file.
///
/// Every call re-reads the file so writes from another process are visible.
/// An unreadable or malformed file reads as empty; the next write replaces it.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Storage file inside the CLI config directory
    pub fn in_config_dir(file_name: &str) -> PortalResult<Self> {
        Ok(Self::new(config_dir()?.join(file_name)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "storage file unreadable");
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|err| {
            tracing::warn!(path = %self.path.display(), error = %err, "storage file malformed; treating as empty");
            BTreeMap::new()
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> PortalResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| PortalError::storage(e.to_string()))?;
            }
        }
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content).map_err(|e| PortalError::storage(e.to_string()))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> PortalResult<Option<String>> {
        Ok(self.load().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PortalResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut entries = self.load();
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> PortalResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut entries = self.load();
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

/// `$KONTY_CLI_CONFIG_DIR`, or `~/.config/konty/cli`
pub fn config_dir() -> PortalResult<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("KONTY_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| PortalError::Config("HOME environment variable not set".to_string()))?;
        PathBuf::from(home).join(".config").join("konty").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir).map_err(|e| PortalError::storage(e.to_string()))?;
    }

    Ok(config_dir)
}
