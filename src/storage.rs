//! Persistent key-value storage for session data (tokens, selected branch).

use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const ACCESS_TOKEN: &str = "accessToken";
pub const REFRESH_TOKEN: &str = "refreshToken";
pub const BRANCH_ID: &str = "branchId";
pub const USER_ID: &str = "userId";
pub const USERNAME: &str = "username";

/// Keys removed on logout.
pub const SESSION_KEYS: [&str; 5] = [ACCESS_TOKEN, REFRESH_TOKEN, BRANCH_ID, USER_ID, USERNAME];

pub trait SessionStorage: Send + Sync {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&self, key: &str, value: &str);
  fn remove(&self, key: &str);
}

/// Storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SessionStorage for MemoryStorage {
  fn get(&self, key: &str) -> Option<String> {
    self.values.lock().ok()?.get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) {
    if let Ok(mut values) = self.values.lock() {
      values.insert(key.to_string(), value.to_string());
    }
  }

  fn remove(&self, key: &str) {
    if let Ok(mut values) = self.values.lock() {
      values.remove(key);
    }
  }
}

/// JSON file backed storage. Every write is flushed to disk.
#[derive(Debug)]
pub struct FileStorage {
  path: PathBuf,
  values: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
  /// Open or create the session file at the default location
  pub fn open() -> Result<Self> {
    Self::open_at(Self::default_path()?)
  }

  pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let values = if path.exists() {
      let contents = std::fs::read_to_string(&path)
        .map_err(|e| eyre!("Failed to read session file {}: {}", path.display(), e))?;
      if contents.trim().is_empty() {
        BTreeMap::new()
      } else {
        serde_json::from_str(&contents)
          .map_err(|e| eyre!("Failed to parse session file {}: {}", path.display(), e))?
      }
    } else {
      BTreeMap::new()
    };

    Ok(Self {
      path,
      values: Mutex::new(values),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("tutorcache").join("session.json"))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn flush(&self, values: &BTreeMap<String, String>) {
    let result = serde_json::to_string_pretty(values)
      .map_err(|e| e.to_string())
      .and_then(|json| std::fs::write(&self.path, json).map_err(|e| e.to_string()));
    if let Err(e) = result {
      warn!(path = %self.path.display(), error = %e, "failed to write session file");
    }
  }
}

impl SessionStorage for FileStorage {
  fn get(&self, key: &str) -> Option<String> {
    self.values.lock().ok()?.get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) {
    if let Ok(mut values) = self.values.lock() {
      values.insert(key.to_string(), value.to_string());
      self.flush(&values);
    }
  }

  fn remove(&self, key: &str) {
    if let Ok(mut values) = self.values.lock() {
      if values.remove(key).is_some() {
        self.flush(&values);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_memory_storage() {
    let storage = MemoryStorage::new();
    assert_eq!(storage.get(BRANCH_ID), None);
    storage.set(BRANCH_ID, "3");
    assert_eq!(storage.get(BRANCH_ID).as_deref(), Some("3"));
    storage.remove(BRANCH_ID);
    assert_eq!(storage.get(BRANCH_ID), None);
  }

  #[test]
  fn test_file_storage_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    let storage = FileStorage::open_at(&path).unwrap();
    storage.set(ACCESS_TOKEN, "abc");
    storage.set(BRANCH_ID, "3");
    storage.remove(BRANCH_ID);

    let reopened = FileStorage::open_at(&path).unwrap();
    assert_eq!(reopened.get(ACCESS_TOKEN).as_deref(), Some("abc"));
    assert_eq!(reopened.get(BRANCH_ID), None);
  }

  #[test]
  fn test_file_storage_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(FileStorage::open_at(&path).is_err());
  }

  #[test]
  fn test_empty_file_is_empty_storage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "").unwrap();
    let storage = FileStorage::open_at(&path).unwrap();
    assert_eq!(storage.get(ACCESS_TOKEN), None);
  }
}
