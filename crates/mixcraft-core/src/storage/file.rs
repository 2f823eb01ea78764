//! File-based name store for native platforms.

use super::{NameStore, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const FILE_NAME: &str = "profile.json";

#[derive(Serialize, Deserialize)]
struct Profile {
    username: String,
}

/// Stores the display name as a small JSON file.
pub struct FileNameStore {
    path: PathBuf,
}

impl FileNameStore {
    /// Create a store writing to `path`. Parent directories are created on save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store in the default location.
    ///
    /// On Unix: `~/.local/share/mixcraft/profile.json`
    /// On Windows: `%LOCALAPPDATA%\mixcraft\profile.json`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Ok(Self::new(base.join("mixcraft").join(FILE_NAME)))
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NameStore for FileNameStore {
    fn load_name(&self) -> StorageResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", self.path.display(), e)))?;
        let profile: Profile = serde_json::from_str(&json).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        Ok(Some(profile.username))
    }

    fn save_name(&mut self, name: &str) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::Io(format!("Failed to create storage directory: {}", e)))?;
        }
        let json = serde_json::to_string(&Profile { username: name.to_string() })
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&self.path, json)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}
