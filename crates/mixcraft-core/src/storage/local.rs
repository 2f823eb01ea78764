//! Browser `localStorage` name store.

use super::{NameStore, StorageError, StorageResult};

const KEY: &str = "username";

/// Stores the display name under the `username` key of `localStorage`.
#[derive(Debug, Default)]
pub struct LocalNameStore;

impl LocalNameStore {
    pub fn new() -> Self {
        Self
    }

    fn storage() -> StorageResult<web_sys::Storage> {
        web_sys::window()
            .ok_or_else(|| StorageError::Other("No window".to_string()))?
            .local_storage()
            .map_err(|e| StorageError::Other(format!("localStorage unavailable: {:?}", e)))?
            .ok_or_else(|| StorageError::Other("localStorage unavailable".to_string()))
    }
}

impl NameStore for LocalNameStore {
    fn load_name(&self) -> StorageResult<Option<String>> {
        Self::storage()?
            .get_item(KEY)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {:?}", KEY, e)))
    }

    fn save_name(&mut self, name: &str) -> StorageResult<()> {
        Self::storage()?
            .set_item(KEY, name)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {:?}", KEY, e)))
    }
}
