//! In-memory name store.

use super::{NameStore, StorageResult};

/// In-memory name store for testing and ephemeral use.
#[derive(Debug, Clone, Default)]
pub struct MemoryNameStore {
    name: Option<String>,
}

impl MemoryNameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `name`.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()) }
    }
}

impl NameStore for MemoryNameStore {
    fn load_name(&self) -> StorageResult<Option<String>> {
        Ok(self.name.clone())
    }

    fn save_name(&mut self, name: &str) -> StorageResult<()> {
        self.name = Some(name.to_string());
        Ok(())
    }
}
