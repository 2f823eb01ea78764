//! Persistence for the one piece of client state that outlives a session:
//! the display name.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod local;

pub use memory::MemoryNameStore;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileNameStore;

#[cfg(target_arch = "wasm32")]
pub use local::LocalNameStore;

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for display-name storage backends.
pub trait NameStore {
    /// Load the stored name, if any.
    fn load_name(&self) -> StorageResult<Option<String>>;

    /// Store a name, replacing the previous one.
    fn save_name(&mut self, name: &str) -> StorageResult<()>;
}

/// Name store for the current platform in its default location.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_default_store() -> StorageResult<Box<dyn NameStore>> {
    Ok(Box::new(FileNameStore::default_location()?))
}

/// Name store for the current platform in its default location.
#[cfg(target_arch = "wasm32")]
pub fn create_default_store() -> StorageResult<Box<dyn NameStore>> {
    Ok(Box::new(LocalNameStore::new()))
}
