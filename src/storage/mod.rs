//! Persistent key-value storage.
//!
//! The session layer only needs string get/set/remove scoped to one
//! profile. Backends:
//! - [`MemoryStore`]: process-local, used by tests and short-lived tools
//! - [`NoopStore`]: stands in where no persistence exists (server rendering)
//! - [`SqliteStore`]: durable single-file store for desktop/CLI use

pub mod sqlite;

pub use sqlite::SqliteStore;

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Synchronous string key-value storage.
///
/// `get` never fails: a backend that cannot read a key reports it as
/// absent, which the session layer treats as "no session".
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Store that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

impl KeyValueStore for NoopStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}
