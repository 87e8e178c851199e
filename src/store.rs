//! Memory store boundary.
//!
//! The engine holds a reference to an externally provided key-value store
//! and treats entries as opaque: it tags them with a producer kind on the
//! way in and never introspects them. [`InMemoryStore`] is the default
//! backend; embedders swap in their own by implementing [`MemoryStore`].

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::trace::epoch_ms;

/// Producer tags for stored entries. The core only ever writes
/// [`StoredEntry::EXECUTION`]; the rest exist for external producers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    /// Producer kind ("execution", "file", ...); opaque to the core
    pub kind: String,
    pub value: Value,
    pub stored_at: u64,
}

impl StoredEntry {
    pub const EXECUTION: &'static str = "execution";
    pub const FILE: &'static str = "file";
    pub const EVENT: &'static str = "event";

    pub fn new(kind: impl Into<String>, value: Value) -> Self {
        Self {
            kind: kind.into(),
            value,
            stored_at: epoch_ms(),
        }
    }

    pub fn execution(value: Value) -> Self {
        Self::new(Self::EXECUTION, value)
    }
}

/// Concurrent-safe key-value store contract
pub trait MemoryStore: Send + Sync {
    fn put(&self, key: &str, entry: StoredEntry);
    fn get(&self, key: &str) -> Option<StoredEntry>;
    fn has(&self, key: &str) -> bool;
    fn remove(&self, key: &str) -> bool;
}

/// Default in-process backend
#[derive(Default)]
pub struct InMemoryStore {
    entries: DashMap<String, StoredEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MemoryStore for InMemoryStore {
    fn put(&self, key: &str, entry: StoredEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    fn get(&self, key: &str) -> Option<StoredEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
}
