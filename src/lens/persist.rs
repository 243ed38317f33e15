//! Persistence boundary: key-value storage for preferences and saved items
//!
//! The engine never awaits storage. Reads happen once at startup (the host
//! hydrates state from them); writes are handed off on every change and may
//! complete later. A failed write leaves in-memory state authoritative.

use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::LensConfig;
use crate::error::{LensError, Result};
use crate::lens::filter::FilterConfiguration;

/// Key-value storage collaborator
///
/// Single-writer: the last write for a key wins.
pub trait StorageBackend {
    fn read(&self, key: &str) -> Result<Option<Value>>;
    fn write(&self, key: &str, value: Value) -> Result<()>;
}

/// In-process backend for tests and non-browser hosts
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<HashMap<String, Value>>,
    writes: RefCell<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes accepted so far
    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }

    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<()> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        *self.writes.borrow_mut() += 1;
        Ok(())
    }
}

/// Per-thread filter preferences
pub struct PrefsStore {
    backend: Rc<dyn StorageBackend>,
    key: String,
    last_error: RefCell<Option<String>>,
}

impl PrefsStore {
    pub fn new(backend: Rc<dyn StorageBackend>, config: &LensConfig, thread_id: &str) -> Self {
        Self { backend, key: config.prefs_key(thread_id), last_error: RefCell::new(None) }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stored preferences merged over defaults
    ///
    /// Missing, unreadable or malformed records all yield the default
    /// configuration; the failure is logged, never raised.
    pub fn load(&self) -> FilterConfiguration {
        match self.try_load() {
            Ok(Some(filter)) => filter,
            Ok(None) => FilterConfiguration::default(),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "filter preferences unreadable, using defaults");
                FilterConfiguration::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<FilterConfiguration>> {
        match self.backend.read(&self.key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Write `filter` under this thread's key
    ///
    /// A failure is also kept until `take_error`, for hosts that only see
    /// the outcome later.
    pub fn save(&self, filter: &FilterConfiguration) -> Result<()> {
        let written = serde_json::to_value(filter)
            .map_err(LensError::from)
            .and_then(|value| self.backend.write(&self.key, value));
        if let Err(e) = &written {
            tracing::warn!(key = %self.key, error = %e, "filter preferences write failed");
            *self.last_error.borrow_mut() = Some(e.to_string());
        }
        written
    }

    /// Last failed save, cleared on read
    pub fn take_error(&self) -> Option<String> {
        self.last_error.borrow_mut().take()
    }
}

/// Decode a persisted JSON value supplied by the host
pub fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| LensError::InvalidInput(e.to_string()))
}
