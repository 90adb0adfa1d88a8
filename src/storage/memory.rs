//! In-process storage backend.
//!
//! Keeps documents in a map keyed by URI. Handy for dry runs and tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::StorageGateway;

/// Map-backed storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored document, if any.
    pub fn get(&self, uri: &str) -> Option<String> {
        self.lock().get(uri).cloned()
    }

    /// All stored URIs in sorted order.
    pub fn uris(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still a valid map.
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StorageGateway for MemoryStorage {
    async fn read_text(&self, uri: &str) -> Result<String> {
        self.get(uri)
            .ok_or_else(|| AppError::not_found(uri.to_string()))
    }

    async fn write_text(&self, uri: &str, text: &str) -> Result<()> {
        self.lock().insert(uri.to_string(), text.to_string());
        Ok(())
    }
}
