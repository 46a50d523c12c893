use std::collections::HashMap;
use std::sync::Mutex;

use super::Storage;
use crate::errors::CoreError;

/// Ephemeral storage, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs across all scopes.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn load(&self, scope: &str, key: &str) -> Result<Option<String>, CoreError> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(blobs.get(&(scope.to_string(), key.to_string())).cloned())
    }

    fn save(&self, scope: &str, key: &str, blob: &str) -> Result<(), CoreError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.insert((scope.to_string(), key.to_string()), blob.to_string());
        Ok(())
    }

    fn remove(&self, scope: &str, key: &str) -> Result<(), CoreError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.remove(&(scope.to_string(), key.to_string()));
        Ok(())
    }
}
