use serde::{de::DeserializeOwned, Serialize};

use super::Storage;
use crate::errors::CoreError;

/// High-level storage operations: save/load a ledger's entry list as one JSON blob.
pub struct StorageManager;

impl StorageManager {
    /// Serialize a list of entries to a JSON blob.
    pub fn encode<T: Serialize>(entries: &[T]) -> Result<String, CoreError> {
        serde_json::to_string(entries)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize entries: {e}")))
    }

    /// Deserialize a JSON blob back into a list of entries.
    pub fn decode<T: DeserializeOwned>(blob: &str) -> Result<Vec<T>, CoreError> {
        serde_json::from_str(blob)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize entries: {e}")))
    }

    /// Overwrite the blob under `(scope, key)` with `entries`.
    pub fn save_entries<T: Serialize>(
        storage: &dyn Storage,
        scope: &str,
        key: &str,
        entries: &[T],
    ) -> Result<(), CoreError> {
        let blob = Self::encode(entries)?;
        storage.save(scope, key, &blob)
    }

    /// Load the entries under `(scope, key)`; a missing blob is an empty list.
    pub fn load_entries<T: DeserializeOwned>(
        storage: &dyn Storage,
        scope: &str,
        key: &str,
    ) -> Result<Vec<T>, CoreError> {
        match storage.load(scope, key)? {
            Some(blob) => Self::decode(&blob),
            None => Ok(Vec::new()),
        }
    }
}
