use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Storage;
use crate::errors::CoreError;

/// Directory-backed storage: `{root}/{scope}/{key}.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous blob intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, scope: &str, key: &str) -> Result<PathBuf, CoreError> {
        for part in [scope, key] {
            if part.is_empty() || part.contains(['/', '\\']) || part == "." || part == ".." {
                return Err(CoreError::Storage(format!("Invalid storage name '{part}'")));
            }
        }
        Ok(self.root.join(scope).join(format!("{key}.json")))
    }
}

impl Storage for FileStorage {
    fn load(&self, scope: &str, key: &str) -> Result<Option<String>, CoreError> {
        let path = self.path_for(scope, key)?;
        match std::fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::Storage(format!("Failed to read {}: {e}", path.display()))),
        }
    }

    fn save(&self, scope: &str, key: &str, blob: &str) -> Result<(), CoreError> {
        let path = self.path_for(scope, key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, blob)
            .map_err(|e| CoreError::Storage(format!("Failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| CoreError::Storage(format!("Failed to replace {}: {e}", path.display())))?;
        debug!(path = %path.display(), bytes = blob.len(), "Saved blob");
        Ok(())
    }

    fn remove(&self, scope: &str, key: &str) -> Result<(), CoreError> {
        let path = self.path_for(scope, key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::Storage(format!("Failed to remove {}: {e}", path.display()))),
        }
    }
}
