pub mod file;
pub mod manager;
pub mod memory;

use crate::errors::CoreError;

/// Scope holding data that belongs to no particular user.
pub const SYSTEM_SCOPE: &str = "_identity";

/// Keyed blob storage. Each user is a scope; each ledger is one key whose
/// JSON blob is overwritten wholesale on every mutation.
///
/// Calls are synchronous relative to the in-memory mutation that triggered
/// them; there is no transactional grouping across keys.
pub trait Storage: Send + Sync {
    fn load(&self, scope: &str, key: &str) -> Result<Option<String>, CoreError>;

    fn save(&self, scope: &str, key: &str, blob: &str) -> Result<(), CoreError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, scope: &str, key: &str) -> Result<(), CoreError>;
}
