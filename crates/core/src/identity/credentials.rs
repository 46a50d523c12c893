use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;

/// Argon2id parameters for password derivation.
/// Stored next to each credential so they can be raised later without
/// invalidating existing accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    pub memory_cost: u32,
    /// Number of iterations (default: 2)
    pub time_cost: u32,
    /// Degree of parallelism (default: 1)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_cost: 19_456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// A stored password derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub salt: [u8; 16],
    pub hash: [u8; 32],
    pub params: KdfParams,
}

impl Credential {
    /// Derive a fresh credential for `password` with a random salt.
    pub fn create(password: &str, params: KdfParams) -> Result<Self, AuthError> {
        let salt = generate_salt()?;
        let hash = derive_key(password, &salt, &params)?;
        Ok(Self { salt, hash, params })
    }

    /// Re-derive with the stored salt and parameters and compare.
    pub fn verify(&self, password: &str) -> Result<bool, AuthError> {
        let candidate = derive_key(password, &self.salt, &self.params)?;
        Ok(constant_time_eq(&candidate, &self.hash))
    }
}

/// Derive a 256-bit value from a password using Argon2id.
pub fn derive_key(password: &str, salt: &[u8; 16], params: &KdfParams) -> Result<[u8; 32], AuthError> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| AuthError::Credential(format!("Invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| AuthError::Credential(format!("Argon2 derivation failed: {e}")))?;

    Ok(key)
}

/// Generate cryptographically secure random bytes for a salt.
pub fn generate_salt() -> Result<[u8; 16], AuthError> {
    let mut salt = [0u8; 16];
    getrandom::getrandom(&mut salt)
        .map_err(|e| AuthError::Credential(format!("Failed to generate random salt: {e}")))?;
    Ok(salt)
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
