//! Key derivation: Argon2id password → file key

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, SALT_SIZE};

/// Upper bound on Argon2id memory cost accepted from a header (1 GiB)
pub const MAX_MEM_COST_KIB: u32 = 1024 * 1024;

/// Upper bound on Argon2id iterations accepted from a header
pub const MAX_TIME_COST: u32 = 1024;

/// Upper bound on Argon2id lanes accepted from a header
pub const MAX_PARALLELISM: u32 = 16;

/// A 256-bit key derived from a password via Argon2id.
///
/// Zeroized on drop to prevent secrets lingering in memory.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id parameters for KDF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Check the parameters against the bounds a container may carry.
    ///
    /// Returns a human-readable reason on failure; callers map it to the
    /// error kind that fits their context.
    pub fn check(&self) -> Result<(), String> {
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(format!(
                "parallelism {} outside 1..={MAX_PARALLELISM}",
                self.parallelism
            ));
        }
        if self.time_cost == 0 || self.time_cost > MAX_TIME_COST {
            return Err(format!(
                "time cost {} outside 1..={MAX_TIME_COST}",
                self.time_cost
            ));
        }
        // Argon2 needs at least 8 KiB per lane
        let min_mem = 8 * self.parallelism;
        if self.mem_cost_kib < min_mem || self.mem_cost_kib > MAX_MEM_COST_KIB {
            return Err(format!(
                "memory cost {} KiB outside {min_mem}..={MAX_MEM_COST_KIB}",
                self.mem_cost_kib
            ));
        }
        Ok(())
    }

    /// Validate caller-supplied parameters.
    pub fn validate(&self) -> CryptoResult<()> {
        self.check().map_err(CryptoError::InvalidParams)
    }
}

/// Derive a 256-bit key from a password and salt using Argon2id.
///
/// The salt is random per container and stored in its header (it does not
/// need to be secret). Identical inputs always yield the identical key.
pub fn derive_key(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> CryptoResult<DerivedKey> {
    params.validate()?;

    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::Kdf(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::Kdf(format!("Argon2id failed: {e}")))?;

    Ok(DerivedKey::from_bytes(key))
}
