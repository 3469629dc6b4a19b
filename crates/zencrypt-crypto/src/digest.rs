//! SHA-256 digests with an optional salt, for quick integrity checks.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Lowercase hex SHA-256 of `data`, with `salt` appended when present.
pub fn sha256_hex(data: &str, salt: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    if let Some(salt) = salt {
        hasher.update(salt.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Check `data` (and optional salt) against an expected hex digest.
///
/// Hex case is ignored. The digest comparison is constant-time.
pub fn verify_sha256(data: &str, salt: Option<&str>, expected_hex: &str) -> bool {
    let actual = sha256_hex(data, salt);
    let expected = expected_hex.trim().to_ascii_lowercase();
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}
