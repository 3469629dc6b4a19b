//! Password-encrypted text, armored as base64.
//!
//! The armored form is the standard base64 encoding of a complete container,
//! so `zencrypt decrypt` can also open it once base64-decoded to a file.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::SecretString;

use crate::codec::FileCodec;
use crate::error::{CryptoError, CryptoResult};

/// Encrypt `text` into a base64-armored container.
pub fn encrypt_text(codec: &FileCodec, text: &str, password: &SecretString) -> CryptoResult<String> {
    let mut container = Vec::new();
    codec.encrypt_stream_to(text.as_bytes(), &mut container, password, None)?;
    Ok(STANDARD.encode(container))
}

/// Decrypt a base64-armored container back into text.
pub fn decrypt_text(
    codec: &FileCodec,
    armored: &str,
    password: &SecretString,
) -> CryptoResult<String> {
    let container = STANDARD
        .decode(armored.trim())
        .map_err(|e| CryptoError::Format(format!("base64 decode: {e}")))?;

    let mut plaintext = Vec::new();
    codec.decrypt_stream_to(container.as_slice(), &mut plaintext, password, None)?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Format("decrypted text is not valid UTF-8".into()))
}
