//! zencrypt-crypto: password-based file encryption
//!
//! Architecture: Argon2id KDF + chunked ChaCha20-Poly1305 (STREAM-style)
//!
//! Pipeline: password + random salt → Argon2id → 256-bit key → chunked AEAD → container
//!
//! Container layout:
//! ```text
//! [45-byte header: version, salt, nonce, KDF params, chunk size]
//! [chunk 0: ciphertext || 16-byte tag]
//! ...
//! [final chunk: ciphertext || 16-byte tag]
//! ```
//!
//! Every chunk authenticates the full header bytes, its own index and a
//! final-chunk flag, so header edits, reordering, truncation and appended
//! data are all rejected.

pub mod codec;
pub mod container;
pub mod digest;
pub mod error;
pub mod kdf;
pub mod stream;
pub mod text;

pub use codec::{CodecReport, FileCodec};
pub use container::{read_header, write_header, ContainerHeader};
pub use digest::{sha256_hex, verify_sha256};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, DerivedKey, KdfParams};
pub use stream::{decrypt_stream, encrypt_stream, ProgressFn, StreamSummary};
pub use text::{decrypt_text, encrypt_text};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the KDF salt stored in the header
pub const SALT_SIZE: usize = 16;

/// Size of a ChaCha20-Poly1305 nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Container format version written by this crate
pub const FORMAT_VERSION: u8 = 1;

/// Default plaintext bytes per chunk (64 KiB)
pub const DEFAULT_CHUNK_SIZE: u32 = 64 * 1024;

/// Smallest accepted chunk size
pub const MIN_CHUNK_SIZE: u32 = 16;

/// Largest accepted chunk size (16 MiB), bounds decryption memory
pub const MAX_CHUNK_SIZE: u32 = 16 * 1024 * 1024;
