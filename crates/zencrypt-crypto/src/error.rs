use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid container: {0}")]
    Format(String),

    #[error("unsupported container version {0}")]
    UnsupportedVersion(u8),

    /// Deliberately does not say whether the key or the data was at fault.
    #[error("authentication failed: wrong password or corrupted file")]
    AuthenticationFailure,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("key derivation error: {0}")]
    Kdf(String),
}
