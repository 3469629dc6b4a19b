use thiserror::Error;

pub type ZencryptResult<T> = Result<T, ZencryptError>;

#[derive(Debug, Error)]
pub enum ZencryptError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
