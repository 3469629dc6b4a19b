pub mod config;
pub mod error;

pub use config::{CryptoConfig, LogConfig, ZencryptConfig};
pub use error::{ZencryptError, ZencryptResult};

/// File extension appended to encrypted containers by the CLI
pub const ENCRYPTED_EXTENSION: &str = "zen";

/// Default config file location (tilde-expanded at load time)
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/zencrypt/config.toml";
