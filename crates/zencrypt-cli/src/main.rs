//! zencrypt: password-based file encryption CLI
//!
//! Commands:
//!   encrypt <input> [-o <output>]     - encrypt a file into a .zen container
//!   decrypt <input> [-o <output>]     - decrypt and authenticate a container
//!   inspect <input>                   - show a container's header (no password)
//!   encrypt-text [<text>]             - encrypt text to base64 (stdin if omitted)
//!   decrypt-text <armored>            - decrypt base64 text
//!   hash <text> [--salt]              - SHA-256 digest
//!   verify-hash <text> <expected>     - compare against a SHA-256 digest
//!   config show                       - display current configuration
//!
//! With no command, zencrypt prompts for the operation, paths and password.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::ffi::OsString;
use std::io::{BufReader, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use zencrypt_core::{ZencryptConfig, DEFAULT_CONFIG_PATH, ENCRYPTED_EXTENSION};
use zencrypt_crypto::container::HEADER_LEN;
use zencrypt_crypto::{ContainerHeader, CryptoError, FileCodec, KdfParams, TAG_SIZE};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "zencrypt",
    version,
    about = "Password-based file encryption",
    long_about = "zencrypt: encrypt and decrypt files with a password \
                  (Argon2id key derivation, chunked ChaCha20-Poly1305)"
)]
struct Cli {
    /// Path to config.toml
    #[arg(long, short = 'c', env = "ZENCRYPT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long, env = "ZENCRYPT_LOG")]
    log: Option<String>,

    /// Log format; overrides config
    #[arg(long, env = "ZENCRYPT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Args, Debug)]
struct PasswordArgs {
    /// Password (prompted for when omitted)
    #[arg(long, env = "ZENCRYPT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file into a container
    Encrypt {
        /// File to encrypt
        input: PathBuf,
        /// Destination (default: <input>.zen)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Overwrite an existing destination
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Decrypt and authenticate a container
    ///
    /// Nothing is written unless the whole container authenticates.
    Decrypt {
        /// Container to decrypt
        input: PathBuf,
        /// Destination (default: input without .zen, or <input>.dec)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Overwrite an existing destination
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Show a container's header without decrypting it
    Inspect {
        /// Container to inspect
        input: PathBuf,
    },

    /// Encrypt text and print it as base64
    #[command(name = "encrypt-text")]
    EncryptText {
        /// Text to encrypt (read from stdin when omitted)
        text: Option<String>,
        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Decrypt base64 text produced by encrypt-text
    #[command(name = "decrypt-text")]
    DecryptText {
        /// Base64 container
        armored: String,
        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Print the SHA-256 digest of some text
    Hash {
        text: String,
        /// Salt appended to the text before hashing
        #[arg(long)]
        salt: Option<String>,
    },

    /// Check text against an expected SHA-256 digest
    #[command(name = "verify-hash")]
    VerifyHash {
        text: String,
        /// Expected digest (hex)
        expected: String,
        /// Salt appended to the text before hashing
        #[arg(long)]
        salt: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ZencryptConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(if config.log.format == "json" {
        LogFormat::Json
    } else {
        LogFormat::Text
    });
    init_logging(&level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "zencrypt starting"
    );

    match cli.command {
        Some(Commands::Encrypt { input, output, force, password }) => {
            let codec = codec_from_config(&config)?;
            cmd_encrypt(&codec, &input, output.as_deref(), force, password.password)
        }
        Some(Commands::Decrypt { input, output, force, password }) => {
            let codec = codec_from_config(&config)?;
            cmd_decrypt(&codec, &input, output.as_deref(), force, password.password)
        }
        Some(Commands::Inspect { input }) => cmd_inspect(&input),
        Some(Commands::EncryptText { text, password }) => {
            let codec = codec_from_config(&config)?;
            cmd_encrypt_text(&codec, text, password.password)
        }
        Some(Commands::DecryptText { armored, password }) => {
            let codec = codec_from_config(&config)?;
            cmd_decrypt_text(&codec, &armored, password.password)
        }
        Some(Commands::Hash { text, salt }) => {
            println!("{}", zencrypt_crypto::sha256_hex(&text, salt.as_deref()));
            Ok(())
        }
        Some(Commands::VerifyHash { text, expected, salt }) => {
            cmd_verify_hash(&text, &expected, salt.as_deref())
        }
        Some(Commands::Config { action: ConfigAction::Show }) => {
            cmd_config_show(&config, &cli.config)
        }
        None => {
            let codec = codec_from_config(&config)?;
            cmd_interactive(&codec)
        }
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stderr keeps stdout clean for digests and armored text
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn codec_from_config(config: &ZencryptConfig) -> Result<FileCodec> {
    let kdf = KdfParams {
        mem_cost_kib: config.crypto.argon2_mem_cost_kib,
        time_cost: config.crypto.argon2_time_cost,
        parallelism: config.crypto.argon2_parallelism,
    };
    FileCodec::new(kdf, config.crypto.chunk_size).context("invalid [crypto] settings in config")
}

// ── Password and path helpers ─────────────────────────────────────────────────

/// Use the --password / ZENCRYPT_PASSWORD value, or prompt without echo.
fn resolve_password(provided: Option<String>, confirm: bool) -> Result<SecretString> {
    if let Some(value) = provided {
        return Ok(SecretString::from(value));
    }
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("no password provided and no TTY available; set ZENCRYPT_PASSWORD");
    }

    let password = SecretString::from(
        rpassword::prompt_password("Password: ").context("reading password")?,
    );
    if confirm {
        let again = SecretString::from(
            rpassword::prompt_password("Confirm password: ").context("reading password")?,
        );
        if password.expose_secret() != again.expose_secret() {
            anyhow::bail!("passwords do not match");
        }
    }
    if password.expose_secret().is_empty() {
        eprintln!("warning: empty password");
    }
    Ok(password)
}

fn default_encrypt_output(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(".");
    name.push(ENCRYPTED_EXTENSION);
    PathBuf::from(name)
}

fn default_decrypt_output(input: &Path) -> PathBuf {
    match input.extension() {
        Some(ext) if ext == ENCRYPTED_EXTENSION => input.with_extension(""),
        _ => {
            let mut name = OsString::from(input.as_os_str());
            name.push(".dec");
            PathBuf::from(name)
        }
    }
}

fn ensure_can_write(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }
    Ok(())
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
    )
    .map(|s| s.progress_chars("=>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

// ── `zencrypt encrypt` ────────────────────────────────────────────────────────

fn cmd_encrypt(
    codec: &FileCodec,
    input: &Path,
    output: Option<&Path>,
    force: bool,
    password: Option<String>,
) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_encrypt_output(input));
    if !input.is_file() {
        anyhow::bail!("input not found or not a file: {}", input.display());
    }
    ensure_can_write(&output, force)?;
    let password = resolve_password(password, true)?;

    let pb = make_progress_bar("encrypt");
    let progress = |done: u64, total: u64, msg: &str| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    };

    let result = codec.encrypt_file(input, &output, &password, Some(&progress));
    pb.finish_and_clear();
    let report = result.with_context(|| format!("encrypting {}", input.display()))?;

    println!("Encrypted {} → {}", input.display(), output.display());
    println!("  plaintext: {}", fmt_bytes(report.plaintext_bytes));
    println!("  container: {}", fmt_bytes(report.container_bytes));
    println!("  chunks:    {}", report.chunks);
    Ok(())
}

// ── `zencrypt decrypt` ────────────────────────────────────────────────────────

fn cmd_decrypt(
    codec: &FileCodec,
    input: &Path,
    output: Option<&Path>,
    force: bool,
    password: Option<String>,
) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_decrypt_output(input));
    if !input.is_file() {
        anyhow::bail!("input not found or not a file: {}", input.display());
    }
    ensure_can_write(&output, force)?;
    let password = resolve_password(password, false)?;

    let pb = make_progress_bar("decrypt");
    let progress = |done: u64, total: u64, msg: &str| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    };

    let result = codec.decrypt_file(input, &output, &password, Some(&progress));
    pb.finish_and_clear();
    let report = match result {
        Ok(report) => report,
        Err(CryptoError::AuthenticationFailure) => {
            tracing::warn!(input = %input.display(), "authentication failed");
            anyhow::bail!(
                "cannot decrypt {}: wrong password or corrupted file (nothing was written)",
                input.display()
            );
        }
        Err(e) => {
            return Err(e).with_context(|| format!("decrypting {}", input.display()));
        }
    };

    println!("Decrypted {} → {}", input.display(), output.display());
    println!("  plaintext: {}", fmt_bytes(report.plaintext_bytes));
    println!("  chunks:    {}", report.chunks);
    Ok(())
}

// ── `zencrypt inspect` ────────────────────────────────────────────────────────

fn cmd_inspect(input: &Path) -> Result<()> {
    let file = std::fs::File::open(input)
        .with_context(|| format!("opening {}", input.display()))?;
    let size = file
        .metadata()
        .with_context(|| format!("reading metadata: {}", input.display()))?
        .len();
    let mut reader = BufReader::new(file);
    let (header, _) = ContainerHeader::read_from(&mut reader)
        .with_context(|| format!("reading header: {}", input.display()))?;

    let body = size.saturating_sub(HEADER_LEN as u64);
    let encrypted_chunk = header.chunk_size as u64 + TAG_SIZE as u64;
    let chunks = body.div_ceil(encrypted_chunk).max(1);

    println!("{}", input.display());
    println!("  version:     {}", header.version);
    println!("  salt:        {}", hex(&header.salt));
    println!("  nonce:       {}", hex(&header.nonce));
    println!(
        "  kdf:         argon2id t={} m={} KiB p={}",
        header.kdf.time_cost, header.kdf.mem_cost_kib, header.kdf.parallelism
    );
    println!("  chunk size:  {}", fmt_bytes(header.chunk_size as u64));
    println!("  size:        {} (~{} chunks)", fmt_bytes(size), chunks);
    Ok(())
}

// ── `zencrypt encrypt-text` / `decrypt-text` ─────────────────────────────────

fn cmd_encrypt_text(codec: &FileCodec, text: Option<String>, password: Option<String>) -> Result<()> {
    let text = match text {
        Some(t) => t,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading text from stdin")?;
            buf
        }
    };
    let password = resolve_password(password, true)?;
    let armored = zencrypt_crypto::encrypt_text(codec, &text, &password)
        .context("encrypting text")?;
    println!("{armored}");
    Ok(())
}

fn cmd_decrypt_text(codec: &FileCodec, armored: &str, password: Option<String>) -> Result<()> {
    let password = resolve_password(password, false)?;
    let text = zencrypt_crypto::decrypt_text(codec, armored, &password)
        .context("decrypting text")?;
    println!("{text}");
    Ok(())
}

// ── `zencrypt verify-hash` ────────────────────────────────────────────────────

fn cmd_verify_hash(text: &str, expected: &str, salt: Option<&str>) -> Result<()> {
    if zencrypt_crypto::verify_sha256(text, salt, expected) {
        println!("match");
        Ok(())
    } else {
        anyhow::bail!("hash does not match")
    }
}

// ── `zencrypt config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &ZencryptConfig, config_path: &Path) -> Result<()> {
    let resolved = zencrypt_core::config::expand_tilde(config_path);
    if resolved.exists() {
        println!("# Configuration from: {}", resolved.display());
    } else {
        println!("# Configuration: defaults (no file at {})", resolved.display());
    }
    println!();
    let rendered = config.to_toml().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Interactive mode ──────────────────────────────────────────────────────────

fn cmd_interactive(codec: &FileCodec) -> Result<()> {
    let choice = prompt_line("Encrypt or decrypt a file? [e/d]: ")?;
    let encrypting = match choice.to_ascii_lowercase().as_str() {
        "e" | "encrypt" => true,
        "d" | "decrypt" => false,
        other => anyhow::bail!("unknown choice: {other:?}"),
    };

    let verb = if encrypting { "encrypt" } else { "decrypt" };
    let input = PathBuf::from(prompt_line(&format!("Enter the path to the file to {verb}: "))?);
    let suggested = if encrypting {
        default_encrypt_output(&input)
    } else {
        default_decrypt_output(&input)
    };
    let output = prompt_line(&format!(
        "Enter the output path [{}]: ",
        suggested.display()
    ))?;
    let output = if output.is_empty() {
        suggested
    } else {
        PathBuf::from(output)
    };

    if encrypting {
        cmd_encrypt(codec, &input, Some(&output), false, None)
    } else {
        cmd_decrypt(codec, &input, Some(&output), false, None)
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush().context("flushing stdout")?;
    let mut line = String::new();
    let n = std::io::stdin()
        .read_line(&mut line)
        .context("reading from stdin")?;
    if n == 0 {
        anyhow::bail!("unexpected end of input");
    }
    Ok(line.trim().to_string())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
