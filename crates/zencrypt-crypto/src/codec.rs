//! File codec: password + file → container file, and back.
//!
//! Encrypt: open input → generate salt/nonce → derive key → write header →
//! encrypt chunks. Decrypt: read header → derive key from stored salt and
//! params → decrypt and authenticate chunks.
//!
//! Output is written to a temp file beside the destination and only renamed
//! into place once fully written (and, for decryption, fully authenticated).
//! A failed operation leaves no output behind and never clobbers an existing
//! file at the destination.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::container::{check_chunk_size, write_header, ContainerHeader, HEADER_LEN};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_key, KdfParams};
use crate::stream::{decrypt_stream, encrypt_stream, ProgressFn, StreamSummary};
use crate::{DEFAULT_CHUNK_SIZE, TAG_SIZE};

/// Result of a completed file operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Plaintext size in bytes
    pub plaintext_bytes: u64,
    /// Container size in bytes (header + chunks + tags)
    pub container_bytes: u64,
    pub chunks: u64,
}

/// Encrypts and decrypts files with a password.
///
/// The KDF parameters and chunk size only affect new containers; decryption
/// reads both from the container header.
#[derive(Debug, Clone)]
pub struct FileCodec {
    kdf: KdfParams,
    chunk_size: u32,
}

impl Default for FileCodec {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl FileCodec {
    pub fn new(kdf: KdfParams, chunk_size: u32) -> CryptoResult<Self> {
        kdf.validate()?;
        check_chunk_size(chunk_size).map_err(CryptoError::InvalidParams)?;
        Ok(Self { kdf, chunk_size })
    }

    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Encrypt `input_path` into a new container at `output_path`.
    pub fn encrypt_file(
        &self,
        input_path: &Path,
        output_path: &Path,
        password: &SecretString,
        progress: Option<&ProgressFn<'_>>,
    ) -> CryptoResult<CodecReport> {
        debug!(input = %input_path.display(), stage = "reading_input", "encrypt started");
        let input = File::open(input_path)?;
        let total = input.metadata()?.len();
        let reader = BufReader::new(input);

        let report = |done: u64, _: u64, msg: &str| {
            if let Some(cb) = progress {
                cb(done, total, msg);
            }
        };

        let mut tmp = temp_file_beside(output_path)?;
        let summary = {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let summary = self.encrypt_stream_to(reader, &mut writer, password, Some(&report))?;
            writer.flush()?;
            summary
        };
        commit(tmp, output_path)?;

        let container_bytes = HEADER_LEN as u64 + summary.ciphertext_bytes;
        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            bytes = summary.plaintext_bytes,
            chunks = summary.chunks,
            "encrypted file"
        );

        Ok(CodecReport {
            input: input_path.to_path_buf(),
            output: output_path.to_path_buf(),
            plaintext_bytes: summary.plaintext_bytes,
            container_bytes,
            chunks: summary.chunks,
        })
    }

    /// Decrypt the container at `input_path` into `output_path`.
    ///
    /// On `AuthenticationFailure` (wrong password, corrupted or tampered
    /// container) nothing is written to `output_path`.
    pub fn decrypt_file(
        &self,
        input_path: &Path,
        output_path: &Path,
        password: &SecretString,
        progress: Option<&ProgressFn<'_>>,
    ) -> CryptoResult<CodecReport> {
        debug!(input = %input_path.display(), stage = "reading_header", "decrypt started");
        let input = File::open(input_path)?;
        let container_bytes = input.metadata()?.len();
        let mut reader = BufReader::new(input);
        let (header, header_bytes) = ContainerHeader::read_from(&mut reader)?;

        let total = plaintext_len_hint(container_bytes, header.chunk_size as u64);
        let report = |done: u64, _: u64, msg: &str| {
            if let Some(cb) = progress {
                cb(done, total, msg);
            }
        };

        let mut tmp = temp_file_beside(output_path)?;
        let summary = {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let summary = decrypt_body(
                &header,
                &header_bytes,
                reader,
                &mut writer,
                password,
                Some(&report),
            )?;
            writer.flush()?;
            summary
        };
        commit(tmp, output_path)?;

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            bytes = summary.plaintext_bytes,
            chunks = summary.chunks,
            "decrypted file"
        );

        Ok(CodecReport {
            input: input_path.to_path_buf(),
            output: output_path.to_path_buf(),
            plaintext_bytes: summary.plaintext_bytes,
            container_bytes,
            chunks: summary.chunks,
        })
    }

    /// Encrypt an arbitrary stream, writing header and chunks to `writer`.
    pub fn encrypt_stream_to<R: BufRead, W: Write>(
        &self,
        reader: R,
        mut writer: W,
        password: &SecretString,
        progress: Option<&ProgressFn<'_>>,
    ) -> CryptoResult<StreamSummary> {
        let header = ContainerHeader::generate(self.kdf, self.chunk_size);

        debug!(stage = "deriving_key", "deriving key");
        let key = derive_key(password, &header.salt, &header.kdf)?;

        let header_bytes = write_header(&header);
        writer.write_all(&header_bytes)?;

        debug!(stage = "encrypting", chunk_size = header.chunk_size, "encrypting");
        encrypt_stream(
            &key,
            &header.nonce,
            &header_bytes,
            header.chunk_size(),
            reader,
            writer,
            progress,
        )
    }

    /// Decrypt a container read from an arbitrary stream into `writer`.
    ///
    /// Like [`decrypt_stream`], bytes written before an error must be discarded.
    pub fn decrypt_stream_to<R: BufRead, W: Write>(
        &self,
        mut reader: R,
        writer: W,
        password: &SecretString,
        progress: Option<&ProgressFn<'_>>,
    ) -> CryptoResult<StreamSummary> {
        debug!(stage = "reading_header", "decrypt started");
        let (header, header_bytes) = ContainerHeader::read_from(&mut reader)?;
        decrypt_body(&header, &header_bytes, reader, writer, password, progress)
    }
}

fn decrypt_body<R: BufRead, W: Write>(
    header: &ContainerHeader,
    header_bytes: &[u8],
    mut reader: R,
    writer: W,
    password: &SecretString,
    progress: Option<&ProgressFn<'_>>,
) -> CryptoResult<StreamSummary> {
    // Reject header-only input before paying for the KDF
    if reader.fill_buf()?.is_empty() {
        return Err(CryptoError::Format("missing ciphertext".into()));
    }

    debug!(stage = "deriving_key", "deriving key");
    let key = derive_key(password, &header.salt, &header.kdf)?;

    debug!(stage = "decrypting", chunk_size = header.chunk_size, "decrypting");
    let summary = decrypt_stream(
        &key,
        &header.nonce,
        header_bytes,
        header.chunk_size(),
        reader,
        writer,
        progress,
    )?;
    debug!(stage = "verified", chunks = summary.chunks, "all chunks authenticated");
    Ok(summary)
}

/// Create a temp file in the destination's directory so the final rename
/// stays on one filesystem.
fn temp_file_beside(output_path: &Path) -> CryptoResult<NamedTempFile> {
    let dir = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::Builder::new()
        .prefix(".zencrypt-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    Ok(tmp)
}

/// Make the temp file durable, then atomically move it over the destination.
fn commit(tmp: NamedTempFile, output_path: &Path) -> CryptoResult<()> {
    tmp.as_file().sync_all()?;
    tmp.persist(output_path).map_err(|e| CryptoError::Io(e.error))?;
    Ok(())
}

/// Expected plaintext size of a container, for progress display only.
fn plaintext_len_hint(container_bytes: u64, chunk_size: u64) -> u64 {
    let body = container_bytes.saturating_sub(HEADER_LEN as u64);
    let encrypted_chunk = chunk_size + TAG_SIZE as u64;
    let chunks = body.div_ceil(encrypted_chunk).max(1);
    body.saturating_sub(chunks * TAG_SIZE as u64)
}
