//! Chunked ChaCha20-Poly1305 stream encryption/decryption
//!
//! Encrypted stream format (binary):
//! ```text
//! [chunk 0: ciphertext || 16-byte tag] ... [final chunk: ciphertext || 16-byte tag]
//! nonce_i = base_nonce with bytes 4..12 XOR i (u64, big-endian)
//! AAD_i   = associated_data || i (8 bytes, big-endian) || final flag (1 byte)
//! ```
//!
//! Every chunk but the last carries exactly `chunk_size` plaintext bytes. The
//! last chunk may be shorter or empty, so even an empty stream produces one
//! tag. The index and final flag in the AAD bind each chunk to its position,
//! preventing reordering, truncation and extension.
//!
//! Memory use is one `chunk_size + 16` byte buffer regardless of stream length.

use std::io::{BufRead, Read, Write};

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Nonce,
};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivedKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Progress callback: `(bytes_done, bytes_total, message)`.
///
/// The stream functions do not know the total and report `0`; the file codec
/// fills it in from file metadata.
pub type ProgressFn<'a> = dyn Fn(u64, u64, &str) + 'a;

/// Outcome of a completed stream transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Number of chunks processed (always at least 1)
    pub chunks: u64,
    /// Plaintext bytes read (encrypt) or written (decrypt)
    pub plaintext_bytes: u64,
    /// Ciphertext bytes written (encrypt) or read (decrypt), tags included
    pub ciphertext_bytes: u64,
    /// Tag of the final chunk, i.e. the trailing bytes of the container
    pub tag: [u8; TAG_SIZE],
}

/// Encrypt everything `reader` yields into `writer`.
///
/// - `key`: The derived file key
/// - `nonce`: Random per-container base nonce
/// - `associated_data`: Authenticated with every chunk (the container header)
/// - `chunk_size`: Plaintext bytes per chunk, must be non-zero
pub fn encrypt_stream<R: BufRead, W: Write>(
    key: &DerivedKey,
    nonce: &[u8; NONCE_SIZE],
    associated_data: &[u8],
    chunk_size: usize,
    mut reader: R,
    mut writer: W,
    progress: Option<&ProgressFn<'_>>,
) -> CryptoResult<StreamSummary> {
    if chunk_size == 0 {
        return Err(CryptoError::Format("chunk size must be non-zero".into()));
    }

    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let mut buf = Vec::with_capacity(chunk_size + TAG_SIZE);
    let mut aad = Vec::with_capacity(associated_data.len() + 9);
    let mut summary = empty_summary();

    loop {
        buf.clear();
        let n = (&mut reader).take(chunk_size as u64).read_to_end(&mut buf)?;
        let is_final = n < chunk_size || reader.fill_buf()?.is_empty();

        let chunk_nonce = derive_chunk_nonce(nonce, summary.chunks);
        build_aad(&mut aad, associated_data, summary.chunks, is_final);

        cipher
            .encrypt_in_place(Nonce::from_slice(&chunk_nonce), &aad, &mut buf)
            .map_err(|e| {
                CryptoError::Io(std::io::Error::other(format!("chunk encryption failed: {e}")))
            })?;

        writer.write_all(&buf)?;

        summary.tag.copy_from_slice(&buf[buf.len() - TAG_SIZE..]);
        summary.chunks += 1;
        summary.plaintext_bytes += n as u64;
        summary.ciphertext_bytes += buf.len() as u64;
        tracing::trace!(chunk = summary.chunks - 1, len = n, last = is_final, "encrypted chunk");

        if let Some(cb) = progress {
            cb(
                summary.plaintext_bytes,
                0,
                &format!("chunk {}", summary.chunks),
            );
        }

        if is_final {
            break;
        }
    }

    writer.flush()?;
    Ok(summary)
}

/// Decrypt a stream produced by [`encrypt_stream`] into `writer`.
///
/// Each chunk is authenticated before its plaintext is written, but earlier
/// chunks reach `writer` before later ones are checked. Output is only
/// trustworthy once this returns `Ok`; on error the caller must discard
/// whatever was written.
pub fn decrypt_stream<R: BufRead, W: Write>(
    key: &DerivedKey,
    nonce: &[u8; NONCE_SIZE],
    associated_data: &[u8],
    chunk_size: usize,
    mut reader: R,
    mut writer: W,
    progress: Option<&ProgressFn<'_>>,
) -> CryptoResult<StreamSummary> {
    if chunk_size == 0 {
        return Err(CryptoError::Format("chunk size must be non-zero".into()));
    }

    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let encrypted_chunk_size = chunk_size + TAG_SIZE;
    let mut buf = Vec::with_capacity(encrypted_chunk_size);
    let mut aad = Vec::with_capacity(associated_data.len() + 9);
    let mut summary = empty_summary();

    loop {
        buf.clear();
        let n = (&mut reader)
            .take(encrypted_chunk_size as u64)
            .read_to_end(&mut buf)?;

        // A chunk shorter than a tag means the stream was cut
        if n < TAG_SIZE {
            tracing::debug!(chunk = summary.chunks, len = n, "truncated chunk");
            return Err(CryptoError::AuthenticationFailure);
        }
        let is_final = n < encrypted_chunk_size || reader.fill_buf()?.is_empty();
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&buf[n - TAG_SIZE..]);

        let chunk_nonce = derive_chunk_nonce(nonce, summary.chunks);
        build_aad(&mut aad, associated_data, summary.chunks, is_final);

        cipher
            .decrypt_in_place(Nonce::from_slice(&chunk_nonce), &aad, &mut buf)
            .map_err(|_| {
                tracing::debug!(chunk = summary.chunks, "chunk authentication failed");
                CryptoError::AuthenticationFailure
            })?;

        writer.write_all(&buf)?;

        summary.tag = tag;
        summary.chunks += 1;
        summary.plaintext_bytes += buf.len() as u64;
        summary.ciphertext_bytes += n as u64;

        if let Some(cb) = progress {
            cb(
                summary.plaintext_bytes,
                0,
                &format!("chunk {}", summary.chunks),
            );
        }

        if is_final {
            break;
        }
    }

    writer.flush()?;
    Ok(summary)
}

fn empty_summary() -> StreamSummary {
    StreamSummary {
        chunks: 0,
        plaintext_bytes: 0,
        ciphertext_bytes: 0,
        tag: [0u8; TAG_SIZE],
    }
}

/// Per-chunk nonce: the chunk index is XORed into the last 8 bytes.
fn derive_chunk_nonce(base: &[u8; NONCE_SIZE], index: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = *base;
    for (n, i) in nonce[NONCE_SIZE - 8..].iter_mut().zip(index.to_be_bytes()) {
        *n ^= i;
    }
    nonce
}

/// Build AAD: associated_data || chunk_index (8 bytes BE) || final flag
fn build_aad(aad: &mut Vec<u8>, associated_data: &[u8], index: u64, is_final: bool) {
    aad.clear();
    aad.extend_from_slice(associated_data);
    aad.extend_from_slice(&index.to_be_bytes());
    aad.push(u8::from(is_final));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;
    use proptest::prelude::*;
    use std::cell::Cell;

    const NONCE: [u8; NONCE_SIZE] = [0x5Au8; NONCE_SIZE];
    const AAD: &[u8] = b"header-bytes";

    fn test_key(byte: u8) -> DerivedKey {
        DerivedKey::from_bytes([byte; KEY_SIZE])
    }

    fn encrypt(plaintext: &[u8], chunk_size: usize) -> (Vec<u8>, StreamSummary) {
        let mut out = Vec::new();
        let summary =
            encrypt_stream(&test_key(1), &NONCE, AAD, chunk_size, plaintext, &mut out, None)
                .unwrap();
        (out, summary)
    }

    fn decrypt(ciphertext: &[u8], chunk_size: usize) -> CryptoResult<Vec<u8>> {
        let mut out = Vec::new();
        decrypt_stream(&test_key(1), &NONCE, AAD, chunk_size, ciphertext, &mut out, None)?;
        Ok(out)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"hello, encrypted world!";
        let (encrypted, _) = encrypt(plaintext, 1024);
        assert_eq!(decrypt(&encrypted, 1024).unwrap(), plaintext);
    }

    #[test]
    fn test_empty_stream_is_one_tag() {
        let (encrypted, summary) = encrypt(b"", 64);

        assert_eq!(encrypted.len(), TAG_SIZE);
        assert_eq!(summary.chunks, 1);
        assert_eq!(summary.tag.as_slice(), encrypted.as_slice());
        assert_eq!(decrypt(&encrypted, 64).unwrap(), b"");
    }

    #[test]
    fn test_multi_chunk_sizes() {
        let plaintext: Vec<u8> = (0u8..=255).cycle().take(1000).collect();
        let (encrypted, summary) = encrypt(&plaintext, 64);

        // 15 full chunks + one 40-byte chunk
        assert_eq!(summary.chunks, 16);
        assert_eq!(summary.plaintext_bytes, 1000);
        assert_eq!(encrypted.len(), 1000 + 16 * TAG_SIZE);
        assert_eq!(summary.ciphertext_bytes, encrypted.len() as u64);
        assert_eq!(&encrypted[encrypted.len() - TAG_SIZE..], &summary.tag);
        assert_eq!(decrypt(&encrypted, 64).unwrap(), plaintext);
    }

    #[test]
    fn test_exact_multiple_of_chunk_size() {
        let plaintext = vec![0xC3u8; 256];
        let (encrypted, summary) = encrypt(&plaintext, 64);

        // No trailing empty chunk: the fourth full chunk is marked final
        assert_eq!(summary.chunks, 4);
        assert_eq!(encrypted.len(), 256 + 4 * TAG_SIZE);
        assert_eq!(decrypt(&encrypted, 64).unwrap(), plaintext);
    }

    #[test]
    fn test_decrypt_summary_matches_encrypt() {
        let plaintext = vec![9u8; 300];
        let (encrypted, enc_summary) = encrypt(&plaintext, 128);

        let mut out = Vec::new();
        let dec_summary =
            decrypt_stream(&test_key(1), &NONCE, AAD, 128, encrypted.as_slice(), &mut out, None)
                .unwrap();

        assert_eq!(enc_summary, dec_summary);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let (encrypted, _) = encrypt(b"secret data", 64);
        let mut out = Vec::new();
        let result =
            decrypt_stream(&test_key(2), &NONCE, AAD, 64, encrypted.as_slice(), &mut out, None);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailure)));
    }

    #[test]
    fn test_decrypt_wrong_associated_data() {
        let (encrypted, _) = encrypt(b"secret data", 64);
        let mut out = Vec::new();
        let result = decrypt_stream(
            &test_key(1),
            &NONCE,
            b"other-header",
            64,
            encrypted.as_slice(),
            &mut out,
            None,
        );
        assert!(matches!(result, Err(CryptoError::AuthenticationFailure)));
    }

    #[test]
    fn test_decrypt_wrong_chunk_size() {
        let plaintext = vec![1u8; 200];
        let (encrypted, _) = encrypt(&plaintext, 64);
        assert!(matches!(
            decrypt(&encrypted, 32),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_tampered_every_byte() {
        let plaintext: Vec<u8> = (0..150u8).collect();
        let (encrypted, _) = encrypt(&plaintext, 64);

        for i in 0..encrypted.len() {
            let mut tampered = encrypted.clone();
            tampered[i] ^= 0x01;
            assert!(
                matches!(decrypt(&tampered, 64), Err(CryptoError::AuthenticationFailure)),
                "flipping byte {i} must fail authentication"
            );
        }
    }

    #[test]
    fn test_truncated_final_chunk() {
        let plaintext = vec![7u8; 200];
        let (encrypted, _) = encrypt(&plaintext, 64);

        // Drop the final (8-byte + tag) chunk entirely: the previous full
        // chunk was not encrypted as final
        let cut = encrypted.len() - (8 + TAG_SIZE);
        assert!(matches!(
            decrypt(&encrypted[..cut], 64),
            Err(CryptoError::AuthenticationFailure)
        ));

        // Drop a single byte
        assert!(matches!(
            decrypt(&encrypted[..encrypted.len() - 1], 64),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_appended_data_rejected() {
        let (mut encrypted, _) = encrypt(b"short", 64);
        encrypted.extend_from_slice(&[0u8; 3]);
        assert!(matches!(
            decrypt(&encrypted, 64),
            Err(CryptoError::AuthenticationFailure)
        ));

        let (mut encrypted, _) = encrypt(&[1u8; 64], 64);
        encrypted.extend_from_slice(&[0u8; 80]);
        assert!(matches!(
            decrypt(&encrypted, 64),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_swapped_chunks_rejected() {
        let plaintext: Vec<u8> = (0..128u8).collect();
        let (encrypted, _) = encrypt(&plaintext, 64);

        let chunk = 64 + TAG_SIZE;
        let mut swapped = encrypted[chunk..].to_vec();
        swapped.extend_from_slice(&encrypted[..chunk]);

        assert!(matches!(
            decrypt(&swapped, 64),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut out = Vec::new();
        let result = encrypt_stream(&test_key(1), &NONCE, AAD, 0, &b"x"[..], &mut out, None);
        assert!(matches!(result, Err(CryptoError::Format(_))));
    }

    #[test]
    fn test_chunk_nonces_distinct() {
        let n0 = derive_chunk_nonce(&NONCE, 0);
        let n1 = derive_chunk_nonce(&NONCE, 1);
        let n256 = derive_chunk_nonce(&NONCE, 256);

        assert_eq!(n0, NONCE, "chunk 0 uses the base nonce");
        assert_ne!(n0, n1);
        assert_ne!(n1, n256);
        assert_eq!(&n0[..4], &n1[..4], "prefix is untouched");
    }

    #[test]
    fn test_progress_reports_bytes() {
        let last = Cell::new(0u64);
        let calls = Cell::new(0u32);
        let report = |done: u64, _total: u64, _msg: &str| {
            last.set(done);
            calls.set(calls.get() + 1);
        };

        let mut out = Vec::new();
        encrypt_stream(
            &test_key(1),
            &NONCE,
            AAD,
            64,
            &[0u8; 200][..],
            &mut out,
            Some(&report),
        )
        .unwrap();

        assert_eq!(last.get(), 200);
        assert_eq!(calls.get(), 4);
    }

    proptest! {
        #[test]
        fn roundtrip_any_input(
            data in proptest::collection::vec(any::<u8>(), 0..=4096),
            chunk_size in 16usize..=512,
        ) {
            let (encrypted, summary) = encrypt(&data, chunk_size);
            prop_assert_eq!(summary.plaintext_bytes, data.len() as u64);
            prop_assert_eq!(encrypted.len(), data.len() + summary.chunks as usize * TAG_SIZE);
            let decrypted = decrypt(&encrypted, chunk_size).unwrap();
            prop_assert_eq!(decrypted, data);
        }
    }
}
