//! Container header format
//!
//! Binary header layout (v1, little-endian):
//! ```text
//! offset  size  field
//!  0       1    version      (= 1)
//!  1      16    salt         (Argon2id salt)
//! 17      12    nonce        (base nonce for the chunk stream)
//! 29       4    time_cost    (u32, Argon2id iterations)
//! 33       4    mem_cost_kib (u32)
//! 37       4    parallelism  (u32)
//! 41       4    chunk_size   (u32, plaintext bytes per chunk)
//! ```
//!
//! The encrypted chunk stream follows immediately. The serialized header is
//! passed to the stream cipher as associated data, so any change to it
//! fails authentication even when it still parses.

use std::io::Read;

use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::KdfParams;
use crate::{FORMAT_VERSION, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, NONCE_SIZE, SALT_SIZE};

/// Serialized header size for format version 1
pub const HEADER_LEN: usize = 1 + SALT_SIZE + NONCE_SIZE + 4 * 4;

/// Parsed container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u8,
    pub salt: [u8; SALT_SIZE],
    pub nonce: [u8; NONCE_SIZE],
    pub kdf: KdfParams,
    pub chunk_size: u32,
}

impl ContainerHeader {
    /// Create a header for a new container with a fresh random salt and nonce.
    pub fn generate(kdf: KdfParams, chunk_size: u32) -> Self {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_SIZE];
        rng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_SIZE];
        rng.fill_bytes(&mut nonce);

        Self {
            version: FORMAT_VERSION,
            salt,
            nonce,
            kdf,
            chunk_size,
        }
    }

    /// Read and parse a header from the front of a stream.
    ///
    /// Returns the header together with its raw bytes, which the caller
    /// feeds to the stream cipher as associated data.
    pub fn read_from<R: Read>(reader: &mut R) -> CryptoResult<(Self, [u8; HEADER_LEN])> {
        let mut raw = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            match reader.read(&mut raw[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let header = read_header(&raw[..filled])?;
        Ok((header, raw))
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size as usize
    }
}

/// Serialize a header to its fixed-size binary form.
pub fn write_header(header: &ContainerHeader) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[0] = header.version;
    out[1..17].copy_from_slice(&header.salt);
    out[17..29].copy_from_slice(&header.nonce);
    out[29..33].copy_from_slice(&header.kdf.time_cost.to_le_bytes());
    out[33..37].copy_from_slice(&header.kdf.mem_cost_kib.to_le_bytes());
    out[37..41].copy_from_slice(&header.kdf.parallelism.to_le_bytes());
    out[41..45].copy_from_slice(&header.chunk_size.to_le_bytes());
    out
}

/// Parse a header from the start of `bytes`.
///
/// Trailing bytes beyond the header are ignored. The version byte is checked
/// before the length, so a container from a newer format reports
/// `UnsupportedVersion` rather than a truncation.
pub fn read_header(bytes: &[u8]) -> CryptoResult<ContainerHeader> {
    let version = *bytes
        .first()
        .ok_or_else(|| CryptoError::Format("truncated header: empty input".into()))?;
    if version != FORMAT_VERSION {
        return Err(CryptoError::UnsupportedVersion(version));
    }
    if bytes.len() < HEADER_LEN {
        return Err(CryptoError::Format(format!(
            "truncated header: {} bytes (expected {HEADER_LEN})",
            bytes.len()
        )));
    }

    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&bytes[1..17]);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&bytes[17..29]);

    let kdf = KdfParams {
        time_cost: read_u32(bytes, 29),
        mem_cost_kib: read_u32(bytes, 33),
        parallelism: read_u32(bytes, 37),
    };
    kdf.check()
        .map_err(|reason| CryptoError::Format(format!("KDF parameters: {reason}")))?;

    let chunk_size = read_u32(bytes, 41);
    check_chunk_size(chunk_size).map_err(CryptoError::Format)?;

    Ok(ContainerHeader {
        version,
        salt,
        nonce,
        kdf,
        chunk_size,
    })
}

/// Check a chunk size against the accepted range.
pub fn check_chunk_size(chunk_size: u32) -> Result<(), String> {
    if (MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        Ok(())
    } else {
        Err(format!(
            "chunk size {chunk_size} outside {MIN_CHUNK_SIZE}..={MAX_CHUNK_SIZE}"
        ))
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> ContainerHeader {
        ContainerHeader {
            version: FORMAT_VERSION,
            salt: [0x11; SALT_SIZE],
            nonce: [0x22; NONCE_SIZE],
            kdf: KdfParams {
                mem_cost_kib: 1024,
                time_cost: 2,
                parallelism: 1,
            },
            chunk_size: 4096,
        }
    }

    #[test]
    fn test_header_len() {
        assert_eq!(HEADER_LEN, 45);
    }

    #[test]
    fn test_write_then_read() {
        let header = sample_header();
        let bytes = write_header(&header);
        assert_eq!(read_header(&bytes).unwrap(), header);
    }

    #[test]
    fn test_field_layout() {
        let bytes = write_header(&sample_header());

        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..17], &[0x11; 16]);
        assert_eq!(&bytes[17..29], &[0x22; 12]);
        assert_eq!(&bytes[29..33], &2u32.to_le_bytes());
        assert_eq!(&bytes[33..37], &1024u32.to_le_bytes());
        assert_eq!(&bytes[37..41], &1u32.to_le_bytes());
        assert_eq!(&bytes[41..45], &4096u32.to_le_bytes());
    }

    #[test]
    fn test_empty_input_is_format_error() {
        assert!(matches!(read_header(&[]), Err(CryptoError::Format(_))));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = write_header(&sample_header());
        for len in 1..HEADER_LEN {
            assert!(
                matches!(read_header(&bytes[..len]), Err(CryptoError::Format(_))),
                "{len}-byte header must be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_version() {
        let mut bytes = write_header(&sample_header());
        bytes[0] = 2;
        assert!(matches!(
            read_header(&bytes),
            Err(CryptoError::UnsupportedVersion(2))
        ));

        // A lone unknown version byte is still a version problem
        assert!(matches!(
            read_header(&[0xFF]),
            Err(CryptoError::UnsupportedVersion(0xFF))
        ));
    }

    #[test]
    fn test_out_of_range_kdf_params() {
        let mut header = sample_header();
        header.kdf.mem_cost_kib = u32::MAX;
        let bytes = write_header(&header);
        assert!(matches!(read_header(&bytes), Err(CryptoError::Format(_))));

        let mut header = sample_header();
        header.kdf.parallelism = 0;
        let bytes = write_header(&header);
        assert!(matches!(read_header(&bytes), Err(CryptoError::Format(_))));
    }

    #[test]
    fn test_out_of_range_chunk_size() {
        for chunk_size in [0, MIN_CHUNK_SIZE - 1, MAX_CHUNK_SIZE + 1] {
            let mut header = sample_header();
            header.chunk_size = chunk_size;
            let bytes = write_header(&header);
            assert!(matches!(read_header(&bytes), Err(CryptoError::Format(_))));
        }
    }

    #[test]
    fn test_read_from_stream_leaves_body() {
        let header = sample_header();
        let mut data = write_header(&header).to_vec();
        data.extend_from_slice(b"body");

        let mut reader = data.as_slice();
        let (parsed, raw) = ContainerHeader::read_from(&mut reader).unwrap();

        assert_eq!(parsed, header);
        assert_eq!(raw, write_header(&header));
        assert_eq!(reader, b"body");
    }

    #[test]
    fn test_read_from_short_stream() {
        let bytes = write_header(&sample_header());
        let mut reader = &bytes[..20];
        assert!(matches!(
            ContainerHeader::read_from(&mut reader),
            Err(CryptoError::Format(_))
        ));
    }

    #[test]
    fn test_generate_is_random() {
        let a = ContainerHeader::generate(KdfParams::default(), 4096);
        let b = ContainerHeader::generate(KdfParams::default(), 4096);

        assert_eq!(a.version, FORMAT_VERSION);
        assert_ne!(a.salt, b.salt, "salts must be fresh per container");
        assert_ne!(a.nonce, b.nonce, "nonces must be fresh per container");
    }
}
