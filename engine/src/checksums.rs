//! Checksum computation for copy verification.
//!
//! Verification uses SHA-256. Files are streamed through the digest using
//! the run's configured buffer size, so memory use is bounded by
//! `EngineConfig::buffer_size` regardless of file size.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// A computed SHA-256 digest, stored as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    hex: String,
}

impl ChecksumValue {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        ChecksumValue { hex: hex.into() }
    }

    /// Get the hex string representation
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.hex)
    }
}

/// Incremental SHA-256 hasher
#[derive(Default)]
pub struct Sha256Hasher {
    hasher: Sha256,
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> ChecksumValue {
        ChecksumValue::from_hex(format!("{:x}", self.hasher.finalize()))
    }
}

/// Stream a reader through SHA-256 in `buffer_size` chunks.
pub fn compute_reader_checksum<R: Read>(reader: &mut R, buffer_size: usize) -> io::Result<ChecksumValue> {
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut hasher = Sha256Hasher::new();
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(hasher.finalize())
}

/// Compute the SHA-256 checksum of a file.
pub fn compute_file_checksum(path: &Path, buffer_size: usize) -> io::Result<ChecksumValue> {
    let mut file = File::open(path)?;
    compute_reader_checksum(&mut file, buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_sha256_hasher() {
        let mut hasher = Sha256Hasher::new();
        hasher.update(b"hello");
        let checksum = hasher.finalize();
        assert_eq!(
            checksum.hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_chunking_does_not_change_digest() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let one = compute_reader_checksum(&mut &data[..], 1).expect("hash with 1-byte buffer");
        let big = compute_reader_checksum(&mut &data[..], 4096).expect("hash with big buffer");
        assert_eq!(one, big);
    }

    #[test]
    fn test_file_checksum_matches_in_memory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("data.bin");
        fs::write(&path, b"hello").expect("Failed to write file");

        let checksum = compute_file_checksum(&path, 2).expect("Failed to hash file");
        assert_eq!(
            checksum.hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(checksum.to_string().starts_with("sha256:"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = compute_file_checksum(&temp_dir.path().join("nope"), 16);
        assert!(result.is_err());
    }
}
