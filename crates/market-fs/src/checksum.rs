//! SHA-256 checksum utilities
//!
//! Digests are rendered as lowercase hex. Registry metadata sometimes carries
//! a `sha256:` prefix or uppercase hex, so comparisons go through
//! [`checksums_match`].

use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Optional prefix accepted on expected checksums
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 digest of a byte slice as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Compute the SHA-256 digest of a file's contents as lowercase hex.
///
/// The file is streamed, so large archives are not held in memory.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Strip an optional `sha256:` prefix and surrounding whitespace, lowercased.
pub fn normalize(checksum: &str) -> String {
    let trimmed = checksum.trim();
    trimmed
        .strip_prefix(PREFIX)
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// Compare an expected checksum (possibly prefixed or uppercase) with an actual hex digest.
pub fn checksums_match(expected: &str, actual: &str) -> bool {
    normalize(expected) == normalize(actual)
}
