//! Hashing utilities for segkv
//!
//! Records carry a hex-encoded SHA-1 digest of their value. The 40-char
//! hex width is part of the on-disk format; a different digest would be
//! format-breaking.

use sha1::{Digest, Sha1};

/// Width of a hex-encoded SHA-1 digest in bytes.
pub const HASH_HEX_LEN: usize = 40;

/// Compute the SHA-1 hash of data, return hex string
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_hex_width() {
        assert_eq!(sha1_hex(b"hello world").len(), HASH_HEX_LEN);
        assert_eq!(sha1_hex(b"").len(), HASH_HEX_LEN);
    }

    #[test]
    fn test_sha1_hex_known_vector() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_sha1_hex_deterministic() {
        assert_eq!(sha1_hex(b"some-value"), sha1_hex(b"some-value"));
        assert_ne!(sha1_hex(b"some-value"), sha1_hex(b"other-value"));
    }
}
