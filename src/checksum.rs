//! Structural checksum over walked path names
//!
//! Each visited path string is fed, in traversal order, into a SHA-512
//! digest. File contents are never read, so the checksum changes when paths
//! are added, removed or renamed, and stays the same when a message file is
//! rewritten in place.

use sha2::{Digest, Sha512};
use std::path::Path;

/// Length of the hex rendering of a finished checksum (512 bits)
pub const CHECKSUM_HEX_LEN: usize = 128;

/// Running SHA-512 digest over an ordered sequence of paths
#[derive(Debug, Clone, Default)]
pub struct StructuralChecksum {
    hasher: Sha512,
}

impl StructuralChecksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one path into the digest
    ///
    /// Paths are concatenated without a separator, so `a` followed by `bc`
    /// hashes the same as `ab` followed by `c`.
    pub fn update(&mut self, path: &Path) {
        self.hasher.update(path.as_os_str().as_encoded_bytes());
    }

    /// Finish the digest as a lowercase hex string
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA512: &str = "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
                                47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e";

    #[test]
    fn test_empty_checksum() {
        let hash = StructuralChecksum::new().finalize_hex();
        assert_eq!(hash, EMPTY_SHA512);
        assert_eq!(hash.len(), CHECKSUM_HEX_LEN);
    }

    #[test]
    fn test_known_vector() {
        let mut checksum = StructuralChecksum::new();
        checksum.update(Path::new("abc"));
        assert_eq!(
            checksum.finalize_hex(),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_order_sensitive() {
        let mut forward = StructuralChecksum::new();
        forward.update(Path::new("alice/cur"));
        forward.update(Path::new("alice/new"));

        let mut reverse = StructuralChecksum::new();
        reverse.update(Path::new("alice/new"));
        reverse.update(Path::new("alice/cur"));

        assert_ne!(forward.finalize_hex(), reverse.finalize_hex());
    }

    #[test]
    fn test_deterministic() {
        let paths = ["u/cur", "u/new", "u/new/1700000000.M1P2.host", "u/tmp"];
        let run = || {
            let mut checksum = StructuralChecksum::new();
            for p in paths {
                checksum.update(Path::new(p));
            }
            checksum.finalize_hex()
        };
        assert_eq!(run(), run());
    }
}
