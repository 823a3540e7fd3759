// SPDX-License-Identifier: Apache-2.0

//! Deterministic key hashing for shard routing.

use sha2::{Digest, Sha256};

/// Hash a trace key to a routing integer.
///
/// Takes the first four bytes of `sha256(key)` as a big-endian `u32`;
/// stable across processes and platforms, so every replay shard makes the
/// same accept/skip decision for a given key.
#[must_use]
pub fn key_shard_hash(key: &str) -> u32 {
    let digest = Sha256::digest(key.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(key_shard_hash("user1234"), key_shard_hash("user1234"));
        assert_ne!(key_shard_hash("user1234"), key_shard_hash("user1235"));
    }

    #[test]
    fn hash_matches_sha256_prefix() {
        // sha256("abc") = ba7816bf...
        assert_eq!(key_shard_hash("abc"), 0xba7816bf);
    }
}
