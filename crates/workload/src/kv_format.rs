// SPDX-License-Identifier: Apache-2.0

//! Deterministic fixed-width encoding of key offsets into keys and values.
//!
//! Layout of a key of size `key_size`:
//! `K<offset, zero-filled><s><key_size, zero-filled><E pad...><Y>`;
//! values use `V`/`A` pad/`L` with `val_size`. Both embed the offset and
//! the declared size, so a fetched value can be checked against its key
//! without any side state.

use crate::error::Error;
use rand::Rng;
use rand::RngCore;

/// Precomputed field widths for one `(key_size, val_size)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvFormat {
    /// Total key length in bytes.
    pub key_size: usize,
    /// Total value length in bytes.
    pub val_size: usize,
    size_len: usize,
    offset_len: usize,
    k_pad_len: usize,
    v_pad_len: usize,
}

const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

impl KvFormat {
    /// Compute field widths; fails when the smaller of the two sizes
    /// cannot host the three structural bytes plus the size and offset
    /// fields.
    pub fn new(key_size: usize, val_size: usize) -> Result<Self, Error> {
        let size_len = decimal_len(key_size).max(decimal_len(val_size));
        let least_len_left = key_size.min(val_size) as isize - 3 - size_len as isize;
        if least_len_left <= 0 {
            return Err(Error::CodecTooNarrow { key_size, val_size });
        }
        // a u32 offset needs at most 10 digits
        let offset_len = (least_len_left as usize).min(10);
        let k_pad_len = key_size - 3 - size_len - offset_len;
        let v_pad_len = val_size - 3 - size_len - offset_len;
        Ok(Self {
            key_size,
            val_size,
            size_len,
            offset_len,
            k_pad_len,
            v_pad_len,
        })
    }

    /// Number of digits available for the offset field.
    #[must_use]
    pub const fn offset_len(&self) -> usize {
        self.offset_len
    }

    /// Encode a key for the given offset. Length is exactly `key_size`.
    #[must_use]
    pub fn make_key(&self, offset: u64) -> String {
        let k = format!(
            "K{offset:0ow$}s{ks:0sw$}{pad}Y",
            ow = self.offset_len,
            ks = self.key_size,
            sw = self.size_len,
            pad = "E".repeat(self.k_pad_len),
        );
        assert_eq!(k.len(), self.key_size, "offset {offset} overflows the key format");
        k
    }

    /// Encode the value for the given offset. Length is exactly `val_size`.
    #[must_use]
    pub fn make_val(&self, offset: u64) -> String {
        let v = format!(
            "V{offset:0ow$}s{vs:0sw$}{pad}L",
            ow = self.offset_len,
            vs = self.val_size,
            sw = self.size_len,
            pad = "A".repeat(self.v_pad_len),
        );
        assert_eq!(v.len(), self.val_size, "offset {offset} overflows the value format");
        v
    }

    /// Like [`Self::make_val`] but with a random alphanumeric pad, for
    /// workloads that must defeat value deduplication.
    #[must_use]
    pub fn make_val_rand(&self, offset: u64, rng: &mut dyn RngCore) -> String {
        let pad: String = (0..self.v_pad_len)
            .map(|_| ALNUM[rng.gen_range(0..ALNUM.len())] as char)
            .collect();
        let v = format!(
            "V{offset:0ow$}s{vs:0sw$}{pad}L",
            ow = self.offset_len,
            vs = self.val_size,
            sw = self.size_len,
        );
        assert_eq!(v.len(), self.val_size, "offset {offset} overflows the value format");
        v
    }

    /// Recover `(offset, declared_size)` from an encoded key or value.
    #[must_use]
    pub fn decode(&self, encoded: &str) -> Option<(u64, usize)> {
        let bytes = encoded.as_bytes();
        if bytes.len() < 2 + self.offset_len + self.size_len {
            return None;
        }
        let offset: u64 = encoded.get(1..1 + self.offset_len)?.parse().ok()?;
        let size_begin = 2 + self.offset_len;
        let size: usize = encoded.get(size_begin..size_begin + self.size_len)?.parse().ok()?;
        Some((offset, size))
    }
}

/// Quick containment check of a fetched value against its expectation.
///
/// May return false positives: long values are compared on their first 32
/// bytes only, and randomized-pad values are only length-checked.
#[must_use]
pub fn check_quick(expected: &str, actual: &str, use_rand: bool) -> bool {
    if expected.len() != actual.len() {
        return false;
    }
    if use_rand {
        return true;
    }
    if expected.len() <= 32 {
        return expected == actual;
    }
    expected.as_bytes()[..32] == actual.as_bytes()[..32]
}

fn decimal_len(v: usize) -> usize {
    v.to_string().len()
}
