//! BLAKE3-based hash utilities
//!
//! - Order-independent pair keys for two-party conversations
//! - Transaction hashes

use crate::account::Address;

/// Order-independent key for an unordered pair of identities.
///
/// The two addresses are sorted before hashing, so
/// `pair_key(a, b) == pair_key(b, a)` for all `a`, `b`.
pub fn pair_key(a: &Address, b: &Address) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"lc-pair-v1\x00");
    hasher.update(lo.as_bytes());
    hasher.update(hi.as_bytes());
    hasher.finalize().into()
}

/// Hash of a transaction's canonical bytes.
pub fn tx_hash(canonical: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"lc-tx-v1\x00");
    hasher.update(canonical);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_symmetric() {
        let a = Address([1u8; 20]);
        let b = Address([2u8; 20]);
        assert_eq!(pair_key(&a, &b), pair_key(&b, &a));
        assert_ne!(pair_key(&a, &b), pair_key(&a, &Address([3u8; 20])));
    }
}
