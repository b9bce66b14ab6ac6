//! BLAKE3 running digest over a conversation's append-only record log.
//!
//! Each appended record commits to the previous head:
//!
//!   H_i = BLAKE3(H_{i-1} || index || owner || sender || ciphertext_hash || timestamp)
//!
//! The ledger publishes the head with the conversation; a client that fetched
//! the full history can recompute it and detect modification, insertion or
//! reordering by whoever served the records.

use serde::{Deserialize, Serialize};

use crate::account::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashChain {
    /// Current head. Starts at all zeros.
    #[serde(with = "hex_32")]
    pub head: [u8; 32],
    pub length: u64,
}

impl Default for HashChain {
    fn default() -> Self {
        Self::new()
    }
}

/// One link's inputs.
#[derive(Debug, Clone, Copy)]
pub struct LinkInput<'a> {
    pub index: u64,
    /// Profile owner the record is attributed to.
    pub owner: &'a Address,
    /// Literal signer.
    pub sender: &'a Address,
    pub ciphertext: &'a [u8],
    pub timestamp: i64,
}

impl HashChain {
    pub fn new() -> Self {
        Self { head: [0u8; 32], length: 0 }
    }

    /// Append a link and return the new head.
    pub fn append(&mut self, link: LinkInput<'_>) -> [u8; 32] {
        self.head = compute_link(&self.head, link);
        self.length += 1;
        self.head
    }

    /// Recompute the head of a full history and compare it with `expected`.
    pub fn verify<'a, I>(links: I, expected: &[u8; 32]) -> Result<(), HashChainError>
    where
        I: IntoIterator<Item = LinkInput<'a>>,
    {
        let mut chain = HashChain::new();
        for (position, link) in links.into_iter().enumerate() {
            if link.index != position as u64 {
                return Err(HashChainError::Gap { position, index: link.index });
            }
            chain.append(link);
        }
        if constant_time_eq(&chain.head, expected) {
            Ok(())
        } else {
            Err(HashChainError::HeadMismatch {
                expected: hex::encode(expected),
                actual: hex::encode(chain.head),
            })
        }
    }
}

fn compute_link(prev: &[u8; 32], link: LinkInput<'_>) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"lc-chain-v1\x00");
    hasher.update(prev);
    hasher.update(&link.index.to_le_bytes());
    hasher.update(link.owner.as_bytes());
    hasher.update(link.sender.as_bytes());
    hasher.update(blake3::hash(link.ciphertext).as_bytes());
    hasher.update(&link.timestamp.to_le_bytes());
    hasher.finalize().into()
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[derive(Debug, thiserror::Error)]
pub enum HashChainError {
    #[error("record at position {position} carries index {index}")]
    Gap { position: usize, index: u64 },
    #[error("history does not match published head: expected {expected}, got {actual}")]
    HeadMismatch { expected: String, actual: String },
}

mod hex_32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link<'a>(index: u64, sender: &'a Address, ct: &'a [u8]) -> LinkInput<'a> {
        LinkInput { index, owner: sender, sender, ciphertext: ct, timestamp: 1_700_000_000 + index as i64 }
    }

    #[test]
    fn verify_full_history() {
        let a = Address([1u8; 20]);
        let mut chain = HashChain::new();
        chain.append(link(0, &a, b"ct-0"));
        chain.append(link(1, &a, b"ct-1"));
        assert_eq!(chain.length, 2);

        let history = [link(0, &a, b"ct-0"), link(1, &a, b"ct-1")];
        assert!(HashChain::verify(history, &chain.head).is_ok());
    }

    #[test]
    fn detects_tampered_ciphertext() {
        let a = Address([1u8; 20]);
        let mut chain = HashChain::new();
        chain.append(link(0, &a, b"original"));
        let history = [link(0, &a, b"TAMPERED")];
        assert!(matches!(
            HashChain::verify(history, &chain.head),
            Err(HashChainError::HeadMismatch { .. })
        ));
    }

    #[test]
    fn detects_dropped_record() {
        let a = Address([1u8; 20]);
        let mut chain = HashChain::new();
        chain.append(link(0, &a, b"ct-0"));
        chain.append(link(1, &a, b"ct-1"));
        let history = [link(1, &a, b"ct-1")];
        assert!(matches!(
            HashChain::verify(history, &chain.head),
            Err(HashChainError::Gap { position: 0, index: 1 })
        ));
    }

    #[test]
    fn detects_reattributed_record() {
        let (owner, delegate, other) = (Address([1u8; 20]), Address([9u8; 20]), Address([2u8; 20]));
        let mut chain = HashChain::new();
        chain.append(LinkInput { owner: &owner, ..link(0, &delegate, b"ct-0") });
        let history = [LinkInput { owner: &other, ..link(0, &delegate, b"ct-0") }];
        assert!(matches!(
            HashChain::verify(history, &chain.head),
            Err(HashChainError::HeadMismatch { .. })
        ));
    }
}
