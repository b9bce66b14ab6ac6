//! Conversation records stored on the ledger.

use std::fmt;
use std::str::FromStr;

use lc_crypto::{hash, Address};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Pair key of a two-party conversation. Derived by sorting both owners
/// before hashing, so it does not depend on who created the conversation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(pub [u8; 32]);

impl ConversationId {
    pub fn for_pair(a: &Address, b: &Address) -> Self {
        Self(hash::pair_key(a, b))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversationId({}…)", &self.to_hex()[..12])
    }
}

impl FromStr for ConversationId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}

impl Serialize for ConversationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One appended ciphertext. Immutable once on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    pub index: u64,
    /// Profile owner the signer resolved to.
    pub sender_owner: Address,
    /// Literal signer (the owner itself or one of its delegates).
    pub sender_address: Address,
    #[serde(with = "crate::hex_bytes")]
    pub ciphertext: Vec<u8>,
    /// Block timestamp (Unix seconds).
    pub timestamp: i64,
}

impl EncryptedMessage {
    /// Whether the message was signed by a delegate rather than the owner.
    pub fn via_delegate(&self) -> bool {
        self.sender_owner != self.sender_address
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub id: ConversationId,
    /// Fixed participants, sorted ascending.
    pub participants: [Address; 2],
    pub message_count: u64,
    pub created_at: i64,
    /// Running digest over every appended record (see `lc_crypto::hash_chain`).
    pub head: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_order_independent() {
        let a = Address([0xaa; 20]);
        let b = Address([0xbb; 20]);
        assert_eq!(ConversationId::for_pair(&a, &b), ConversationId::for_pair(&b, &a));
    }

    #[test]
    fn conversation_id_hex_parse() {
        let id = ConversationId::for_pair(&Address([1; 20]), &Address([2; 20]));
        assert_eq!(id.to_string().parse::<ConversationId>().unwrap(), id);
    }
}
