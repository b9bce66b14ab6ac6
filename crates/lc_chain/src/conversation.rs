//! ConversationLedger: one append-only encrypted message log per pair.
//!
//! Writes resolve the signer through the registry so that a delegate's post
//! is attributed to its owner. Reads are not gated; the records are
//! ciphertext.

use lc_crypto::hash_chain::{HashChain, HashChainError, LinkInput};
use lc_crypto::Address;
use lc_proto::{limits, ConversationId, ConversationInfo, EncryptedMessage};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::registry::IdentityRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLedger {
    id: ConversationId,
    participants: [Address; 2],
    created_at: i64,
    messages: Vec<EncryptedMessage>,
    chain: HashChain,
}

impl ConversationLedger {
    /// Participants are stored sorted so the record is independent of which
    /// side created it.
    pub fn new(a: Address, b: Address, created_at: i64) -> Self {
        let participants = if a <= b { [a, b] } else { [b, a] };
        Self {
            id: ConversationId::for_pair(&a, &b),
            participants,
            created_at,
            messages: Vec::new(),
            chain: HashChain::new(),
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn participants(&self) -> [Address; 2] {
        self.participants
    }

    /// Append `ciphertext` on behalf of whichever owner `caller` resolves to.
    pub fn post_message(
        &mut self,
        registry: &IdentityRegistry,
        caller: Address,
        ciphertext: &[u8],
        now: i64,
    ) -> Result<u64, LedgerError> {
        limits::check_ciphertext(ciphertext)?;
        let owner = registry.resolve_to_owner(&caller).ok_or_else(|| {
            LedgerError::Authorization(format!("{caller} has no profile and is not a delegate"))
        })?;
        if !self.participants.contains(&owner) {
            return Err(LedgerError::Authorization(format!(
                "{owner} is not a participant of conversation {}",
                self.id
            )));
        }

        let index = self.messages.len() as u64;
        self.chain.append(LinkInput {
            index,
            owner: &owner,
            sender: &caller,
            ciphertext,
            timestamp: now,
        });
        self.messages.push(EncryptedMessage {
            index,
            sender_owner: owner,
            sender_address: caller,
            ciphertext: ciphertext.to_vec(),
            timestamp: now,
        });
        Ok(index)
    }

    pub fn get_message(&self, index: u64) -> Result<&EncryptedMessage, LedgerError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.messages.get(i))
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "message {index} (conversation has {})",
                    self.messages.len()
                ))
            })
    }

    /// Clamped range read. An out-of-range start yields an empty vector.
    pub fn get_messages(&self, start: u64, count: u64) -> Vec<EncryptedMessage> {
        let len = self.messages.len();
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(len);
        let end = start.saturating_add(usize::try_from(count).unwrap_or(usize::MAX)).min(len);
        self.messages[start..end].to_vec()
    }

    /// The last `n` messages in ledger order.
    pub fn get_latest_messages(&self, n: u64) -> Vec<EncryptedMessage> {
        let len = self.messages.len();
        let n = usize::try_from(n).unwrap_or(usize::MAX).min(len);
        self.messages[len - n..].to_vec()
    }

    pub fn get_message_count(&self) -> u64 {
        self.messages.len() as u64
    }

    /// Same resolution as posting. Exposed for callers that want to gate
    /// their own reads.
    pub fn is_participant(&self, registry: &IdentityRegistry, addr: &Address) -> bool {
        registry
            .resolve_to_owner(addr)
            .map_or(false, |owner| self.participants.contains(&owner))
    }

    pub fn info(&self) -> ConversationInfo {
        ConversationInfo {
            id: self.id,
            participants: self.participants,
            message_count: self.get_message_count(),
            created_at: self.created_at,
            head: hex::encode(self.chain.head),
        }
    }
}

/// Recompute the running digest over a full fetched history and compare it
/// with the head the ledger published.
pub fn verify_records(
    info: &ConversationInfo,
    records: &[EncryptedMessage],
) -> Result<(), HashChainError> {
    let mut expected = [0u8; 32];
    hex::decode_to_slice(&info.head, &mut expected).map_err(|_| HashChainError::HeadMismatch {
        expected: info.head.clone(),
        actual: "<unparseable head>".into(),
    })?;
    HashChain::verify(
        records.iter().map(|m| LinkInput {
            index: m.index,
            owner: &m.sender_owner,
            sender: &m.sender_address,
            ciphertext: &m.ciphertext,
            timestamp: m.timestamp,
        }),
        &expected,
    )
}
