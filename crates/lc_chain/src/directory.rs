//! ConversationDirectory: pairwise dedup and conversation factory.
//!
//! Conversations are keyed by the order-independent pair key of the two
//! resolved owners, so at most one exists per unordered pair.

use std::collections::{BTreeMap, HashMap};

use lc_crypto::Address;
use lc_proto::ConversationId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::ConversationLedger;
use crate::error::LedgerError;
use crate::registry::IdentityRegistry;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationDirectory {
    conversations: BTreeMap<ConversationId, ConversationLedger>,
    /// owner → conversations, in creation order.
    by_owner: HashMap<Address, Vec<ConversationId>>,
}

impl ConversationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_conversation(
        &mut self,
        registry: &IdentityRegistry,
        caller: Address,
        other: Address,
        now: i64,
    ) -> Result<ConversationId, LedgerError> {
        if other.is_zero() {
            return Err(LedgerError::Validation("counterpart is the zero address".into()));
        }
        let me = registry.resolve_to_owner(&caller).ok_or_else(|| {
            LedgerError::Authorization(format!("{caller} has no profile and is not a delegate"))
        })?;
        let them = registry
            .resolve_to_owner(&other)
            .ok_or_else(|| LedgerError::Validation(format!("{other} has no profile")))?;
        if me == them {
            return Err(LedgerError::Validation("cannot open a conversation with yourself".into()));
        }

        let id = ConversationId::for_pair(&me, &them);
        if self.conversations.contains_key(&id) {
            return Err(LedgerError::Conflict(format!(
                "conversation {id} already exists for {me} and {them}"
            )));
        }

        self.conversations.insert(id, ConversationLedger::new(me, them, now));
        self.by_owner.entry(me).or_default().push(id);
        self.by_owner.entry(them).or_default().push(id);
        debug!(conversation = %id, a = %me, b = %them, "conversation created");
        Ok(id)
    }

    /// Symmetric lookup. Each side is resolved through the registry first, so
    /// a delegate address finds its owner's conversation.
    pub fn get_conversation(
        &self,
        registry: &IdentityRegistry,
        a: &Address,
        b: &Address,
    ) -> Option<ConversationId> {
        let a = registry.resolve_to_owner(a).unwrap_or(*a);
        let b = registry.resolve_to_owner(b).unwrap_or(*b);
        let id = ConversationId::for_pair(&a, &b);
        self.conversations.contains_key(&id).then_some(id)
    }

    pub fn conversation_exists(&self, registry: &IdentityRegistry, a: &Address, b: &Address) -> bool {
        self.get_conversation(registry, a, b).is_some()
    }

    pub fn get_conversations(&self, registry: &IdentityRegistry, user: &Address) -> Vec<ConversationId> {
        let owner = registry.resolve_to_owner(user).unwrap_or(*user);
        self.by_owner.get(&owner).cloned().unwrap_or_default()
    }

    pub fn ledger(&self, id: &ConversationId) -> Result<&ConversationLedger, LedgerError> {
        self.conversations
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(format!("conversation {id}")))
    }

    pub fn ledger_mut(&mut self, id: &ConversationId) -> Result<&mut ConversationLedger, LedgerError> {
        self.conversations
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(format!("conversation {id}")))
    }

    /// Every conversation, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &ConversationLedger> {
        self.conversations.values()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
