//! LedgerState: the complete ledger as one serializable value, plus the
//! transaction execution rules.
//!
//! Execution order for one transaction:
//!   1. signature / signer check      → rejected, not included
//!   2. nonce == next nonce           → rejected, not included
//!   3. balance >= fee                → rejected, not included
//!   4. consume nonce, charge fee, open block
//!   5. execute call                  → Success, or Reverted with state untouched
//!
//! Every call validates before mutating, so a failed call leaves nothing
//! behind and no rollback copy is needed.

use std::collections::HashMap;

use lc_crypto::Address;
use lc_proto::{Call, CallOutput, ConversationId, Receipt, SignedTransaction, TxStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conversation::ConversationLedger;
use crate::directory::ConversationDirectory;
use crate::error::LedgerError;
use crate::registry::IdentityRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub address: Address,
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Flat fee charged to `from` for every included transaction.
    pub tx_fee: u64,
    pub genesis: Vec<GenesisAllocation>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { tx_fee: 1, genesis: Vec::new() }
    }
}

impl ChainConfig {
    pub fn with_allocation(mut self, address: Address, balance: u64) -> Self {
        self.genesis.push(GenesisAllocation { address, balance });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    config: ChainConfig,
    registry: IdentityRegistry,
    directory: ConversationDirectory,
    balances: HashMap<Address, u64>,
    nonces: HashMap<Address, u64>,
    height: u64,
    last_timestamp: i64,
}

impl LedgerState {
    pub fn genesis(config: ChainConfig) -> Self {
        let mut balances = HashMap::new();
        for alloc in &config.genesis {
            *balances.entry(alloc.address).or_insert(0) += alloc.balance;
        }
        Self {
            config,
            registry: IdentityRegistry::new(),
            directory: ConversationDirectory::new(),
            balances,
            nonces: HashMap::new(),
            height: 0,
            last_timestamp: 0,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &ConversationDirectory {
        &self.directory
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn balance(&self, addr: &Address) -> u64 {
        self.balances.get(addr).copied().unwrap_or(0)
    }

    /// Nonce the next transaction from `addr` must carry.
    pub fn next_nonce(&self, addr: &Address) -> u64 {
        self.nonces.get(addr).copied().unwrap_or(0)
    }

    pub fn conversation(&self, id: &ConversationId) -> Result<&ConversationLedger, LedgerError> {
        self.directory.ledger(id)
    }

    /// Conversation between two addresses, each resolved to its owner.
    pub fn conversation_between(&self, a: &Address, b: &Address) -> Option<&ConversationLedger> {
        let id = self.directory.get_conversation(&self.registry, a, b)?;
        self.directory.ledger(&id).ok()
    }

    // ── Execution ────────────────────────────────────────────────────────────

    /// Apply one signed transaction as its own block.
    ///
    /// `Err` means the transaction was rejected before inclusion and the
    /// state is unchanged. `Ok` always carries a receipt, which may record a
    /// revert.
    pub fn apply(&mut self, stx: &SignedTransaction, now: i64) -> Result<Receipt, LedgerError> {
        stx.verify()
            .map_err(|e| LedgerError::InvalidSignature(e.to_string()))?;
        let tx_hash = stx
            .hash()
            .map_err(LedgerError::encoding)?;
        let from = stx.tx.from;

        let expected = self.next_nonce(&from);
        if stx.tx.nonce != expected {
            return Err(LedgerError::InvalidNonce(format!(
                "{from} sent nonce {}, expected {expected}",
                stx.tx.nonce
            )));
        }

        let fee = self.config.tx_fee;
        let balance = self.balance(&from);
        if balance < fee {
            return Err(LedgerError::InsufficientFunds(format!(
                "{from} has {balance}, fee is {fee}"
            )));
        }

        self.nonces.insert(from, expected + 1);
        self.balances.insert(from, balance - fee);
        self.height += 1;
        // Block timestamps never go backwards even if the wall clock does.
        let timestamp = now.max(self.last_timestamp);
        self.last_timestamp = timestamp;

        let (status, output) = match self.execute(from, &stx.tx.call, timestamp) {
            Ok(output) => {
                debug!(
                    height = self.height,
                    tx = %tx_hash,
                    from = %from,
                    call = stx.tx.call.name(),
                    "transaction applied"
                );
                (TxStatus::Success, output)
            }
            Err(err) => {
                warn!(
                    height = self.height,
                    tx = %tx_hash,
                    from = %from,
                    call = stx.tx.call.name(),
                    error = %err,
                    "transaction reverted"
                );
                (
                    TxStatus::Reverted { kind: err.kind(), reason: err.reason() },
                    CallOutput::None,
                )
            }
        };

        Ok(Receipt {
            tx_hash,
            height: self.height,
            timestamp,
            from,
            fee,
            status,
            output,
        })
    }

    fn execute(&mut self, from: Address, call: &Call, now: i64) -> Result<CallOutput, LedgerError> {
        match call {
            Call::CreateProfile { display_name, bio } => {
                self.registry.create_profile(from, display_name, bio, now)?
            }
            Call::CreateDefaultProfile => self.registry.create_default_profile(from, now)?,
            Call::SetDisplayName { display_name } => self.registry.set_display_name(from, display_name)?,
            Call::SetBio { bio } => self.registry.set_bio(from, bio)?,
            Call::AddLink { name, url } => self.registry.add_link(from, name, url)?,
            Call::RemoveLink { index } => self.registry.remove_link(from, *index as usize)?,
            Call::ClearLinks => self.registry.clear_links(from)?,
            Call::AddDelegate { delegate } => self.registry.add_delegate(from, *delegate)?,
            Call::RemoveDelegate { delegate } => self.registry.remove_delegate(from, *delegate)?,
            Call::SetSessionPublicKey { key } => self.registry.set_session_public_key(from, key)?,
            Call::ClearSessionPublicKey => self.registry.clear_session_public_key(from)?,
            Call::TransferProfileOwnership { new_owner } => {
                self.registry.transfer_profile_ownership(from, *new_owner)?
            }
            Call::CreateConversation { other } => {
                let id = self
                    .directory
                    .create_conversation(&self.registry, from, *other, now)?;
                return Ok(CallOutput::Conversation { id });
            }
            Call::PostMessage { conversation, ciphertext } => {
                let ledger = self.directory.ledger_mut(conversation)?;
                let index = ledger.post_message(&self.registry, from, ciphertext, now)?;
                return Ok(CallOutput::MessageIndex { index });
            }
            Call::Transfer { to, amount } => self.transfer(from, *to, *amount)?,
        }
        Ok(CallOutput::None)
    }

    fn transfer(&mut self, from: Address, to: Address, amount: u64) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::Validation("cannot transfer to the zero address".into()));
        }
        if to == from {
            return Err(LedgerError::Validation("cannot transfer to self".into()));
        }
        if amount == 0 {
            return Err(LedgerError::Validation("transfer amount must be positive".into()));
        }
        let available = self.balance(&from);
        if available < amount {
            return Err(LedgerError::InsufficientFunds(format!(
                "{from} has {available}, tried to send {amount}"
            )));
        }
        let credited = self.balance(&to).checked_add(amount).ok_or_else(|| {
            LedgerError::Validation(format!("balance of {to} would overflow"))
        })?;
        self.balances.insert(from, available - amount);
        self.balances.insert(to, credited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_crypto::AccountKey;
    use lc_proto::{ErrorKind, Transaction};

    struct Actor {
        key: AccountKey,
        nonce: u64,
    }

    impl Actor {
        fn new() -> Self {
            Self { key: AccountKey::generate(), nonce: 0 }
        }

        fn addr(&self) -> Address {
            self.key.address()
        }

        fn sign(&mut self, call: Call) -> SignedTransaction {
            let tx = Transaction { from: self.addr(), nonce: self.nonce, call };
            self.nonce += 1;
            tx.sign(&self.key).unwrap()
        }
    }

    fn funded(actors: &[&Actor]) -> LedgerState {
        let mut cfg = ChainConfig::default();
        for a in actors {
            cfg = cfg.with_allocation(a.addr(), 100);
        }
        LedgerState::genesis(cfg)
    }

    #[test]
    fn success_charges_fee_and_bumps_nonce() {
        let mut alice = Actor::new();
        let mut state = funded(&[&alice]);
        let r = state
            .apply(&alice.sign(Call::CreateDefaultProfile), 1_000)
            .unwrap();
        assert!(r.succeeded());
        assert_eq!(r.height, 1);
        assert_eq!(r.fee, 1);
        assert_eq!(state.balance(&alice.addr()), 99);
        assert_eq!(state.next_nonce(&alice.addr()), 1);
        assert!(state.registry().has_profile(&alice.addr()));
    }

    #[test]
    fn revert_consumes_nonce_and_fee_only() {
        let mut alice = Actor::new();
        let mut state = funded(&[&alice]);
        let r = state
            .apply(&alice.sign(Call::SetBio { bio: "no profile yet".into() }), 1)
            .unwrap();
        assert!(!r.succeeded());
        assert!(matches!(
            r.status,
            TxStatus::Reverted { kind: ErrorKind::Authorization, .. }
        ));
        assert_eq!(state.next_nonce(&alice.addr()), 1);
        assert_eq!(state.balance(&alice.addr()), 99);
        assert!(!state.registry().has_profile(&alice.addr()));
    }

    #[test]
    fn wrong_nonce_is_not_included() {
        let mut alice = Actor::new();
        let mut state = funded(&[&alice]);
        alice.nonce = 5;
        let err = state.apply(&alice.sign(Call::CreateDefaultProfile), 1).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidNonce(_)));
        assert_eq!(state.height(), 0);
        assert_eq!(state.balance(&alice.addr()), 100);
    }

    #[test]
    fn unfunded_sender_is_not_included() {
        let mut broke = Actor::new();
        let mut state = LedgerState::genesis(ChainConfig::default());
        let err = state.apply(&broke.sign(Call::CreateDefaultProfile), 1).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds(_)));
        assert_eq!(state.next_nonce(&broke.addr()), 0);
    }

    #[test]
    fn forged_signer_rejected() {
        let alice = Actor::new();
        let mallory = AccountKey::generate();
        let mut state = funded(&[&alice]);
        let tx = Transaction { from: alice.addr(), nonce: 0, call: Call::CreateDefaultProfile };
        let forged = tx.sign(&mallory).unwrap();
        assert!(matches!(state.apply(&forged, 1), Err(LedgerError::InvalidSignature(_))));
    }

    #[test]
    fn transfer_moves_balance() {
        let mut alice = Actor::new();
        let bob = Actor::new();
        let mut state = funded(&[&alice]);
        let r = state
            .apply(&alice.sign(Call::Transfer { to: bob.addr(), amount: 40 }), 1)
            .unwrap();
        assert!(r.succeeded());
        assert_eq!(state.balance(&alice.addr()), 59);
        assert_eq!(state.balance(&bob.addr()), 40);

        let r = state
            .apply(&alice.sign(Call::Transfer { to: bob.addr(), amount: 1_000 }), 2)
            .unwrap();
        assert!(matches!(
            r.status,
            TxStatus::Reverted { kind: ErrorKind::InsufficientFunds, .. }
        ));
        assert_eq!(state.balance(&bob.addr()), 40);
    }

    #[test]
    fn conversation_and_post_outputs() {
        let mut alice = Actor::new();
        let mut bob = Actor::new();
        let mut state = funded(&[&alice, &bob]);
        state.apply(&alice.sign(Call::CreateDefaultProfile), 1).unwrap();
        state.apply(&bob.sign(Call::CreateDefaultProfile), 1).unwrap();

        let r = state
            .apply(&alice.sign(Call::CreateConversation { other: bob.addr() }), 2)
            .unwrap();
        let id = match r.output {
            CallOutput::Conversation { id } => id,
            other => panic!("unexpected output {other:?}"),
        };

        let dup = state
            .apply(&bob.sign(Call::CreateConversation { other: alice.addr() }), 3)
            .unwrap();
        assert!(matches!(dup.status, TxStatus::Reverted { kind: ErrorKind::Conflict, .. }));

        let r = state
            .apply(
                &bob.sign(Call::PostMessage { conversation: id, ciphertext: vec![1, 2, 3] }),
                4,
            )
            .unwrap();
        assert_eq!(r.output, CallOutput::MessageIndex { index: 0 });
        let conv = state.conversation_between(&alice.addr(), &bob.addr()).unwrap();
        assert_eq!(conv.get_message(0).unwrap().timestamp, 4);
    }

    #[test]
    fn timestamps_are_monotonic() {
        let mut alice = Actor::new();
        let mut state = funded(&[&alice]);
        let a = state.apply(&alice.sign(Call::CreateDefaultProfile), 50).unwrap();
        let b = state.apply(&alice.sign(Call::SetBio { bio: "x".into() }), 40).unwrap();
        assert_eq!(a.timestamp, 50);
        assert_eq!(b.timestamp, 50);
    }

    #[test]
    fn snapshot_round_trip_preserves_state() {
        let mut alice = Actor::new();
        let mut state = funded(&[&alice]);
        state.apply(&alice.sign(Call::CreateDefaultProfile), 1).unwrap();
        state
            .apply(&alice.sign(Call::AddLink { name: "site".into(), url: "https://a".into() }), 2)
            .unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let restored: LedgerState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.height(), 2);
        assert_eq!(restored.next_nonce(&alice.addr()), 2);
        assert_eq!(
            restored.registry().get_profile(&alice.addr()).unwrap(),
            state.registry().get_profile(&alice.addr()).unwrap()
        );
    }
}
