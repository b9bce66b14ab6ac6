//! lc_chain: the shared append-only ledger behind LedgerChat.
//!
//! # Modules
//! - `registry`     : profiles, delegate graph, published session keys
//! - `directory`    : one conversation per unordered owner pair
//! - `conversation` : append-only encrypted message log per pair
//! - `state`        : balances, nonces, fees and transaction execution
//! - `chain`        : async sequencer that orders every write
//!
//! All state lives in one [`LedgerState`] value that components receive as
//! explicit arguments; there are no globals.

pub mod chain;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod registry;
pub mod state;

pub use chain::{Chain, PendingTransaction};
pub use conversation::{verify_records, ConversationLedger};
pub use directory::ConversationDirectory;
pub use error::LedgerError;
pub use registry::{IdentityRegistry, Profile};
pub use state::{ChainConfig, GenesisAllocation, LedgerState};
