//! Ledger wire types for LedgerChat
//!
//! All ledger-facing types serialise to JSON. Byte payloads (ciphertexts,
//! keys, signatures) are hex strings; addresses are `0x`-prefixed hex.
//!
//! # Modules
//! - `tx`     : `Call`, `Transaction`, `SignedTransaction`, `Receipt`
//! - `profile`: profile and link records
//! - `message`: conversation ids and encrypted message records
//! - `limits` : size bounds shared by ledger and clients

pub mod hex_bytes;
pub mod limits;
pub mod message;
pub mod profile;
pub mod tx;

pub use limits::LimitViolation;
pub use message::{ConversationId, ConversationInfo, EncryptedMessage};
pub use profile::{Link, ProfileView};
pub use tx::{Call, CallOutput, ErrorKind, Receipt, SignedTransaction, Transaction, TxHash, TxStatus};
