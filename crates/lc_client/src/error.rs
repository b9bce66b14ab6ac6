use lc_chain::LedgerError;
use lc_crypto::{Address, CryptoError};
use lc_store::{DelegateState, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Keystore error: {0}")]
    Store(#[from] StoreError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The counterpart never published a session key. Prompt key setup
    /// instead of treating the conversation as empty.
    #[error("{0} has not published a session key")]
    NoSessionKey(Address),

    #[error("No local session key for {0}; run key setup first")]
    NoLocalSessionKey(Address),

    /// Authentication failed: tampered ciphertext, or a stale or mismatched key.
    #[error("Cannot decrypt message")]
    CannotDecrypt,

    #[error("Delegate is {actual}, operation requires {expected}")]
    InvalidDelegateState { expected: &'static str, actual: String },

    #[error("No delegate wallet for {0}")]
    NoDelegate(Address),

    #[error("No conversation between {0} and {1}")]
    NoConversation(Address, Address),

    #[error("Unexpected call output: {0}")]
    UnexpectedOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

impl ClientError {
    pub(crate) fn delegate_state(expected: &'static str, actual: Option<DelegateState>) -> Self {
        ClientError::InvalidDelegateState {
            expected,
            actual: actual.map_or_else(|| "unset".to_string(), |s| s.to_string()),
        }
    }
}
