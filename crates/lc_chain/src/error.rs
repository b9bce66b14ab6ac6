use lc_crypto::CryptoError;
use lc_proto::{ErrorKind, LimitViolation};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid nonce: {0}")]
    InvalidNonce(String),

    #[error("Ledger sequencer is not running")]
    SequencerClosed,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::Authorization(_) => ErrorKind::Authorization,
            LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            LedgerError::InvalidSignature(_) => ErrorKind::InvalidSignature,
            LedgerError::InvalidNonce(_) => ErrorKind::InvalidNonce,
            LedgerError::SequencerClosed => ErrorKind::Unavailable,
        }
    }

    /// Rebuild the error carried by a reverted receipt.
    pub fn from_revert(kind: ErrorKind, reason: String) -> Self {
        match kind {
            ErrorKind::Validation => LedgerError::Validation(reason),
            ErrorKind::Authorization => LedgerError::Authorization(reason),
            ErrorKind::Conflict => LedgerError::Conflict(reason),
            ErrorKind::NotFound => LedgerError::NotFound(reason),
            ErrorKind::InsufficientFunds => LedgerError::InsufficientFunds(reason),
            ErrorKind::InvalidSignature => LedgerError::InvalidSignature(reason),
            ErrorKind::InvalidNonce => LedgerError::InvalidNonce(reason),
            ErrorKind::Unavailable => LedgerError::SequencerClosed,
        }
    }

    /// A transaction that cannot be serialised to its canonical bytes.
    pub fn encoding(e: CryptoError) -> Self {
        LedgerError::Validation(format!("transaction cannot be encoded: {e}"))
    }

    /// Message without the category prefix, as stored in receipts.
    pub fn reason(&self) -> String {
        match self {
            LedgerError::Validation(r)
            | LedgerError::Authorization(r)
            | LedgerError::Conflict(r)
            | LedgerError::NotFound(r)
            | LedgerError::InsufficientFunds(r)
            | LedgerError::InvalidSignature(r)
            | LedgerError::InvalidNonce(r) => r.clone(),
            LedgerError::SequencerClosed => "sequencer closed".into(),
        }
    }
}

impl From<LimitViolation> for LedgerError {
    fn from(v: LimitViolation) -> Self {
        LedgerError::Validation(v.to_string())
    }
}
