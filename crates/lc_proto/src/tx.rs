//! Ledger transactions and receipts.
//!
//! Every mutating operation is a [`Call`]. A [`Transaction`] binds a call to
//! its sender and nonce; the canonical JSON encoding of the transaction is
//! what gets signed and hashed.

use std::fmt;

use lc_crypto::{
    account::{self, AccountKey, PUBLIC_KEY_LEN, SIGNATURE_LEN},
    hash, Address, CryptoError,
};
use serde::{Deserialize, Serialize};

use crate::message::ConversationId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Call {
    CreateProfile { display_name: String, bio: String },
    CreateDefaultProfile,
    SetDisplayName { display_name: String },
    SetBio { bio: String },
    AddLink { name: String, url: String },
    RemoveLink { index: u32 },
    ClearLinks,
    AddDelegate { delegate: Address },
    RemoveDelegate { delegate: Address },
    SetSessionPublicKey {
        #[serde(with = "crate::hex_bytes")]
        key: Vec<u8>,
    },
    ClearSessionPublicKey,
    TransferProfileOwnership { new_owner: Address },
    CreateConversation { other: Address },
    PostMessage {
        conversation: ConversationId,
        #[serde(with = "crate::hex_bytes")]
        ciphertext: Vec<u8>,
    },
    Transfer { to: Address, amount: u64 },
}

impl Call {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Call::CreateProfile { .. } => "create_profile",
            Call::CreateDefaultProfile => "create_default_profile",
            Call::SetDisplayName { .. } => "set_display_name",
            Call::SetBio { .. } => "set_bio",
            Call::AddLink { .. } => "add_link",
            Call::RemoveLink { .. } => "remove_link",
            Call::ClearLinks => "clear_links",
            Call::AddDelegate { .. } => "add_delegate",
            Call::RemoveDelegate { .. } => "remove_delegate",
            Call::SetSessionPublicKey { .. } => "set_session_public_key",
            Call::ClearSessionPublicKey => "clear_session_public_key",
            Call::TransferProfileOwnership { .. } => "transfer_profile_ownership",
            Call::CreateConversation { .. } => "create_conversation",
            Call::PostMessage { .. } => "post_message",
            Call::Transfer { .. } => "transfer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub nonce: u64,
    pub call: Call,
}

impl Transaction {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn sign(self, key: &AccountKey) -> Result<SignedTransaction, CryptoError> {
        let bytes = self.canonical_bytes()?;
        let signature = key.sign(&bytes).to_vec();
        Ok(SignedTransaction {
            tx: self,
            public_key: key.public_key().to_vec(),
            signature,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash(0x{}…)", &hex::encode(self.0)[..12])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: Transaction,
    #[serde(with = "crate::hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "crate::hex_bytes")]
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    pub fn hash(&self) -> Result<TxHash, CryptoError> {
        Ok(TxHash(hash::tx_hash(&self.tx.canonical_bytes()?)))
    }

    /// Check that the signature verifies and that the public key owns `from`.
    pub fn verify(&self) -> Result<(), CryptoError> {
        let public: [u8; PUBLIC_KEY_LEN] = self
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("signer public key must be 64 bytes".into()))?;
        if self.signature.len() != SIGNATURE_LEN {
            return Err(CryptoError::SignatureVerification);
        }
        if Address::from_public_key(&public) != self.tx.from {
            return Err(CryptoError::InvalidAddress(format!(
                "public key does not belong to {}",
                self.tx.from
            )));
        }
        account::verify_signature(&public, &self.tx.canonical_bytes()?, &self.signature)
    }
}

/// Failure category of a rejected or reverted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    Conflict,
    NotFound,
    InsufficientFunds,
    InvalidSignature,
    InvalidNonce,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Success,
    Reverted { kind: ErrorKind, reason: String },
}

/// Value returned by a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "output", rename_all = "snake_case")]
pub enum CallOutput {
    None,
    Conversation { id: ConversationId },
    MessageIndex { index: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub height: u64,
    pub timestamp: i64,
    pub from: Address,
    pub fee: u64,
    pub status: TxStatus,
    pub output: CallOutput,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, TxStatus::Success)
    }
}
