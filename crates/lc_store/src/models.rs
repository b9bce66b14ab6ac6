//! Keystore row models and the decrypted values handed to callers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use lc_crypto::{AccountKey, Address, SessionKeyPair};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VaultMetaRow {
    pub salt: String,
    pub check_enc: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionKeyRow {
    pub owner: String,
    /// Hex of the 64-byte raw public key.
    pub public_key: String,
    /// Vault-encrypted secret scalar.
    pub secret_enc: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DelegateWalletRow {
    pub owner: String,
    pub delegate_address: String,
    /// Vault-encrypted delegate signing key.
    pub secret_enc: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted lifecycle of a delegate signing key. `Unset` is the absence of
/// a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegateState {
    PendingAuthorization,
    Authorized,
    Revoked,
}

impl DelegateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelegateState::PendingAuthorization => "pending_authorization",
            DelegateState::Authorized => "authorized",
            DelegateState::Revoked => "revoked",
        }
    }
}

impl fmt::Display for DelegateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DelegateState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_authorization" => Ok(DelegateState::PendingAuthorization),
            "authorized" => Ok(DelegateState::Authorized),
            "revoked" => Ok(DelegateState::Revoked),
            other => Err(format!("unknown delegate state '{other}'")),
        }
    }
}

/// Decrypted session keypair with its creation time.
#[derive(Debug)]
pub struct StoredSessionKey {
    pub keypair: SessionKeyPair,
    pub created_at: DateTime<Utc>,
}

/// Decrypted delegate wallet.
#[derive(Debug)]
pub struct StoredDelegate {
    pub address: Address,
    pub key: AccountKey,
    pub state: DelegateState,
    pub updated_at: DateTime<Utc>,
}
