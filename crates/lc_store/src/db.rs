//! Keystore over SQLite via sqlx.
//!
//! Every secret column is sealed with the vault key. The associated data binds
//! each ciphertext to its table and owner, so a row copied under another
//! owner fails to decrypt instead of silently handing over the wrong key.

use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use lc_crypto::{aead, kdf, AccountKey, Address, SessionKeyPair};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{
    DelegateState, DelegateWalletRow, SessionKeyRow, StoredDelegate, StoredSessionKey, VaultMetaRow,
};
use crate::vault::Vault;

const VAULT_CHECK: &[u8] = b"lc-vault-check-v1";

/// Central store handle. Cheap to clone (Arc internally).
#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
    pub vault: Vault,
}

impl Store {
    /// Open (or create) the SQLite database at `db_path` and run pending
    /// migrations. The vault starts locked.
    ///
    /// WAL mode is set on the connection, not in a migration: SQLite refuses
    /// to change `journal_mode` inside the transaction sqlx wraps migrations in.
    pub async fn open(db_path: &Path, vault: Vault) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(opts).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        debug!(path = %db_path.display(), "keystore opened");
        Ok(Self { pool, vault })
    }

    /// Unlock the vault. The first unlock of a new keystore fixes the salt and
    /// records a check value; later unlocks verify the passphrase against it.
    pub async fn unlock(&self, passphrase: &[u8]) -> Result<(), StoreError> {
        let meta: Option<VaultMetaRow> =
            sqlx::query_as("SELECT salt, check_enc FROM vault_meta WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match meta {
            Some(meta) => {
                let mut salt = [0u8; 16];
                hex::decode_to_slice(&meta.salt, &mut salt)
                    .map_err(|_| StoreError::Corrupt("vault salt".into()))?;
                self.vault.unlock(passphrase, &salt).await?;
                match self.decrypt_value(&meta.check_enc, b"vault_meta").await {
                    Ok(check) if check.as_slice() == VAULT_CHECK => {}
                    Ok(_) | Err(StoreError::Crypto(_)) => {
                        self.vault.lock().await;
                        return Err(StoreError::WrongPassphrase);
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                let salt = kdf::generate_salt();
                self.vault.unlock(passphrase, &salt).await?;
                let check_enc = self.encrypt_value(VAULT_CHECK, b"vault_meta").await?;
                sqlx::query(
                    "INSERT INTO vault_meta (id, salt, check_enc, created_at) VALUES (1, ?, ?, ?)",
                )
                .bind(hex::encode(salt))
                .bind(check_enc)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
                info!("keystore vault initialised");
            }
        }
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    /// Encrypt a plaintext value with the vault key.
    pub async fn encrypt_value(&self, plaintext: &[u8], aad: &[u8]) -> Result<String, StoreError> {
        self.vault
            .with_key(|key| {
                let ct = aead::encrypt(key, plaintext, aad)?;
                Ok(URL_SAFE_NO_PAD.encode(ct))
            })
            .await
    }

    /// Decrypt a vault-encrypted value.
    pub async fn decrypt_value(
        &self,
        b64: &str,
        aad: &[u8],
    ) -> Result<zeroize::Zeroizing<Vec<u8>>, StoreError> {
        let ct = URL_SAFE_NO_PAD
            .decode(b64)
            .map_err(|e| StoreError::Crypto(lc_crypto::CryptoError::Base64Decode(e)))?;
        self.vault
            .with_key(|key| Ok(aead::decrypt(key, &ct, aad)?))
            .await
    }

    // ── Session keys ─────────────────────────────────────────────────────────

    pub async fn session_key(&self, owner: &Address) -> Result<Option<StoredSessionKey>, StoreError> {
        let row: Option<SessionKeyRow> = sqlx::query_as(
            "SELECT owner, public_key, secret_enc, created_at FROM session_keys WHERE owner = ?",
        )
        .bind(owner.to_hex())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let secret = self
            .decrypt_value(&row.secret_enc, &session_aad(owner))
            .await?;
        let keypair = SessionKeyPair::from_bytes(&secret)?;
        if keypair.public().to_hex() != row.public_key {
            return Err(StoreError::Corrupt(format!("session key of {owner} does not match its public half")));
        }
        Ok(Some(StoredSessionKey { keypair, created_at: row.created_at }))
    }

    /// Store `keypair` unless the owner already has one. Returns whether this
    /// call wrote the row.
    pub async fn insert_session_key_if_absent(
        &self,
        owner: &Address,
        keypair: &SessionKeyPair,
    ) -> Result<bool, StoreError> {
        let secret_enc = self
            .encrypt_value(keypair.secret_bytes().as_slice(), &session_aad(owner))
            .await?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO session_keys (owner, public_key, secret_enc, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(owner.to_hex())
        .bind(keypair.public().to_hex())
        .bind(secret_enc)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        let inserted = result.rows_affected() == 1;
        debug!(owner = %owner, inserted, "session key insert");
        Ok(inserted)
    }

    /// Overwrite the owner's keypair.
    pub async fn replace_session_key(
        &self,
        owner: &Address,
        keypair: &SessionKeyPair,
    ) -> Result<(), StoreError> {
        let secret_enc = self
            .encrypt_value(keypair.secret_bytes().as_slice(), &session_aad(owner))
            .await?;
        sqlx::query(
            "INSERT INTO session_keys (owner, public_key, secret_enc, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(owner) DO UPDATE SET public_key = excluded.public_key,
                 secret_enc = excluded.secret_enc, created_at = excluded.created_at",
        )
        .bind(owner.to_hex())
        .bind(keypair.public().to_hex())
        .bind(secret_enc)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        debug!(owner = %owner, "session key replaced");
        Ok(())
    }

    // ── Delegate wallets ─────────────────────────────────────────────────────

    pub async fn delegate_wallet(&self, owner: &Address) -> Result<Option<StoredDelegate>, StoreError> {
        let row: Option<DelegateWalletRow> = sqlx::query_as(
            "SELECT owner, delegate_address, secret_enc, state, created_at, updated_at
             FROM delegate_wallets WHERE owner = ?",
        )
        .bind(owner.to_hex())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let secret = self
            .decrypt_value(&row.secret_enc, &delegate_aad(owner))
            .await?;
        let key = AccountKey::from_bytes(&secret)?;
        let address: Address = row
            .delegate_address
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("delegate address of {owner}")))?;
        if key.address() != address {
            return Err(StoreError::Corrupt(format!("delegate key of {owner} does not match its address")));
        }
        let state = row.state.parse().map_err(StoreError::Corrupt)?;
        Ok(Some(StoredDelegate { address, key, state, updated_at: row.updated_at }))
    }

    /// Store `key` as the owner's pending delegate, unless the owner already
    /// holds one that is pending or authorized. A revoked row is replaced.
    /// Returns whether this call wrote the row.
    pub async fn insert_pending_delegate(
        &self,
        owner: &Address,
        key: &AccountKey,
    ) -> Result<bool, StoreError> {
        let secret_enc = self
            .encrypt_value(key.secret_bytes().as_slice(), &delegate_aad(owner))
            .await?;
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO delegate_wallets (owner, delegate_address, secret_enc, state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(owner) DO UPDATE SET delegate_address = excluded.delegate_address,
                 secret_enc = excluded.secret_enc, state = excluded.state,
                 created_at = excluded.created_at, updated_at = excluded.updated_at
             WHERE delegate_wallets.state = ?",
        )
        .bind(owner.to_hex())
        .bind(key.address().to_hex())
        .bind(secret_enc)
        .bind(DelegateState::PendingAuthorization.as_str())
        .bind(now)
        .bind(now)
        .bind(DelegateState::Revoked.as_str())
        .execute(&self.pool)
        .await?;
        let inserted = result.rows_affected() == 1;
        debug!(owner = %owner, delegate = %key.address(), inserted, "pending delegate insert");
        Ok(inserted)
    }

    pub async fn set_delegate_state(&self, owner: &Address, state: DelegateState) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE delegate_wallets SET state = ?, updated_at = ? WHERE owner = ?")
            .bind(state.as_str())
            .bind(Utc::now())
            .bind(owner.to_hex())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("delegate wallet for {owner}")));
        }
        debug!(owner = %owner, state = %state, "delegate state updated");
        Ok(())
    }
}

fn session_aad(owner: &Address) -> Vec<u8> {
    format!("lc-store-v1:session_keys:{owner}").into_bytes()
}

fn delegate_aad(owner: &Address) -> Vec<u8> {
    format!("lc-store-v1:delegate_wallets:{owner}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_unlocked() -> (TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("keystore.db"), Vault::with_auto_lock(0))
            .await
            .unwrap();
        store.unlock(b"correct horse").await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn wrong_passphrase_rejected_on_reopen() {
        let (dir, store) = open_unlocked().await;
        store.pool.close().await;

        let reopened = Store::open(&dir.path().join("keystore.db"), Vault::new()).await.unwrap();
        let err = reopened.unlock(b"battery staple").await.unwrap_err();
        assert!(matches!(err, StoreError::WrongPassphrase));
        assert!(reopened.vault.is_locked().await);
        reopened.unlock(b"correct horse").await.unwrap();
    }

    #[tokio::test]
    async fn session_key_insert_if_absent_keeps_first() {
        let (_dir, store) = open_unlocked().await;
        let owner = AccountKey::generate().address();
        assert!(store.session_key(&owner).await.unwrap().is_none());

        let first = SessionKeyPair::generate();
        let second = SessionKeyPair::generate();
        assert!(store.insert_session_key_if_absent(&owner, &first).await.unwrap());
        assert!(!store.insert_session_key_if_absent(&owner, &second).await.unwrap());

        let stored = store.session_key(&owner).await.unwrap().unwrap();
        assert_eq!(stored.keypair.public(), first.public());

        store.replace_session_key(&owner, &second).await.unwrap();
        let stored = store.session_key(&owner).await.unwrap().unwrap();
        assert_eq!(stored.keypair.public(), second.public());
    }

    #[tokio::test]
    async fn session_keys_are_scoped_per_owner() {
        let (_dir, store) = open_unlocked().await;
        let a = AccountKey::generate().address();
        let b = AccountKey::generate().address();
        store.insert_session_key_if_absent(&a, &SessionKeyPair::generate()).await.unwrap();
        assert!(store.session_key(&b).await.unwrap().is_none());

        // A row moved under another owner no longer decrypts.
        sqlx::query("UPDATE session_keys SET owner = ? WHERE owner = ?")
            .bind(b.to_hex())
            .bind(a.to_hex())
            .execute(&store.pool)
            .await
            .unwrap();
        assert!(matches!(store.session_key(&b).await, Err(StoreError::Crypto(_))));
    }

    #[tokio::test]
    async fn locked_vault_blocks_reads() {
        let (_dir, store) = open_unlocked().await;
        let owner = AccountKey::generate().address();
        store.insert_session_key_if_absent(&owner, &SessionKeyPair::generate()).await.unwrap();
        store.vault.lock().await;
        assert!(matches!(store.session_key(&owner).await, Err(StoreError::VaultLocked)));
    }

    #[tokio::test]
    async fn delegate_wallet_lifecycle() {
        let (_dir, store) = open_unlocked().await;
        let owner = AccountKey::generate().address();
        assert!(store.delegate_wallet(&owner).await.unwrap().is_none());
        assert!(matches!(
            store.set_delegate_state(&owner, DelegateState::Authorized).await,
            Err(StoreError::NotFound(_))
        ));

        let key = AccountKey::generate();
        assert!(store.insert_pending_delegate(&owner, &key).await.unwrap());
        assert!(!store.insert_pending_delegate(&owner, &AccountKey::generate()).await.unwrap());
        store.set_delegate_state(&owner, DelegateState::Authorized).await.unwrap();
        assert!(!store.insert_pending_delegate(&owner, &AccountKey::generate()).await.unwrap());

        let stored = store.delegate_wallet(&owner).await.unwrap().unwrap();
        assert_eq!(stored.address, key.address());
        assert_eq!(stored.state, DelegateState::Authorized);
        assert_eq!(stored.key.address(), key.address());

        store.set_delegate_state(&owner, DelegateState::Revoked).await.unwrap();
        let replacement = AccountKey::generate();
        assert!(store.insert_pending_delegate(&owner, &replacement).await.unwrap());
        let stored = store.delegate_wallet(&owner).await.unwrap().unwrap();
        assert_eq!(stored.address, replacement.address());
        assert_eq!(stored.state, DelegateState::PendingAuthorization);
    }
}
