//! KeyExchangeEngine: session keypair lifecycle and message sealing.
//!
//! The secret half lives only in the local keystore, scoped to the owner. The
//! public half is published on the ledger with the owner's own credential.
//!
//! Message key = HKDF-SHA256(ECDH x-coordinate, salt "lc-dm-v1",
//! info = pair key of both owners). The pair key is also the AEAD associated
//! data, so a blob lifted into another conversation does not open.

use std::sync::Arc;

use lc_crypto::{cipher, hash, Address, CryptoError, SessionKeyPair, SessionPublicKey};
use lc_proto::{limits, Call};
use lc_store::Store;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::ClientError;
use crate::wallet::Wallet;

#[derive(Clone)]
pub struct KeyExchangeEngine {
    owner: Wallet,
    store: Store,
    init_lock: Arc<Mutex<()>>,
}

impl KeyExchangeEngine {
    /// `owner` must be the profile owner's primary wallet; session key
    /// publication is an identity operation delegates cannot perform.
    pub fn new(owner: Wallet, store: Store) -> Self {
        Self {
            owner,
            store,
            init_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner.address()
    }

    /// Make sure a session keypair exists locally and its public half is on
    /// the ledger. Safe to call repeatedly and concurrently: an existing local
    /// key is never regenerated.
    pub async fn ensure_session_key(&self) -> Result<SessionPublicKey, ClientError> {
        let _guard = self.init_lock.lock().await;
        let owner = self.owner();

        let public = match self.store.session_key(&owner).await? {
            Some(stored) => *stored.keypair.public(),
            None => {
                let fresh = SessionKeyPair::generate();
                if self.store.insert_session_key_if_absent(&owner, &fresh).await? {
                    info!(owner = %owner, fingerprint = %fresh.public().fingerprint(), "session key generated");
                    *fresh.public()
                } else {
                    // Another process won the insert; use its key.
                    let winner = self
                        .store
                        .session_key(&owner)
                        .await?
                        .ok_or(ClientError::NoLocalSessionKey(owner))?;
                    *winner.keypair.public()
                }
            }
        };

        let published = self
            .owner
            .chain()
            .read(|s| s.registry().get_session_public_key(&owner));
        if published != Some(public) {
            self.publish(&public).await?;
        } else {
            debug!(owner = %owner, "session key already published");
        }
        Ok(public)
    }

    /// Replace the session keypair. Messages sealed under the old key can no
    /// longer be opened by this client.
    pub async fn reinitialize_session_key(&self) -> Result<SessionPublicKey, ClientError> {
        let _guard = self.init_lock.lock().await;
        let owner = self.owner();
        warn!(owner = %owner, "rotating session key; earlier messages become undecryptable");

        let fresh = SessionKeyPair::generate();
        self.store.replace_session_key(&owner, &fresh).await?;
        let public = *fresh.public();
        self.publish(&public).await?;
        Ok(public)
    }

    async fn publish(&self, public: &SessionPublicKey) -> Result<(), ClientError> {
        self.owner
            .send(Call::SetSessionPublicKey { key: public.as_bytes().to_vec() })
            .await?;
        info!(owner = %self.owner(), fingerprint = %public.fingerprint(), "session key published");
        Ok(())
    }

    async fn local_keypair(&self) -> Result<SessionKeyPair, ClientError> {
        let owner = self.owner();
        self.store
            .session_key(&owner)
            .await?
            .map(|stored| stored.keypair)
            .ok_or(ClientError::NoLocalSessionKey(owner))
    }

    /// Counterpart's owner and published key. Absence is `NoSessionKey`.
    pub fn counterpart_key(&self, counterpart: &Address) -> Result<(Address, SessionPublicKey), ClientError> {
        self.owner.chain().read(|s| {
            let registry = s.registry();
            let owner = registry.resolve_to_owner(counterpart).unwrap_or(*counterpart);
            registry
                .get_session_public_key(&owner)
                .map(|key| (owner, key))
                .ok_or(ClientError::NoSessionKey(owner))
        })
    }

    /// Seal `plaintext` for `counterpart`. Output is nonce ∥ ciphertext ∥ tag.
    pub async fn encrypt_for(&self, counterpart: &Address, plaintext: &[u8]) -> Result<Vec<u8>, ClientError> {
        limits::check_plaintext(plaintext).map_err(lc_chain::LedgerError::from)?;
        let (their_owner, their_key) = self.counterpart_key(counterpart)?;
        let local = self.local_keypair().await?;
        let context = hash::pair_key(&self.owner(), &their_owner);
        Ok(cipher::seal(&local, &their_key, &context, plaintext)?)
    }

    /// Open a blob exchanged with `counterpart`. Any authentication failure
    /// is `CannotDecrypt`.
    pub async fn decrypt_from(
        &self,
        counterpart: &Address,
        blob: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, ClientError> {
        let (their_owner, their_key) = self.counterpart_key(counterpart)?;
        let local = self.local_keypair().await?;
        let context = hash::pair_key(&self.owner(), &their_owner);
        cipher::open(&local, &their_key, &context, blob).map_err(|e| match e {
            CryptoError::AeadDecrypt => ClientError::CannotDecrypt,
            other => ClientError::Crypto(other),
        })
    }
}
