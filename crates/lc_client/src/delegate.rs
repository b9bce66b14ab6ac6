//! DelegateSigningCoordinator: lifecycle of the gasless signing key.
//!
//!   Unset ──prepare──▶ PendingAuthorization ──authorize──▶ Authorized
//!     ▲                      ▲                                │
//!     │                      └──────prepare──── Revoked ◀──revoke
//!
//! State is persisted per owner in the keystore. A delegate is only recorded
//! as Authorized after its `AddDelegate` transaction is confirmed.

use std::sync::Arc;

use lc_chain::LedgerError;
use lc_crypto::{AccountKey, Address};
use lc_proto::{Call, Receipt};
use lc_store::{DelegateState, Store};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::ClientError;
use crate::wallet::Wallet;

#[derive(Clone)]
pub struct DelegateSigningCoordinator {
    owner: Wallet,
    store: Store,
    /// Delegate wallet reused across sends so its nonce counter survives.
    active: Arc<Mutex<Option<Wallet>>>,
    /// Serialises prepare, authorize and revoke across clones.
    lifecycle: Arc<Mutex<()>>,
}

impl DelegateSigningCoordinator {
    pub fn new(owner: Wallet, store: Store) -> Self {
        Self {
            owner,
            store,
            active: Arc::new(Mutex::new(None)),
            lifecycle: Arc::new(Mutex::new(())),
        }
    }

    pub fn owner(&self) -> &Wallet {
        &self.owner
    }

    /// `None` means Unset.
    pub async fn state(&self) -> Result<Option<DelegateState>, ClientError> {
        Ok(self
            .store
            .delegate_wallet(&self.owner.address())
            .await?
            .map(|d| d.state))
    }

    pub async fn delegate_address(&self) -> Result<Option<Address>, ClientError> {
        Ok(self
            .store
            .delegate_wallet(&self.owner.address())
            .await?
            .map(|d| d.address))
    }

    /// Generate a delegate key locally. Idempotent while pending.
    pub async fn prepare(&self) -> Result<Address, ClientError> {
        let _guard = self.lifecycle.lock().await;
        let owner = self.owner.address();
        match self.store.delegate_wallet(&owner).await? {
            Some(existing) if existing.state == DelegateState::PendingAuthorization => {
                return Ok(existing.address)
            }
            Some(existing) if existing.state == DelegateState::Authorized => {
                return Err(ClientError::delegate_state("unset or revoked", Some(existing.state)))
            }
            _ => {}
        }

        let key = AccountKey::generate();
        let address = key.address();
        if self.store.insert_pending_delegate(&owner, &key).await? {
            info!(owner = %owner, delegate = %address, "delegate key prepared");
            return Ok(address);
        }

        // Another handle on the same keystore stored its key first.
        match self.store.delegate_wallet(&owner).await? {
            Some(winner) if winner.state == DelegateState::PendingAuthorization => {
                debug!(owner = %owner, delegate = %winner.address, "using concurrently prepared delegate");
                Ok(winner.address)
            }
            other => Err(ClientError::delegate_state("unset or revoked", other.map(|d| d.state))),
        }
    }

    /// Register the pending delegate on the ledger with the owner's key and
    /// mark it Authorized once the transaction is confirmed. Returns the
    /// delegate unchanged if it is already Authorized and bound.
    pub async fn authorize(&self) -> Result<Address, ClientError> {
        let _guard = self.lifecycle.lock().await;
        let owner = self.owner.address();
        let stored = self.store.delegate_wallet(&owner).await?;
        let delegate = match stored {
            Some(d) if d.state == DelegateState::PendingAuthorization => d.address,
            Some(d) if d.state == DelegateState::Authorized && self.bound_to_owner(&d.address) => {
                return Ok(d.address)
            }
            other => {
                return Err(ClientError::delegate_state(
                    "pending_authorization",
                    other.map(|d| d.state),
                ))
            }
        };

        if self.bound_to_owner(&delegate) {
            debug!(owner = %owner, delegate = %delegate, "delegate already registered on ledger");
        } else {
            // On failure the local state stays pending and the error surfaces.
            match self.owner.send(Call::AddDelegate { delegate }).await {
                Ok(_) => {}
                // Registered by another handle in the meantime.
                Err(ClientError::Ledger(LedgerError::Conflict(_))) if self.bound_to_owner(&delegate) => {
                    debug!(owner = %owner, delegate = %delegate, "delegate registered concurrently");
                }
                Err(e) => return Err(e),
            }
        }

        self.store
            .set_delegate_state(&owner, DelegateState::Authorized)
            .await?;
        info!(owner = %owner, delegate = %delegate, "delegate authorized");
        Ok(delegate)
    }

    fn bound_to_owner(&self, delegate: &Address) -> bool {
        let owner = self.owner.address();
        self.owner
            .chain()
            .read(|s| s.registry().get_owner_of(delegate))
            == Some(owner)
    }

    /// Move fee balance from the owner to the delegate.
    pub async fn fund(&self, amount: u64) -> Result<Receipt, ClientError> {
        let owner = self.owner.address();
        let delegate = self
            .store
            .delegate_wallet(&owner)
            .await?
            .ok_or(ClientError::NoDelegate(owner))?;
        if delegate.state == DelegateState::Revoked {
            return Err(ClientError::delegate_state(
                "pending_authorization or authorized",
                Some(delegate.state),
            ));
        }
        let receipt = self
            .owner
            .send(Call::Transfer { to: delegate.address, amount })
            .await?;
        info!(owner = %owner, delegate = %delegate.address, amount, "delegate funded");
        Ok(receipt)
    }

    /// Remove the delegate registration. The key stays in the keystore for
    /// export; past messages remain attributed to the owner.
    pub async fn revoke(&self) -> Result<(), ClientError> {
        let _guard = self.lifecycle.lock().await;
        let owner = self.owner.address();
        let delegate = match self.store.delegate_wallet(&owner).await? {
            Some(d) if d.state == DelegateState::Authorized => d.address,
            other => return Err(ClientError::delegate_state("authorized", other.map(|d| d.state))),
        };

        self.owner.send(Call::RemoveDelegate { delegate }).await?;
        self.store
            .set_delegate_state(&owner, DelegateState::Revoked)
            .await?;
        *self.active.lock().await = None;
        info!(owner = %owner, delegate = %delegate, "delegate revoked");
        Ok(())
    }

    /// Hex secret of the delegate key, in any state that has one.
    pub async fn export_key(&self) -> Result<Zeroizing<String>, ClientError> {
        let owner = self.owner.address();
        let delegate = self
            .store
            .delegate_wallet(&owner)
            .await?
            .ok_or(ClientError::NoDelegate(owner))?;
        warn!(owner = %owner, delegate = %delegate.address, "delegate key exported");
        Ok(Zeroizing::new(hex::encode(delegate.key.secret_bytes().as_slice())))
    }

    /// Wallet for content operations: the delegate while it is Authorized,
    /// still bound on the ledger and able to pay the fee, otherwise the
    /// owner's own wallet.
    pub async fn content_wallet(&self) -> Result<Wallet, ClientError> {
        let owner = self.owner.address();
        let mut active = self.active.lock().await;

        let stored = self.store.delegate_wallet(&owner).await?;
        let Some(stored) = stored.filter(|d| d.state == DelegateState::Authorized) else {
            *active = None;
            return Ok(self.owner.clone());
        };
        let (bound, balance, fee) = self.owner.chain().read(|s| {
            (
                s.registry().get_owner_of(&stored.address) == Some(owner),
                s.balance(&stored.address),
                s.config().tx_fee,
            )
        });
        if !bound {
            warn!(owner = %owner, delegate = %stored.address, "delegate no longer bound on ledger, signing as owner");
            *active = None;
            return Ok(self.owner.clone());
        }
        if balance < fee {
            warn!(owner = %owner, delegate = %stored.address, balance, fee, "delegate cannot pay the fee, signing as owner");
            return Ok(self.owner.clone());
        }

        match active.as_ref() {
            Some(wallet) if wallet.address() == stored.address => Ok(wallet.clone()),
            _ => {
                let wallet = Wallet::new(stored.key, self.owner.chain().clone());
                *active = Some(wallet.clone());
                Ok(wallet)
            }
        }
    }
}
