//! Wallet: a signing key bound to a chain handle.
//!
//! Submissions through one wallet are serialized by a lock around
//! nonce-pick + sign + queue; confirmation is awaited outside the lock, so
//! several transactions can be in flight at once.

use std::sync::Arc;

use lc_chain::{Chain, LedgerError, PendingTransaction};
use lc_crypto::{AccountKey, Address};
use lc_proto::{Call, Receipt, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ClientError;

#[derive(Clone)]
pub struct Wallet {
    key: Arc<AccountKey>,
    chain: Chain,
    next_nonce: Arc<Mutex<u64>>,
}

impl Wallet {
    pub fn new(key: AccountKey, chain: Chain) -> Self {
        Self {
            key: Arc::new(key),
            chain,
            next_nonce: Arc::new(Mutex::new(0)),
        }
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn balance(&self) -> u64 {
        let me = self.address();
        self.chain.read(|s| s.balance(&me))
    }

    /// Sign and queue `call`. The nonce is the larger of the ledger's next
    /// nonce and the local counter, which covers transactions still queued.
    pub async fn submit(&self, call: Call) -> Result<PendingTransaction, ClientError> {
        let me = self.address();
        let mut local = self.next_nonce.lock().await;
        let nonce = (*local).max(self.chain.read(|s| s.next_nonce(&me)));
        let name = call.name();
        let signed = Transaction { from: me, nonce, call }.sign(&self.key)?;
        let pending = self.chain.submit(signed)?;
        *local = nonce + 1;
        debug!(from = %me, nonce, call = name, tx = %pending.hash(), "submitted");
        Ok(pending)
    }

    /// Submit and wait for the block. A revert comes back as its ledger error.
    pub async fn send(&self, call: Call) -> Result<Receipt, ClientError> {
        let pending = self.submit(call).await?;
        match pending.receipt().await {
            Ok(receipt) => match &receipt.status {
                lc_proto::TxStatus::Success => Ok(receipt),
                lc_proto::TxStatus::Reverted { kind, reason } => {
                    Err(LedgerError::from_revert(*kind, reason.clone()).into())
                }
            },
            Err(err) => {
                // Not included, so the ledger never consumed the nonce.
                self.resync_nonce().await;
                Err(err.into())
            }
        }
    }

    async fn resync_nonce(&self) {
        let me = self.address();
        let mut local = self.next_nonce.lock().await;
        let ledger = self.chain.read(|s| s.next_nonce(&me));
        if *local != ledger {
            warn!(address = %me, local = *local, ledger, "resetting nonce counter after rejection");
            *local = ledger;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_chain::ChainConfig;

    #[tokio::test]
    async fn concurrent_sends_through_one_wallet() {
        let key = AccountKey::generate();
        let chain = Chain::start(ChainConfig::default().with_allocation(key.address(), 100));
        let wallet = Wallet::new(key, chain.clone());
        wallet.send(Call::CreateDefaultProfile).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let w = wallet.clone();
            tasks.push(tokio::spawn(async move {
                w.send(Call::AddLink { name: format!("l{i}"), url: "https://x".into() }).await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        let me = wallet.address();
        assert_eq!(chain.read(|s| s.registry().get_links(&me).unwrap().len()), 8);
        assert_eq!(chain.read(|s| s.next_nonce(&me)), 9);
        assert_eq!(wallet.balance(), 91);
    }

    #[tokio::test]
    async fn rejection_resyncs_nonce() {
        let key = AccountKey::generate();
        let chain = Chain::start(ChainConfig { tx_fee: 5, ..Default::default() }.with_allocation(key.address(), 5));
        let wallet = Wallet::new(key, chain.clone());
        wallet.send(Call::CreateDefaultProfile).await.unwrap();

        let err = wallet.send(Call::ClearLinks).await.unwrap_err();
        assert!(matches!(err, ClientError::Ledger(LedgerError::InsufficientFunds(_))));
        assert_eq!(*wallet.next_nonce.lock().await, 1);
    }

    #[tokio::test]
    async fn revert_is_an_error() {
        let key = AccountKey::generate();
        let chain = Chain::start(ChainConfig::default().with_allocation(key.address(), 10));
        let wallet = Wallet::new(key, chain);
        let err = wallet.send(Call::SetBio { bio: "x".into() }).await.unwrap_err();
        assert!(matches!(err, ClientError::Ledger(LedgerError::Authorization(_))));
    }
}
