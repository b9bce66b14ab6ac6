//! Chain: shared handle to the ledger plus the single sequencer task that
//! orders every write.
//!
//! Submissions go over an unbounded mpsc channel and are applied strictly in
//! arrival order, one transaction per block. Each submission carries a
//! oneshot for its outcome; dropping the receiving half does not retract the
//! transaction.

use std::sync::Arc;

use chrono::Utc;
use lc_proto::{Receipt, SignedTransaction, TxHash, TxStatus};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::error::LedgerError;
use crate::state::{ChainConfig, LedgerState};

type Outcome = Result<Receipt, LedgerError>;

struct Submission {
    tx: SignedTransaction,
    reply: oneshot::Sender<Outcome>,
}

#[derive(Clone)]
pub struct Chain {
    state: Arc<RwLock<LedgerState>>,
    submit_tx: mpsc::UnboundedSender<Submission>,
}

impl Chain {
    /// Fresh ledger from genesis. Must be called inside a tokio runtime.
    pub fn start(config: ChainConfig) -> Self {
        Self::from_snapshot(LedgerState::genesis(config))
    }

    /// Resume from a previously saved state.
    pub fn from_snapshot(state: LedgerState) -> Self {
        let height = state.height();
        let state = Arc::new(RwLock::new(state));
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_sequencer(state.clone(), submit_rx));
        info!(height, "ledger sequencer started");
        Self { state, submit_tx }
    }

    /// Queue a transaction for inclusion.
    pub fn submit(&self, tx: SignedTransaction) -> Result<PendingTransaction, LedgerError> {
        let hash = tx
            .hash()
            .map_err(LedgerError::encoding)?;
        let (reply, rx) = oneshot::channel();
        self.submit_tx
            .send(Submission { tx, reply })
            .map_err(|_| LedgerError::SequencerClosed)?;
        debug!(tx = %hash, "transaction queued");
        Ok(PendingTransaction { hash, rx })
    }

    /// Run `f` against the latest applied state.
    pub fn read<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> R {
        f(&self.state.read())
    }

    /// Point-in-time copy of the whole ledger.
    pub fn snapshot(&self) -> LedgerState {
        self.state.read().clone()
    }
}

async fn run_sequencer(
    state: Arc<RwLock<LedgerState>>,
    mut submit_rx: mpsc::UnboundedReceiver<Submission>,
) {
    while let Some(Submission { tx, reply }) = submit_rx.recv().await {
        let now = Utc::now().timestamp();
        let outcome = state.write().apply(&tx, now);
        if let Err(err) = &outcome {
            debug!(from = %tx.tx.from, nonce = tx.tx.nonce, error = %err, "transaction rejected");
        }
        // The submitter may have stopped waiting; the block stands either way.
        let _ = reply.send(outcome);
    }
    info!("ledger sequencer stopped");
}

/// Handle for a queued transaction.
#[derive(Debug)]
pub struct PendingTransaction {
    hash: TxHash,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingTransaction {
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    /// Wait for the block. A reverted transaction still yields `Ok` here;
    /// only pre-inclusion rejections are `Err`.
    pub async fn receipt(self) -> Result<Receipt, LedgerError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(tx = %self.hash, "sequencer dropped transaction without a result");
                Err(LedgerError::SequencerClosed)
            }
        }
    }

    /// Wait for the block and surface a revert as its error.
    pub async fn confirmed(self) -> Result<Receipt, LedgerError> {
        let receipt = self.receipt().await?;
        match &receipt.status {
            TxStatus::Success => Ok(receipt),
            TxStatus::Reverted { kind, reason } => Err(LedgerError::from_revert(*kind, reason.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_crypto::AccountKey;
    use lc_proto::{Call, CallOutput, Transaction};

    fn signed(key: &AccountKey, nonce: u64, call: Call) -> SignedTransaction {
        Transaction { from: key.address(), nonce, call }.sign(key).unwrap()
    }

    #[tokio::test]
    async fn submit_confirms_in_order() {
        let alice = AccountKey::generate();
        let chain = Chain::start(ChainConfig::default().with_allocation(alice.address(), 10));

        let first = chain.submit(signed(&alice, 0, Call::CreateDefaultProfile)).unwrap();
        let second = chain
            .submit(signed(&alice, 1, Call::SetBio { bio: "hi".into() }))
            .unwrap();
        let r2 = second.confirmed().await.unwrap();
        let r1 = first.confirmed().await.unwrap();
        assert_eq!(r1.height, 1);
        assert_eq!(r2.height, 2);
        assert_eq!(chain.read(|s| s.balance(&alice.address())), 8);
    }

    #[tokio::test]
    async fn revert_surfaces_as_error() {
        let alice = AccountKey::generate();
        let chain = Chain::start(ChainConfig::default().with_allocation(alice.address(), 10));
        chain
            .submit(signed(&alice, 0, Call::CreateDefaultProfile))
            .unwrap()
            .confirmed()
            .await
            .unwrap();

        let pending = chain.submit(signed(&alice, 1, Call::CreateDefaultProfile)).unwrap();
        let err = pending.confirmed().await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn dropped_handle_still_applies() {
        let alice = AccountKey::generate();
        let chain = Chain::start(ChainConfig::default().with_allocation(alice.address(), 10));
        drop(chain.submit(signed(&alice, 0, Call::CreateDefaultProfile)).unwrap());
        let r = chain
            .submit(signed(&alice, 1, Call::ClearLinks))
            .unwrap()
            .confirmed()
            .await
            .unwrap();
        assert_eq!(r.height, 2);
        assert!(chain.read(|s| s.registry().has_profile(&alice.address())));
    }

    #[tokio::test]
    async fn concurrent_posts_get_distinct_indices() {
        let alice = AccountKey::generate();
        let bob = AccountKey::generate();
        let chain = Chain::start(
            ChainConfig::default()
                .with_allocation(alice.address(), 100)
                .with_allocation(bob.address(), 100),
        );
        for key in [&alice, &bob] {
            chain
                .submit(signed(key, 0, Call::CreateDefaultProfile))
                .unwrap()
                .confirmed()
                .await
                .unwrap();
        }
        let id = match chain
            .submit(signed(&alice, 1, Call::CreateConversation { other: bob.address() }))
            .unwrap()
            .confirmed()
            .await
            .unwrap()
            .output
        {
            CallOutput::Conversation { id } => id,
            other => panic!("unexpected output {other:?}"),
        };

        let mut handles = Vec::new();
        for i in 0..10u64 {
            let (key, nonce) = if i % 2 == 0 { (&alice, 2 + i / 2) } else { (&bob, 1 + i / 2) };
            let tx = signed(key, nonce, Call::PostMessage { conversation: id, ciphertext: vec![i as u8] });
            let pending = chain.submit(tx).unwrap();
            handles.push(tokio::spawn(pending.confirmed()));
        }
        let mut indices = Vec::new();
        for h in handles {
            match h.await.unwrap().unwrap().output {
                CallOutput::MessageIndex { index } => indices.push(index),
                other => panic!("unexpected output {other:?}"),
            }
        }
        indices.sort_unstable();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
        assert_eq!(chain.read(|s| s.conversation(&id).unwrap().get_message_count()), 10);
    }

    #[tokio::test]
    async fn snapshot_resumes() {
        let alice = AccountKey::generate();
        let chain = Chain::start(ChainConfig::default().with_allocation(alice.address(), 10));
        chain
            .submit(signed(&alice, 0, Call::CreateDefaultProfile))
            .unwrap()
            .confirmed()
            .await
            .unwrap();

        let resumed = Chain::from_snapshot(chain.snapshot());
        let r = resumed
            .submit(signed(&alice, 1, Call::SetBio { bio: "back".into() }))
            .unwrap()
            .confirmed()
            .await
            .unwrap();
        assert_eq!(r.height, 2);
    }
}
