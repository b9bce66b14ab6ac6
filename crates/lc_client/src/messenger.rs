//! Messenger: conversation-level facade over the ledger, the key exchange
//! engine and the delegate coordinator.
//!
//! Writes that touch content (conversation creation, posts) go through
//! `content_wallet`, so they are signed by the delegate once it is authorized.

use std::time::Duration;

use lc_chain::LedgerError;
use lc_crypto::Address;
use lc_proto::{Call, CallOutput, ConversationId, EncryptedMessage, ProfileView};
use lc_store::Store;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::delegate::DelegateSigningCoordinator;
use crate::error::ClientError;
use crate::key_exchange::KeyExchangeEngine;
use crate::settings::ClientSettings;
use crate::wallet::Wallet;

/// One ledger record after local decryption.
#[derive(Debug)]
pub struct DecryptedMessage {
    pub index: u64,
    pub sender_owner: Address,
    pub sender_address: Address,
    pub timestamp: i64,
    /// `Err(CannotDecrypt)` for tampered records or ones sealed under a
    /// superseded key. Never an empty string standing in for a failure.
    pub body: Result<String, ClientError>,
}

impl DecryptedMessage {
    pub fn text(&self) -> Option<&str> {
        self.body.as_deref().ok()
    }
}

#[derive(Clone)]
pub struct Messenger {
    owner: Wallet,
    keys: KeyExchangeEngine,
    delegate: DelegateSigningCoordinator,
    poll_interval: Duration,
}

impl Messenger {
    pub fn new(owner: Wallet, store: Store, settings: &ClientSettings) -> Self {
        Self {
            keys: KeyExchangeEngine::new(owner.clone(), store.clone()),
            delegate: DelegateSigningCoordinator::new(owner.clone(), store),
            owner,
            poll_interval: Duration::from_secs(settings.poll_interval_secs.max(1)),
        }
    }

    pub fn address(&self) -> Address {
        self.owner.address()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.owner
    }

    pub fn keys(&self) -> &KeyExchangeEngine {
        &self.keys
    }

    pub fn delegate(&self) -> &DelegateSigningCoordinator {
        &self.delegate
    }

    pub fn profile(&self, addr: &Address) -> Result<ProfileView, ClientError> {
        Ok(self.owner.chain().read(|s| s.registry().get_profile(addr))?)
    }

    /// Create the profile if this identity does not have one yet.
    pub async fn ensure_profile(&self, display_name: &str, bio: &str) -> Result<(), ClientError> {
        let me = self.address();
        if self.owner.chain().read(|s| s.registry().has_profile(&me)) {
            return Ok(());
        }
        self.owner
            .send(Call::CreateProfile { display_name: display_name.into(), bio: bio.into() })
            .await?;
        info!(owner = %me, "profile created");
        Ok(())
    }

    pub fn conversation_id(&self, other: &Address) -> Option<ConversationId> {
        let me = self.address();
        self.owner
            .chain()
            .read(|s| s.directory().get_conversation(s.registry(), &me, other))
    }

    pub fn conversations(&self) -> Vec<ConversationId> {
        let me = self.address();
        self.owner
            .chain()
            .read(|s| s.directory().get_conversations(s.registry(), &me))
    }

    /// Existing conversation with `other`, or a new one. Losing a creation race
    /// to the other side is resolved by re-reading.
    pub async fn open_conversation(&self, other: &Address) -> Result<ConversationId, ClientError> {
        if let Some(id) = self.conversation_id(other) {
            return Ok(id);
        }
        let wallet = self.delegate.content_wallet().await?;
        match wallet.send(Call::CreateConversation { other: *other }).await {
            Ok(receipt) => match receipt.output {
                CallOutput::Conversation { id } => {
                    info!(conversation = %id, with = %other, "conversation opened");
                    Ok(id)
                }
                out => Err(ClientError::UnexpectedOutput(format!("{out:?}"))),
            },
            Err(ClientError::Ledger(LedgerError::Conflict(reason))) => {
                debug!(with = %other, %reason, "conversation created concurrently, re-reading");
                self.conversation_id(other)
                    .ok_or(ClientError::Ledger(LedgerError::Conflict(reason)))
            }
            Err(e) => Err(e),
        }
    }

    /// Encrypt `plaintext` for `other` and post it. Returns the ledger index.
    pub async fn send(&self, other: &Address, plaintext: &str) -> Result<u64, ClientError> {
        let blob = self.keys.encrypt_for(other, plaintext.as_bytes()).await?;
        let conversation = self.open_conversation(other).await?;
        let wallet = self.delegate.content_wallet().await?;
        let receipt = wallet
            .send(Call::PostMessage { conversation, ciphertext: blob })
            .await?;
        match receipt.output {
            CallOutput::MessageIndex { index } => {
                debug!(conversation = %conversation, index, signer = %wallet.address(), "message posted");
                Ok(index)
            }
            out => Err(ClientError::UnexpectedOutput(format!("{out:?}"))),
        }
    }

    /// Range read, clamped like the ledger's. No conversation yet reads as
    /// empty; a counterpart without a session key is `NoSessionKey`.
    pub async fn read(&self, other: &Address, start: u64, count: u64) -> Result<Vec<DecryptedMessage>, ClientError> {
        self.keys.counterpart_key(other)?;
        let records = self.fetch(other, |c| c.get_messages(start, count));
        Ok(self.decrypt_all(other, records).await)
    }

    pub async fn latest(&self, other: &Address, n: u64) -> Result<Vec<DecryptedMessage>, ClientError> {
        self.keys.counterpart_key(other)?;
        let records = self.fetch(other, |c| c.get_latest_messages(n));
        Ok(self.decrypt_all(other, records).await)
    }

    /// Messages at or after `cursor`, plus the cursor to pass next time.
    pub async fn poll_new(
        &self,
        other: &Address,
        cursor: u64,
    ) -> Result<(Vec<DecryptedMessage>, u64), ClientError> {
        let records = self.fetch(other, |c| c.get_messages(cursor, u64::MAX));
        let next = records.last().map_or(cursor, |m| m.index + 1);
        Ok((self.decrypt_all(other, records).await, next))
    }

    fn fetch(
        &self,
        other: &Address,
        f: impl FnOnce(&lc_chain::ConversationLedger) -> Vec<EncryptedMessage>,
    ) -> Vec<EncryptedMessage> {
        let me = self.address();
        self.owner
            .chain()
            .read(|s| s.conversation_between(&me, other).map(f))
            .unwrap_or_default()
    }

    async fn decrypt_all(&self, other: &Address, records: Vec<EncryptedMessage>) -> Vec<DecryptedMessage> {
        let mut out = Vec::with_capacity(records.len());
        for m in records {
            let body = self
                .keys
                .decrypt_from(other, &m.ciphertext)
                .await
                .map(|pt| String::from_utf8_lossy(&pt).into_owned());
            if let Err(e) = &body {
                debug!(index = m.index, error = %e, "message not decrypted");
            }
            out.push(DecryptedMessage {
                index: m.index,
                sender_owner: m.sender_owner,
                sender_address: m.sender_address,
                timestamp: m.timestamp,
                body,
            });
        }
        out
    }

    /// Poll the conversation with `other` every `interval` (default from
    /// settings) and forward messages written by the other side. Starts after
    /// the messages already present.
    pub fn spawn_poller(&self, other: Address, interval: Option<Duration>) -> PollerHandle {
        let interval = interval.unwrap_or(self.poll_interval);
        let (msg_tx, messages) = mpsc::channel(64);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let messenger = self.clone();
        let me = self.address();
        let mut cursor = self.owner.chain().read(|s| {
            s.conversation_between(&me, &other)
                .map_or(0, |c| c.get_message_count())
        });

        let task = tokio::spawn(async move {
            info!(with = %other, interval_secs = interval.as_secs(), cursor, "poller started");

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!(with = %other, "poller shutting down");
                            return;
                        }
                    }
                }

                let (batch, next) = match messenger.poll_new(&other, cursor).await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(with = %other, error = %e, "poll failed");
                        continue;
                    }
                };
                cursor = next;
                for m in batch.into_iter().filter(|m| m.sender_owner != me) {
                    if msg_tx.send(m).await.is_err() {
                        debug!(with = %other, "poller receiver dropped");
                        return;
                    }
                }
            }
        });

        PollerHandle { task, messages, shutdown_tx }
    }
}

/// Control handle for a running poller.
pub struct PollerHandle {
    pub task: JoinHandle<()>,
    pub messages: mpsc::Receiver<DecryptedMessage>,
    shutdown_tx: watch::Sender<bool>,
}

impl PollerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}
