#![allow(dead_code)]

use lc_chain::{Chain, ChainConfig};
use lc_client::{open_store, ClientSettings, Messenger, Wallet};
use lc_crypto::AccountKey;
use tempfile::TempDir;

pub const STARTING_BALANCE: u64 = 1_000;

/// One shared ledger plus a private data directory per user.
pub struct Net {
    pub chain: Chain,
    dirs: Vec<TempDir>,
}

pub struct User {
    pub messenger: Messenger,
    pub settings: ClientSettings,
}

impl Net {
    /// Ledger with genesis balances for `keys`.
    pub fn start(keys: &[&AccountKey]) -> Self {
        let mut config = ChainConfig::default();
        for k in keys {
            config = config.with_allocation(k.address(), STARTING_BALANCE);
        }
        Self { chain: Chain::start(config), dirs: Vec::new() }
    }

    /// Client for `key` with its own keystore. The profile is created.
    pub async fn join(&mut self, key: AccountKey, name: &str) -> User {
        let user = self.client(key).await;
        user.messenger.ensure_profile(name, "").await.unwrap();
        user
    }

    /// Client for `key` without a profile.
    pub async fn client(&mut self, key: AccountKey) -> User {
        let dir = tempfile::tempdir().unwrap();
        let settings = ClientSettings { auto_lock_secs: 0, poll_interval_secs: 1, ..Default::default() };
        let store = open_store(dir.path(), &settings, b"test passphrase").await.unwrap();
        self.dirs.push(dir);
        let messenger = Messenger::new(Wallet::new(key, self.chain.clone()), store, &settings);
        User { messenger, settings }
    }
}
