//! lc_client: client side of LedgerChat
//!
//! # Modules
//! - `wallet`       : nonce-tracking signer bound to a chain handle
//! - `key_exchange` : session keypair lifecycle, ECDH + AES-GCM sealing
//! - `delegate`     : gasless delegate key lifecycle
//! - `messenger`    : conversation facade and poller
//! - `settings`     : `settings.json` in the data directory
//! - `paths`        : platform data directory resolution

pub mod delegate;
pub mod error;
pub mod key_exchange;
pub mod messenger;
pub mod paths;
pub mod settings;
pub mod wallet;

use std::path::Path;

pub use delegate::DelegateSigningCoordinator;
pub use error::ClientError;
pub use key_exchange::KeyExchangeEngine;
pub use messenger::{DecryptedMessage, Messenger, PollerHandle};
pub use settings::ClientSettings;
pub use wallet::Wallet;

use lc_store::{Store, Vault};

/// Open the keystore named in `settings` under `data_dir` and unlock it.
pub async fn open_store(
    data_dir: &Path,
    settings: &ClientSettings,
    passphrase: &[u8],
) -> Result<Store, ClientError> {
    std::fs::create_dir_all(data_dir)?;
    let store = Store::open(
        &settings.store_path(data_dir),
        Vault::with_auto_lock(settings.auto_lock_secs),
    )
    .await?;
    store.unlock(passphrase).await?;
    Ok(store)
}
