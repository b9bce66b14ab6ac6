//! Vault: in-memory key material unlocked by the user's passphrase.
//!
//! The vault holds the 32-byte keystore encryption key in memory. When it is
//! locked (explicitly or by the inactivity timer) the key is zeroized.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;
use zeroize::ZeroizeOnDrop;

use crate::error::StoreError;
use lc_crypto::kdf::vault_key_from_password;

/// 30 minutes.
pub const DEFAULT_AUTO_LOCK_SECS: u64 = 1800;

#[derive(ZeroizeOnDrop)]
struct VaultInner {
    key: [u8; 32],
    #[zeroize(skip)]
    last_activity: Instant,
}

/// Thread-safe vault handle. Clone to share between the keystore and
/// background tasks.
#[derive(Clone)]
pub struct Vault {
    inner: Arc<RwLock<Option<VaultInner>>>,
    auto_lock: u64,
}

impl Vault {
    pub fn new() -> Self {
        Self::with_auto_lock(DEFAULT_AUTO_LOCK_SECS)
    }

    /// `auto_lock_secs == 0` disables the inactivity timer.
    pub fn with_auto_lock(auto_lock_secs: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            auto_lock: auto_lock_secs,
        }
    }

    /// Derive the key from `passphrase` + `salt` and hold it.
    pub(crate) async fn unlock(&self, passphrase: &[u8], salt: &[u8; 16]) -> Result<(), StoreError> {
        let vault_key = vault_key_from_password(passphrase, salt)?;
        let mut guard = self.inner.write().await;
        *guard = Some(VaultInner {
            key: vault_key.0,
            last_activity: Instant::now(),
        });
        Ok(())
    }

    /// Lock the vault and zeroize the key.
    pub async fn lock(&self) {
        let mut guard = self.inner.write().await;
        if guard.take().is_some() {
            info!("vault locked");
        }
    }

    pub async fn is_locked(&self) -> bool {
        let guard = self.inner.read().await;
        match guard.as_ref() {
            Some(inner) => {
                if self.auto_lock > 0
                    && inner.last_activity.elapsed() > Duration::from_secs(self.auto_lock)
                {
                    drop(guard);
                    self.lock().await;
                    return true;
                }
                false
            }
            None => true,
        }
    }

    /// Run `f` with the raw key. Fails if the vault is locked or the
    /// inactivity timer has expired; otherwise resets the timer.
    pub async fn with_key<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&[u8; 32]) -> Result<R, StoreError>,
    {
        if self.is_locked().await {
            return Err(StoreError::VaultLocked);
        }

        let mut guard = self.inner.write().await;
        match guard.as_mut() {
            Some(inner) => {
                inner.last_activity = Instant::now();
                f(&inner.key)
            }
            None => Err(StoreError::VaultLocked),
        }
    }
}

impl Default for Vault {
    fn default() -> Self {
        Self::new()
    }
}
