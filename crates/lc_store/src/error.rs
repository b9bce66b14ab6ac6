use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Vault is locked; unlock with the passphrase first")]
    VaultLocked,

    #[error("Wrong vault passphrase")]
    WrongPassphrase,

    #[error("Crypto error: {0}")]
    Crypto(#[from] lc_crypto::CryptoError),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Migration error: {0}")]
    Migration(String),
}
