//! lc_store: encrypted client-side keystore for LedgerChat
//!
//! # Encryption strategy
//! SQLite does NOT natively encrypt. We use application-level encryption:
//! - Secret columns (session key scalars, delegate signing keys) are stored
//!   as XChaCha20-Poly1305 ciphertext, base64url-encoded.
//! - The vault key is derived from the user passphrase via Argon2id and held
//!   in memory only while the vault is unlocked.
//! - Public metadata (owner address, public halves, delegate state) is stored
//!   in plaintext to allow lookups.
//!
//! Rows are keyed by the owning identity, so one keystore can hold several
//! accounts without their keys mixing.
//!
//! # Migration
//! SQLx migrations in `migrations/` are run on open.

pub mod db;
pub mod error;
pub mod models;
pub mod vault;

pub use db::Store;
pub use error::StoreError;
pub use models::{DelegateState, StoredDelegate, StoredSessionKey};
pub use vault::Vault;
