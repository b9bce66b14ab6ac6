//! LedgerChat cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Raw ECDH output never reaches a cipher without a KDF step.
//!
//! # Module layout
//! - `account`     : secp256k1 ledger signing keys and 20-byte addresses
//! - `session_key` : secp256k1 ECDH session keypairs (public half published on the ledger)
//! - `cipher`      : AES-256-GCM direct-message sealing
//! - `aead`        : XChaCha20-Poly1305 at-rest helpers for the keystore
//! - `kdf`         : HKDF / Argon2id key derivation
//! - `hash`        : BLAKE3 utilities (pair keys, tx hashes, entity keys)
//! - `hash_chain`  : running digest over a conversation's records
//! - `error`       : unified error type

pub mod account;
pub mod aead;
pub mod cipher;
pub mod error;
pub mod hash;
pub mod hash_chain;
pub mod kdf;
pub mod session_key;

pub use account::{AccountKey, Address};
pub use error::CryptoError;
pub use session_key::{SessionKeyPair, SessionPublicKey};
