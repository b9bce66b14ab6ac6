//! Direct-message cipher: AES-256-GCM over an HKDF-derived ECDH key.
//!
//! Blob format handed to the ledger (opaque to it):
//!   [ nonce (12 bytes) | ciphertext | tag (16 bytes) ]
//!
//! A fresh random nonce is drawn for every message. Authentication failure
//! (tampering, wrong key, superseded session key) is always
//! `CryptoError::AeadDecrypt`, never a garbage plaintext.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::kdf::derive_conversation_key;
use crate::session_key::{SessionKeyPair, SessionPublicKey};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
/// Bytes added to a plaintext by [`encrypt`].
pub const OVERHEAD: usize = NONCE_LEN + TAG_LEN;

pub fn encrypt(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::AeadEncrypt)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ct = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::AeadEncrypt)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    Ok(out)
}

pub fn decrypt(key: &[u8; 32], blob: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if blob.len() < OVERHEAD {
        return Err(CryptoError::AeadDecrypt);
    }
    let (nonce_bytes, ct) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::AeadDecrypt)?;

    let pt = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), Payload { msg: ct, aad })
        .map_err(|_| CryptoError::AeadDecrypt)?;
    Ok(Zeroizing::new(pt))
}

/// Encrypt `plaintext` from the holder of `local` to the owner of
/// `counterpart`. `context` is bound into both the key derivation and the
/// AEAD associated data.
pub fn seal(
    local: &SessionKeyPair,
    counterpart: &SessionPublicKey,
    context: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let shared = local.shared_secret(counterpart)?;
    let key = derive_conversation_key(shared.as_ref(), context)?;
    encrypt(&key, plaintext, context)
}

/// Inverse of [`seal`], run by the other party with its own keypair and the
/// sender's public key.
pub fn open(
    local: &SessionKeyPair,
    counterpart: &SessionPublicKey,
    context: &[u8],
    blob: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let shared = local.shared_secret(counterpart)?;
    let key = derive_conversation_key(shared.as_ref(), context)?;
    decrypt(&key, blob, context)
}
