//! Key derivation functions
//!
//! `vault_key_from_password`: Argon2id, derives the 32-byte key used to
//!   encrypt secrets in the local keystore.
//!
//! `derive_conversation_key`: HKDF-SHA256 over a raw ECDH output. Raw
//!   shared secrets are never used directly as cipher keys.

use argon2::{Argon2, Params, Version};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

/// Salt for direct-message key derivation.
pub const DM_KEY_SALT: &[u8] = b"lc-dm-v1";

// ── Vault key (Argon2id) ──────────────────────────────────────────────────────

/// 32-byte vault key derived from a passphrase. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct VaultKey(pub [u8; 32]);

fn argon2_params() -> Result<Params, CryptoError> {
    Params::new(
        64 * 1024, // m_cost: 64 MiB
        3,         // t_cost
        1,         // p_cost
        Some(32),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Derive a vault key from a passphrase + 16-byte salt.
/// The salt is stored alongside the keystore (not secret).
pub fn vault_key_from_password(password: &[u8], salt: &[u8; 16]) -> Result<VaultKey, CryptoError> {
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon2_params()?);
    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(VaultKey(output))
}

/// Generate a fresh random 16-byte salt.
pub fn generate_salt() -> [u8; 16] {
    use rand::RngCore;
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

// ── HKDF-SHA256 ───────────────────────────────────────────────────────────────

/// Expand `ikm` + `info` into `output.len()` bytes of key material.
pub fn hkdf_expand(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output: &mut [u8],
) -> Result<(), CryptoError> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    hk.expand(info, output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Derive the 32-byte AES key for a conversation from the ECDH output.
///
/// `context` binds the key to the conversation (the pair key of both owners),
/// so the same two session keys yield distinct keys in distinct contexts.
pub fn derive_conversation_key(
    shared_secret: &[u8],
    context: &[u8],
) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let mut key = Zeroizing::new([0u8; 32]);
    hkdf_expand(shared_secret, Some(DM_KEY_SALT), context, key.as_mut())?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_key_depends_on_context() {
        let secret = [9u8; 32];
        let a = derive_conversation_key(&secret, b"pair-a").unwrap();
        let b = derive_conversation_key(&secret, b"pair-b").unwrap();
        assert_ne!(*a, *b);
        assert_ne!(*a, secret, "derived key must differ from raw ECDH output");
    }
}
