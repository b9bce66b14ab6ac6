//! Session encryption keys (secp256k1 ECDH)
//!
//! Each profile owner publishes the raw 64-byte public half of a
//! `SessionKeyPair` on the ledger. The private scalar stays in the client
//! keystore and is never transmitted.
//!
//! ECDH is commutative: `ECDH(a_priv, B_pub) == ECDH(b_priv, A_pub)`, so both
//! parties derive the same secret regardless of who writes to whom. The raw
//! output is run through HKDF (`kdf::derive_conversation_key`) before use.

use std::fmt;

use k256::{ecdh::diffie_hellman, elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::account::{sec1_from_raw, PUBLIC_KEY_LEN};
use crate::error::CryptoError;

// ── Public half ──────────────────────────────────────────────────────────────

/// Raw uncompressed secp256k1 point (x || y), exactly 64 bytes, no prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionPublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl SessionPublicKey {
    /// Accept exactly 64 bytes. Only the length is checked; use
    /// [`SessionPublicKey::validate`] to also require a point on the curve.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "Session public key must be {PUBLIC_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parse into a curve point.
    pub fn validate(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_sec1_bytes(&sec1_from_raw(&self.0))
            .map_err(|_| CryptoError::InvalidKey("session public key is not on secp256k1".into()))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        Self::from_slice(&hex::decode(s)?)
    }

    /// Short fingerprint for display: first 8 bytes of BLAKE3, hex.
    pub fn fingerprint(&self) -> String {
        hex::encode(&blake3::hash(&self.0).as_bytes()[..8])
    }
}

impl fmt::Debug for SessionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionPublicKey({})", self.fingerprint())
    }
}

impl Serialize for SessionPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SessionPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ── Keypair ──────────────────────────────────────────────────────────────────

/// ECDH keypair. `SecretKey` zeroizes itself on drop.
#[derive(Clone)]
pub struct SessionKeyPair {
    secret: SecretKey,
    public: SessionPublicKey,
}

impl SessionKeyPair {
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "Session secret must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let secret = SecretKey::from_slice(bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let point = secret.public_key().to_encoded_point(false);
        let mut raw = [0u8; PUBLIC_KEY_LEN];
        raw.copy_from_slice(&point.as_bytes()[1..]);
        Self { secret, public: SessionPublicKey(raw) }
    }

    pub fn public(&self) -> &SessionPublicKey {
        &self.public
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// Raw ECDH output (x-coordinate of the shared point).
    pub fn shared_secret(
        &self,
        counterpart: &SessionPublicKey,
    ) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
        let their = counterpart.validate()?;
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), their.as_affine());
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(shared.raw_secret_bytes());
        Ok(out)
    }
}

impl fmt::Debug for SessionKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeyPair").field("public", &self.public).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecdh_is_commutative() {
        let alice = SessionKeyPair::generate();
        let bob = SessionKeyPair::generate();
        let ab = alice.shared_secret(bob.public()).unwrap();
        let ba = bob.shared_secret(alice.public()).unwrap();
        assert_eq!(*ab, *ba);
    }

    #[test]
    fn public_half_is_64_raw_bytes() {
        let kp = SessionKeyPair::generate();
        assert_eq!(kp.public().as_bytes().len(), 64);
        assert!(kp.public().validate().is_ok());
    }

    #[test]
    fn reload_from_secret_keeps_public() {
        let kp = SessionKeyPair::generate();
        let again = SessionKeyPair::from_bytes(kp.secret_bytes().as_ref()).unwrap();
        assert_eq!(kp.public(), again.public());
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(SessionPublicKey::from_slice(&[4u8; 65]).is_err());
        assert!(SessionPublicKey::from_slice(&[4u8; 63]).is_err());
    }

    #[test]
    fn off_curve_point_rejected() {
        let bogus = SessionPublicKey([0xAB; 64]);
        let kp = SessionKeyPair::generate();
        assert!(kp.shared_secret(&bogus).is_err());
    }
}
