//! Ledger accounts
//!
//! Every acting identity on the ledger is a secp256k1 signing key. Its
//! `Address` is the last 20 bytes of BLAKE3 over the 64-byte uncompressed
//! public key (no SEC1 prefix). Addresses are fixed-width map keys everywhere
//! in the ledger and render as `0x`-prefixed lowercase hex.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::error::CryptoError;

pub const ADDRESS_LEN: usize = 20;
pub const PUBLIC_KEY_LEN: usize = 64;
pub const SIGNATURE_LEN: usize = 64;

// ── Address ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Derive the address owned by a raw 64-byte public key.
    pub fn from_public_key(raw: &[u8; PUBLIC_KEY_LEN]) -> Self {
        let digest = blake3::hash(raw);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest.as_bytes()[32 - ADDRESS_LEN..]);
        Address(out)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Short form for logs: `0x1a2b…9f0e`.
    pub fn short(&self) -> String {
        let h = hex::encode(self.0);
        format!("0x{}…{}", &h[..4], &h[h.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)?;
        let arr: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            CryptoError::InvalidAddress(format!("expected {ADDRESS_LEN} bytes, got {}", b.len()))
        })?;
        Ok(Address(arr))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Public key / signature helpers ───────────────────────────────────────────

/// Re-attach the SEC1 prefix to a raw 64-byte key.
pub(crate) fn sec1_from_raw(raw: &[u8; PUBLIC_KEY_LEN]) -> [u8; PUBLIC_KEY_LEN + 1] {
    let mut out = [0u8; PUBLIC_KEY_LEN + 1];
    out[0] = 0x04;
    out[1..].copy_from_slice(raw);
    out
}

/// Verify a 64-byte ECDSA signature made by the holder of `public_key`.
pub fn verify_signature(
    public_key: &[u8; PUBLIC_KEY_LEN],
    msg: &[u8],
    sig_bytes: &[u8],
) -> Result<(), CryptoError> {
    let vk = VerifyingKey::from_sec1_bytes(&sec1_from_raw(public_key))
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let sig = Signature::from_slice(sig_bytes).map_err(|_| CryptoError::SignatureVerification)?;
    vk.verify(msg, &sig).map_err(|_| CryptoError::SignatureVerification)
}

// ── Account key ──────────────────────────────────────────────────────────────

/// A ledger signing credential. Used both for a user's primary credential and
/// for delegate session wallets.
#[derive(Clone)]
pub struct AccountKey {
    signing_key: SigningKey,
    public: [u8; PUBLIC_KEY_LEN],
    address: Address,
}

impl AccountKey {
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "Account key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(hex::decode(s.strip_prefix("0x").unwrap_or(s))?);
        Self::from_bytes(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let point = signing_key.verifying_key().to_encoded_point(false);
        // An uncompressed encoding is always 65 bytes.
        let mut public = [0u8; PUBLIC_KEY_LEN];
        public.copy_from_slice(&point.as_bytes()[1..]);
        let address = Address::from_public_key(&public);
        Self { signing_key, public, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    /// Sign arbitrary bytes; returns the 64-byte `r || s` signature.
    pub fn sign(&self, msg: &[u8]) -> [u8; SIGNATURE_LEN] {
        let sig: Signature = self.signing_key.sign(msg);
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(&sig.to_bytes());
        out
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey").field("address", &self.address).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let key = AccountKey::generate();
        let sig = key.sign(b"tx-bytes");
        assert!(verify_signature(key.public_key(), b"tx-bytes", &sig).is_ok());
        assert!(verify_signature(key.public_key(), b"other-bytes", &sig).is_err());
    }

    #[test]
    fn address_is_stable_across_reload() {
        let key = AccountKey::generate();
        let reloaded = AccountKey::from_bytes(key.secret_bytes().as_ref()).unwrap();
        assert_eq!(key.address(), reloaded.address());
        assert_eq!(key.address(), Address::from_public_key(key.public_key()));
    }

    #[test]
    fn address_hex_parse() {
        let key = AccountKey::generate();
        let text = key.address().to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 2 + 40);
        assert_eq!(text.parse::<Address>().unwrap(), key.address());
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn address_serde_as_hex_string() {
        let addr = AccountKey::generate().address();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{addr}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
