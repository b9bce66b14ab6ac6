//! Size bounds enforced by the ledger and pre-checked by clients.

use thiserror::Error;

pub const MAX_DISPLAY_NAME_CHARS: usize = 50;
pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_LINKS: usize = 10;
pub const MAX_LINK_NAME_CHARS: usize = 50;
pub const MAX_LINK_URL_CHARS: usize = 200;
/// Ciphertext bound; larger than [`MAX_PLAINTEXT_BYTES`] to leave room for
/// nonce, tag and any framing.
pub const MAX_CIPHERTEXT_BYTES: usize = 2000;
pub const MAX_PLAINTEXT_BYTES: usize = 1000;
pub const SESSION_PUBLIC_KEY_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitViolation {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} exceeds {max} (got {actual})")]
    TooLong { field: &'static str, max: usize, actual: usize },
    #[error("{field} must be exactly {expected} bytes (got {actual})")]
    WrongSize { field: &'static str, expected: usize, actual: usize },
}

fn check_chars(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), LimitViolation> {
    let n = value.chars().count();
    if n < min {
        return Err(LimitViolation::Empty { field });
    }
    if n > max {
        return Err(LimitViolation::TooLong { field, max, actual: n });
    }
    Ok(())
}

pub fn check_display_name(name: &str) -> Result<(), LimitViolation> {
    check_chars("display name", name, 1, MAX_DISPLAY_NAME_CHARS)
}

pub fn check_bio(bio: &str) -> Result<(), LimitViolation> {
    check_chars("bio", bio, 0, MAX_BIO_CHARS)
}

pub fn check_link(name: &str, url: &str) -> Result<(), LimitViolation> {
    check_chars("link name", name, 1, MAX_LINK_NAME_CHARS)?;
    check_chars("link url", url, 1, MAX_LINK_URL_CHARS)
}

pub fn check_ciphertext(ciphertext: &[u8]) -> Result<(), LimitViolation> {
    if ciphertext.is_empty() {
        return Err(LimitViolation::Empty { field: "ciphertext" });
    }
    if ciphertext.len() > MAX_CIPHERTEXT_BYTES {
        return Err(LimitViolation::TooLong {
            field: "ciphertext",
            max: MAX_CIPHERTEXT_BYTES,
            actual: ciphertext.len(),
        });
    }
    Ok(())
}

pub fn check_plaintext(plaintext: &[u8]) -> Result<(), LimitViolation> {
    if plaintext.is_empty() {
        return Err(LimitViolation::Empty { field: "message" });
    }
    if plaintext.len() > MAX_PLAINTEXT_BYTES {
        return Err(LimitViolation::TooLong {
            field: "message",
            max: MAX_PLAINTEXT_BYTES,
            actual: plaintext.len(),
        });
    }
    Ok(())
}

pub fn check_session_public_key(key: &[u8]) -> Result<(), LimitViolation> {
    if key.len() != SESSION_PUBLIC_KEY_BYTES {
        return Err(LimitViolation::WrongSize {
            field: "session public key",
            expected: SESSION_PUBLIC_KEY_BYTES,
            actual: key.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_bounds() {
        assert!(check_display_name("").is_err());
        assert!(check_display_name("a").is_ok());
        assert!(check_display_name(&"x".repeat(50)).is_ok());
        assert!(check_display_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 50 two-byte characters are still 50 characters.
        assert!(check_display_name(&"é".repeat(50)).is_ok());
    }

    #[test]
    fn ciphertext_bound_is_inclusive() {
        assert!(check_ciphertext(&vec![0u8; 2000]).is_ok());
        assert_eq!(
            check_ciphertext(&vec![0u8; 2001]),
            Err(LimitViolation::TooLong { field: "ciphertext", max: 2000, actual: 2001 })
        );
    }

    #[test]
    fn session_key_exact_size() {
        assert!(check_session_public_key(&[0u8; 64]).is_ok());
        assert!(check_session_public_key(&[0u8; 65]).is_err());
    }
}
