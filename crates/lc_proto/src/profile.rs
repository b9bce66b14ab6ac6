//! Profile records as returned by registry reads.

use lc_crypto::{Address, SessionPublicKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub url: String,
}

impl Link {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into() }
    }
}

/// Read-side view of a profile and its delegate set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileView {
    pub owner: Address,
    pub display_name: String,
    pub bio: String,
    pub links: Vec<Link>,
    pub session_public_key: Option<SessionPublicKey>,
    pub delegates: Vec<Address>,
}
