//! Identity registry: profiles, the owner/delegate graph and published
//! session keys.
//!
//! The delegate graph is two independent keyed stores:
//!   owner    → set of delegates
//!   delegate → exactly one owner
//! so "a delegate is never bound to two owners" is a single map lookup.
//!
//! Every other component attributes actions through [`IdentityRegistry::resolve_to_owner`].
//! Profile fields can only be changed by the owner itself; delegates act on
//! content (messages), never on identity.

use std::collections::{BTreeSet, HashMap};

use lc_crypto::{Address, SessionPublicKey};
use lc_proto::{limits, Link, ProfileView};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    pub bio: String,
    pub links: Vec<Link>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityRegistry {
    profiles: HashMap<Address, Profile>,
    delegates: HashMap<Address, BTreeSet<Address>>,
    owner_of: HashMap<Address, Address>,
    session_keys: HashMap<Address, SessionPublicKey>,
}

/// Deterministic display label for `createDefaultProfile`: `User-` followed
/// by the first four address bytes in hex. Not unique; a UX default only.
pub fn default_display_name(owner: &Address) -> String {
    format!("User-{}", hex::encode(&owner.as_bytes()[..4]))
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Profile lifecycle ────────────────────────────────────────────────────

    pub fn create_profile(
        &mut self,
        caller: Address,
        display_name: &str,
        bio: &str,
        now: i64,
    ) -> Result<(), LedgerError> {
        limits::check_display_name(display_name)?;
        limits::check_bio(bio)?;
        self.ensure_can_create(&caller)?;

        self.profiles.insert(
            caller,
            Profile {
                display_name: display_name.to_string(),
                bio: bio.to_string(),
                links: Vec::new(),
                created_at: now,
            },
        );
        Ok(())
    }

    pub fn create_default_profile(&mut self, caller: Address, now: i64) -> Result<(), LedgerError> {
        let name = default_display_name(&caller);
        self.create_profile(caller, &name, "", now)
    }

    fn ensure_can_create(&self, caller: &Address) -> Result<(), LedgerError> {
        if caller.is_zero() {
            return Err(LedgerError::Validation("zero address cannot own a profile".into()));
        }
        if self.profiles.contains_key(caller) {
            return Err(LedgerError::Conflict(format!("profile already exists for {caller}")));
        }
        if let Some(owner) = self.owner_of.get(caller) {
            return Err(LedgerError::Conflict(format!(
                "{caller} is a delegate of {owner} and cannot own a profile"
            )));
        }
        Ok(())
    }

    /// Mutable access for owner-only operations.
    fn owned_profile_mut(&mut self, caller: &Address) -> Result<&mut Profile, LedgerError> {
        if let Some(owner) = self.owner_of.get(caller) {
            return Err(LedgerError::Authorization(format!(
                "delegate {caller} may not modify the profile of {owner}"
            )));
        }
        self.profiles
            .get_mut(caller)
            .ok_or_else(|| LedgerError::Authorization(format!("{caller} does not own a profile")))
    }

    pub fn set_display_name(&mut self, caller: Address, display_name: &str) -> Result<(), LedgerError> {
        limits::check_display_name(display_name)?;
        self.owned_profile_mut(&caller)?.display_name = display_name.to_string();
        Ok(())
    }

    pub fn set_bio(&mut self, caller: Address, bio: &str) -> Result<(), LedgerError> {
        limits::check_bio(bio)?;
        self.owned_profile_mut(&caller)?.bio = bio.to_string();
        Ok(())
    }

    // ── Links ────────────────────────────────────────────────────────────────

    pub fn add_link(&mut self, caller: Address, name: &str, url: &str) -> Result<(), LedgerError> {
        limits::check_link(name, url)?;
        let profile = self.owned_profile_mut(&caller)?;
        if profile.links.len() >= limits::MAX_LINKS {
            return Err(LedgerError::Validation(format!(
                "link list is full ({} entries)",
                limits::MAX_LINKS
            )));
        }
        profile.links.push(Link::new(name, url));
        Ok(())
    }

    /// Swap-remove: the last link takes the removed slot.
    pub fn remove_link(&mut self, caller: Address, index: usize) -> Result<(), LedgerError> {
        let profile = self.owned_profile_mut(&caller)?;
        if index >= profile.links.len() {
            return Err(LedgerError::NotFound(format!(
                "link {index} (profile has {})",
                profile.links.len()
            )));
        }
        profile.links.swap_remove(index);
        Ok(())
    }

    pub fn clear_links(&mut self, caller: Address) -> Result<(), LedgerError> {
        self.owned_profile_mut(&caller)?.links.clear();
        Ok(())
    }

    // ── Delegates ────────────────────────────────────────────────────────────

    pub fn add_delegate(&mut self, caller: Address, delegate: Address) -> Result<(), LedgerError> {
        if delegate.is_zero() {
            return Err(LedgerError::Validation("zero address cannot be a delegate".into()));
        }
        if delegate == caller {
            return Err(LedgerError::Validation("cannot delegate to self".into()));
        }
        self.owned_profile_mut(&caller)?;
        if let Some(existing) = self.owner_of.get(&delegate) {
            return Err(if *existing == caller {
                LedgerError::Conflict(format!("{delegate} is already a delegate"))
            } else {
                LedgerError::Conflict(format!("{delegate} is already bound to {existing}"))
            });
        }
        if self.profiles.contains_key(&delegate) {
            return Err(LedgerError::Conflict(format!(
                "{delegate} owns a profile and cannot be a delegate"
            )));
        }

        self.delegates.entry(caller).or_default().insert(delegate);
        self.owner_of.insert(delegate, caller);
        Ok(())
    }

    pub fn remove_delegate(&mut self, caller: Address, delegate: Address) -> Result<(), LedgerError> {
        self.owned_profile_mut(&caller)?;
        if self.owner_of.get(&delegate) != Some(&caller) {
            return Err(LedgerError::NotFound(format!("{delegate} is not a delegate of {caller}")));
        }
        self.unbind_delegate(&caller, &delegate);
        Ok(())
    }

    fn unbind_delegate(&mut self, owner: &Address, delegate: &Address) {
        self.owner_of.remove(delegate);
        if let Some(set) = self.delegates.get_mut(owner) {
            set.remove(delegate);
            if set.is_empty() {
                self.delegates.remove(owner);
            }
        }
    }

    // ── Session keys ─────────────────────────────────────────────────────────

    pub fn set_session_public_key(&mut self, caller: Address, key: &[u8]) -> Result<(), LedgerError> {
        limits::check_session_public_key(key)?;
        let key = SessionPublicKey::from_slice(key)
            .map_err(|e| LedgerError::Validation(e.to_string()))?;
        self.owned_profile_mut(&caller)?;
        self.session_keys.insert(caller, key);
        Ok(())
    }

    pub fn clear_session_public_key(&mut self, caller: Address) -> Result<(), LedgerError> {
        self.owned_profile_mut(&caller)?;
        self.session_keys.remove(&caller);
        Ok(())
    }

    // ── Ownership transfer ───────────────────────────────────────────────────

    /// Move display name, bio, links and session key to `new_owner`, then
    /// delete the source profile. All checks run before anything moves.
    ///
    /// Delegates of the source profile are released: they were authorized by
    /// the old credential. `new_owner` may be one of them.
    pub fn transfer_profile_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), LedgerError> {
        if new_owner.is_zero() {
            return Err(LedgerError::Validation("cannot transfer to the zero address".into()));
        }
        if new_owner == caller {
            return Err(LedgerError::Validation("cannot transfer a profile to its owner".into()));
        }
        self.owned_profile_mut(&caller)?;
        if self.profiles.contains_key(&new_owner) {
            return Err(LedgerError::Conflict(format!("{new_owner} already owns a profile")));
        }
        if let Some(owner) = self.owner_of.get(&new_owner) {
            if *owner != caller {
                return Err(LedgerError::Conflict(format!(
                    "{new_owner} is a delegate of {owner}"
                )));
            }
        }

        let released: Vec<Address> = self
            .delegates
            .get(&caller)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for delegate in &released {
            self.unbind_delegate(&caller, delegate);
        }

        if let Some(profile) = self.profiles.remove(&caller) {
            self.profiles.insert(new_owner, profile);
        }
        if let Some(key) = self.session_keys.remove(&caller) {
            self.session_keys.insert(new_owner, key);
        }
        Ok(())
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    /// The owner `addr` acts for: its delegating owner, else itself if it owns
    /// a profile, else `None`.
    pub fn resolve_to_owner(&self, addr: &Address) -> Option<Address> {
        if let Some(owner) = self.owner_of.get(addr) {
            return Some(*owner);
        }
        self.profiles.contains_key(addr).then_some(*addr)
    }

    pub fn can_act_as(&self, actor: &Address, owner: &Address) -> bool {
        actor == owner || self.owner_of.get(actor) == Some(owner)
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn has_profile(&self, addr: &Address) -> bool {
        self.profiles.contains_key(addr)
    }

    pub fn profile(&self, addr: &Address) -> Option<&Profile> {
        self.profiles.get(addr)
    }

    pub fn get_profile(&self, addr: &Address) -> Result<ProfileView, LedgerError> {
        let profile = self
            .profiles
            .get(addr)
            .ok_or_else(|| LedgerError::NotFound(format!("no profile for {addr}")))?;
        Ok(ProfileView {
            owner: *addr,
            display_name: profile.display_name.clone(),
            bio: profile.bio.clone(),
            links: profile.links.clone(),
            session_public_key: self.session_keys.get(addr).copied(),
            delegates: self.get_delegates(addr),
        })
    }

    pub fn get_links(&self, owner: &Address) -> Result<Vec<Link>, LedgerError> {
        self.profiles
            .get(owner)
            .map(|p| p.links.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("no profile for {owner}")))
    }

    pub fn get_session_public_key(&self, owner: &Address) -> Option<SessionPublicKey> {
        self.session_keys.get(owner).copied()
    }

    pub fn has_session_public_key(&self, owner: &Address) -> bool {
        self.session_keys.contains_key(owner)
    }

    pub fn get_delegates(&self, owner: &Address) -> Vec<Address> {
        self.delegates
            .get(owner)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn get_owner_of(&self, delegate: &Address) -> Option<Address> {
        self.owner_of.get(delegate).copied()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }
}
