use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// How often the poller asks the ledger for new messages.
    pub poll_interval_secs: u64,
    /// Balance moved to a delegate right after it is authorized.
    pub default_fund_amount: u64,
    /// Keystore file name inside the data directory.
    pub store_file: String,
    /// Vault inactivity timeout; 0 disables auto-lock.
    pub auto_lock_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
            default_fund_amount: 50,
            store_file: "keystore.db".into(),
            auto_lock_secs: 1800,
        }
    }
}

impl ClientSettings {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.store_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = ClientSettings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(s, ClientSettings::default());
        assert_eq!(s.poll_interval_secs, 15);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"poll_interval_secs": 3}"#).unwrap();
        let s = ClientSettings::load(&path).unwrap();
        assert_eq!(s.poll_interval_secs, 3);
        assert_eq!(s.store_file, "keystore.db");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let s = ClientSettings { auto_lock_secs: 0, ..Default::default() };
        s.save(&path).unwrap();
        assert_eq!(ClientSettings::load(&path).unwrap(), s);
    }
}
