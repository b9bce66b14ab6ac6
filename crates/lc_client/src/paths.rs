use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const APP_QUALIFIER: &str = "io";
pub const APP_ORG: &str = "ledgerchat";
pub const APP_NAME: &str = "ledgerchat";

/// Environment override for the data directory.
pub const DATA_DIR_ENV: &str = "LEDGERCHAT_DATA_DIR";

pub const SETTINGS_FILE: &str = "settings.json";
pub const LEDGER_SNAPSHOT_FILE: &str = "ledger.json";

pub fn data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(override_path) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(override_path));
    }
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| anyhow::anyhow!("cannot determine data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}

/// `explicit` (from a command-line flag) wins over the environment and the
/// platform default.
pub fn resolve_data_dir(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => data_dir(),
    }
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

pub fn ledger_snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LEDGER_SNAPSHOT_FILE)
}
