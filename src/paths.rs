//! Path resolution for strata
//!
//! # Environment Variables
//!
//! - `STRATA_STATE_DIR` - Override state directory
//! - `STRATA_FILE` - Override the declaration file (also `--file`)
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `STRATA_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/strata` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\strata`
//!    - macOS/Linux: `~/.local/state/strata`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "STRATA_STATE_DIR";

/// Environment variable for the declaration file
pub const ENV_FILE: &str = "STRATA_FILE";

/// Default declaration file name, looked up in the working directory
pub const DEFAULT_FILE: &str = "strata.toml";

/// Name of the state file inside the state directory
pub const STATE_FILE: &str = "state.toml";

/// Get the strata state directory path
pub fn state_dir() -> Result<PathBuf> {
    resolve_state_dir(
        std::env::var(ENV_STATE_DIR).ok(),
        std::env::var("XDG_STATE_HOME").ok(),
    )
}

fn resolve_state_dir(override_dir: Option<String>, xdg_state: Option<String>) -> Result<PathBuf> {
    // 1. Check environment variable override
    if let Some(dir) = override_dir {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    // 2. Check XDG_STATE_HOME
    if let Some(xdg_state) = xdg_state {
        let path = PathBuf::from(xdg_state).join("strata");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    // 3. Platform default
    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join("strata");
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join("strata");
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Path of the state file under a state directory
pub fn state_file(state_dir: &Path) -> PathBuf {
    state_dir.join(STATE_FILE)
}

/// Root directory for simulated bucket contents
pub fn objects_dir(state_dir: &Path) -> PathBuf {
    state_dir.join("objects")
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
