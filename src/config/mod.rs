// src/config/mod.rs
//! Runtime configuration: defaults (`consts`), options (`options`) and the
//! validated profile list (`profile`).

pub mod consts;
pub mod options;
pub mod profile;

use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::file::{self, Bootstrap, FileError, JsonFile};
pub use options::MonitorOptions;
pub use profile::{Priority, ProfileSet, SearchProfile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    File(#[from] FileError),
    #[error("'{}' was missing; created it from {origin}. Please edit it and restart", path.display())]
    Bootstrapped { path: PathBuf, origin: String },
    #[error("'{}' is empty", .0.display())]
    Empty(PathBuf),
    #[error("profile config must be a list of search profiles, found {found}")]
    NotAList { found: &'static str },
    #[error("no usable search profiles in '{}'", .0.display())]
    NoProfiles(PathBuf),
}

/// Load and validate the profile list.
///
/// A missing file is created (from `<file>.example` when present) and reported as
/// [`ConfigError::Bootstrapped`]: there is nothing to monitor until the operator edits it.
/// `lowest` is the tier for profiles without a usable `priority`.
pub fn load_profiles(path: &Path, lowest: Priority) -> Result<ProfileSet, ConfigError> {
    let value: serde_json::Value = match file::read_json(path)? {
        JsonFile::Loaded(v) => v,
        JsonFile::Blank => return Err(ConfigError::Empty(path.to_path_buf())),
        JsonFile::Missing => {
            warn!("Config file '{}' not found", path.display());
            let origin = match file::bootstrap_from_template(path, "[]\n")? {
                Bootstrap::FromTemplate(t) => format!("'{}'", t.display()),
                Bootstrap::Fallback => "an empty list".to_string(),
            };
            return Err(ConfigError::Bootstrapped { path: path.to_path_buf(), origin });
        }
    };

    let set = profile::parse_profiles(&value, lowest)?;
    if set.profiles.is_empty() {
        return Err(ConfigError::NoProfiles(path.to_path_buf()));
    }
    info!(
        "{} search profile(s) loaded from '{}' ({} skipped)",
        set.profiles.len(),
        path.display(),
        set.skipped
    );
    Ok(set)
}

/// Load runtime options. The options file is optional; absent or blank means defaults.
pub fn load_options(path: &Path) -> Result<MonitorOptions, ConfigError> {
    match file::read_json(path)? {
        JsonFile::Loaded(opts) => {
            info!("Options loaded from '{}'", path.display());
            Ok(opts)
        }
        JsonFile::Missing | JsonFile::Blank => {
            info!("No options file at '{}'; using defaults", path.display());
            Ok(MonitorOptions::default())
        }
    }
}
