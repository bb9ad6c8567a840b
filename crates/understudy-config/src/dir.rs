// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Profiles as `<name>.json` files in one directory.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::debug;

use crate::store::{check_profile_name, ConfigError, ProfileStore};

/// Overrides the profile directory.
pub const CONFIG_DIR_ENV: &str = "UNDERSTUDY_CONFIG_DIR";

/// Directory of profile documents. Nothing is created until the first write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    /// `$UNDERSTUDY_CONFIG_DIR` when set, else the platform config dir
    /// (e.g. `~/.config/understudy`).
    pub fn discover() -> Result<Self, ConfigError> {
        Self::discover_from(std::env::var_os(CONFIG_DIR_ENV))
    }

    /// [`DirStore::discover`] with an explicit override value.
    pub fn discover_from(override_dir: Option<OsString>) -> Result<Self, ConfigError> {
        if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
            return Ok(Self::at(dir));
        }
        let proj =
            ProjectDirs::from("dev", "flyingrobots", "Understudy").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::at(proj.config_dir()))
    }

    /// Store rooted at `dir`.
    pub fn at(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `profile`.
    pub fn path_for(&self, profile: &str) -> Result<PathBuf, ConfigError> {
        check_profile_name(profile)?;
        Ok(self.dir.join(format!("{profile}.json")))
    }
}

fn io_error(profile: &str, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        profile: profile.to_string(),
        source,
    }
}

impl ProfileStore for DirStore {
    fn read(&self, profile: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        let path = self.path_for(profile)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(profile, err)),
        }
    }

    fn write(&self, profile: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(profile)?;
        fs::create_dir_all(&self.dir).map_err(|e| io_error(profile, e))?;
        fs::write(&path, data).map_err(|e| io_error(profile, e))?;
        debug!(path = %path.display(), "profile written");
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, ConfigError> {
        let listing = self.dir.display().to_string();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&listing, err)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(&listing, e))?.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if check_profile_name(stem).is_ok() {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_platform_dir() {
        let store = DirStore::discover_from(Some("/tmp/understudy-profiles".into()));
        assert_eq!(
            store.ok().map(|s| s.dir().to_path_buf()),
            Some(PathBuf::from("/tmp/understudy-profiles"))
        );
    }

    #[test]
    fn empty_override_falls_back() {
        if let Ok(store) = DirStore::discover_from(Some(OsString::new())) {
            assert!(store.dir().is_absolute());
        }
    }

    #[test]
    fn paths_reject_traversal() {
        let store = DirStore::at("/srv/profiles");
        assert!(store.path_for("../secrets").is_err());
        assert_eq!(
            store.path_for("ci").ok(),
            Some(PathBuf::from("/srv/profiles/ci.json"))
        );
    }
}
