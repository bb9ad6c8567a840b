// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Storage port for named sandbox profiles.

use thiserror::Error;

/// Raw storage for profile documents, one per profile name.
pub trait ProfileStore {
    /// Stored document for `profile`, or `None` when it was never saved.
    fn read(&self, profile: &str) -> Result<Option<Vec<u8>>, ConfigError>;
    /// Replace the document for `profile`.
    fn write(&self, profile: &str, data: &[u8]) -> Result<(), ConfigError>;
    /// Names of every stored profile, sorted.
    fn list(&self) -> Result<Vec<String>, ConfigError>;
}

impl<S: ProfileStore + ?Sized> ProfileStore for &S {
    fn read(&self, profile: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        (**self).read(profile)
    }

    fn write(&self, profile: &str, data: &[u8]) -> Result<(), ConfigError> {
        (**self).write(profile, data)
    }

    fn list(&self) -> Result<Vec<String>, ConfigError> {
        (**self).list()
    }
}

/// Why a sandbox profile could not be loaded or saved.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither the override variable nor a home directory is available.
    #[error("no config directory: set UNDERSTUDY_CONFIG_DIR")]
    NoConfigDir,
    /// Names must be non-empty ASCII letters, digits, `-` or `_`.
    #[error("invalid profile name `{0}`")]
    InvalidProfile(String),
    /// The stored document does not parse.
    #[error("profile `{profile}` is malformed: {source}")]
    Malformed {
        /// Profile name.
        profile: String,
        /// Parser error.
        source: serde_json::Error,
    },
    /// Filesystem failure while touching a profile.
    #[error("profile `{profile}`: {source}")]
    Io {
        /// Profile name, or the directory for listings.
        profile: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The backing store refused the operation.
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Reject names that could escape the store or collide with its layout.
pub fn check_profile_name(profile: &str) -> Result<(), ConfigError> {
    let ok = !profile.is_empty()
        && profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidProfile(profile.to_string()))
    }
}
