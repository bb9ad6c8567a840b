// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Named [`SandboxPrefs`] documents on top of a [`ProfileStore`].

use tracing::{debug, warn};

use crate::dir::DirStore;
use crate::prefs::SandboxPrefs;
use crate::store::{check_profile_name, ConfigError, ProfileStore};

/// Profile used when [`PROFILE_ENV`] is unset.
pub const DEFAULT_PROFILE: &str = "sandbox";

/// Environment variable naming the profile a sandbox loads.
pub const PROFILE_ENV: &str = "UNDERSTUDY_PROFILE";

/// Profile named by [`PROFILE_ENV`], or [`DEFAULT_PROFILE`].
pub fn selected_profile() -> String {
    std::env::var(PROFILE_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}

/// Loads and saves sandbox profiles as JSON.
#[derive(Debug, Clone)]
pub struct Profiles<S> {
    store: S,
}

impl Profiles<DirStore> {
    /// Profiles in the discovered config directory.
    pub fn discover() -> Result<Self, ConfigError> {
        Ok(Self::new(DirStore::discover()?))
    }
}

impl<S: ProfileStore> Profiles<S> {
    /// Wrap `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The stored document, without defaults or environment overrides.
    /// An empty document counts as missing.
    pub fn stored(&self, profile: &str) -> Result<Option<SandboxPrefs>, ConfigError> {
        check_profile_name(profile)?;
        match self.store.read(profile)? {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => {
                serde_json::from_slice(&bytes)
                    .map(Some)
                    .map_err(|source| ConfigError::Malformed {
                        profile: profile.to_string(),
                        source,
                    })
            }
            _ => Ok(None),
        }
    }

    /// Prefs a sandbox entering `profile` should use: the stored document
    /// (or defaults) with [`SandboxPrefs::with_env_overrides`] applied.
    pub fn load(&self, profile: &str) -> Result<SandboxPrefs, ConfigError> {
        let stored = self.stored(profile)?;
        if stored.is_none() {
            debug!(profile, "profile not stored; using defaults");
        }
        Ok(stored.unwrap_or_default().with_env_overrides())
    }

    /// [`Profiles::load`], degrading to env-adjusted defaults on any error.
    pub fn load_or_default(&self, profile: &str) -> SandboxPrefs {
        self.load(profile).unwrap_or_else(|err| {
            warn!(profile, %err, "ignoring unusable sandbox profile");
            SandboxPrefs::default().with_env_overrides()
        })
    }

    /// Persist `prefs` under `profile`.
    pub fn save(&self, profile: &str, prefs: &SandboxPrefs) -> Result<(), ConfigError> {
        check_profile_name(profile)?;
        let data = serde_json::to_vec_pretty(prefs).map_err(|source| ConfigError::Malformed {
            profile: profile.to_string(),
            source,
        })?;
        self.store.write(profile, &data)
    }

    /// Stored profile names, sorted.
    pub fn names(&self) -> Result<Vec<String>, ConfigError> {
        self.store.list()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MapStore(RefCell<BTreeMap<String, Vec<u8>>>);

    impl ProfileStore for MapStore {
        fn read(&self, profile: &str) -> Result<Option<Vec<u8>>, ConfigError> {
            Ok(self.0.borrow().get(profile).cloned())
        }

        fn write(&self, profile: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(profile.to_string(), data.to_vec());
            Ok(())
        }

        fn list(&self) -> Result<Vec<String>, ConfigError> {
            Ok(self.0.borrow().keys().cloned().collect())
        }
    }

    #[test]
    fn missing_and_blank_profiles_are_not_stored() {
        let profiles = Profiles::new(MapStore::default());
        assert!(profiles.stored("sandbox").unwrap().is_none());
        profiles.store().write("blank", b" \n").unwrap();
        assert!(profiles.stored("blank").unwrap().is_none());
    }

    #[test]
    fn corrupt_profile_is_malformed_and_named() {
        let profiles = Profiles::new(MapStore::default());
        profiles.store().write("ci", b"{not json").unwrap();
        let err = profiles.stored("ci").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
        assert!(err.to_string().contains("`ci`"));
    }

    #[test]
    fn saved_profiles_load_back_and_list() {
        let store = MapStore::default();
        let profiles = Profiles::new(&store);
        let open = SandboxPrefs {
            block_real_requests: false,
            log_filter: "debug".into(),
        };
        profiles.save("online", &open).unwrap();
        profiles.save(DEFAULT_PROFILE, &SandboxPrefs::default()).unwrap();
        assert_eq!(profiles.stored("online").unwrap(), Some(open));
        assert_eq!(profiles.names().unwrap(), vec!["online", "sandbox"]);
    }

    #[test]
    fn invalid_names_are_refused_before_the_store() {
        let profiles = Profiles::new(MapStore::default());
        assert!(matches!(
            profiles.save("../x", &SandboxPrefs::default()),
            Err(ConfigError::InvalidProfile(_))
        ));
        assert!(profiles.store().0.borrow().is_empty());
    }

    #[test]
    fn unusable_profile_degrades_to_defaults() {
        let profiles = Profiles::new(MapStore::default());
        profiles.store().write("broken", b"[1, 2").unwrap();
        let prefs = profiles.load_or_default("broken");
        assert_eq!(prefs.log_filter, "warn");
    }
}
