// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory profile store fake for sandbox prefs without filesystem I/O.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use understudy::config::{ConfigError, ProfileStore, Profiles, SandboxPrefs};

/// In-memory [`ProfileStore`] that counts traffic and can be told to fail.
///
/// Clones share state, so a test can keep one handle for inspection and hand
/// another to [`Profiles`].
///
/// ```
/// use understudy::config::{Profiles, SandboxPrefs};
/// use understudy_fixtures::InMemoryProfileStore;
///
/// let store = InMemoryProfileStore::new();
/// Profiles::new(store.clone()).save("ci", &SandboxPrefs::default()).unwrap();
/// assert_eq!(store.write_count(), 1);
/// assert!(store.contains("ci"));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: BTreeMap<String, Vec<u8>>,
    read_count: usize,
    write_count: usize,
    fail_reads: bool,
    fail_writes: bool,
}

impl InMemoryProfileStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store already holding `prefs` under `profile`.
    pub fn with_profile(profile: &str, prefs: &SandboxPrefs) -> Result<Self, ConfigError> {
        let store = Self::new();
        Profiles::new(store.clone()).save(profile, prefs)?;
        store.lock().write_count = 0;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make every write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Attempted reads, failures included.
    pub fn read_count(&self) -> usize {
        self.lock().read_count
    }

    /// Attempted writes, failures included.
    pub fn write_count(&self) -> usize {
        self.lock().write_count
    }

    /// True if `profile` holds a document.
    pub fn contains(&self, profile: &str) -> bool {
        self.lock().data.contains_key(profile)
    }

    /// Stored document for `profile`, bypassing the counters.
    pub fn raw(&self, profile: &str) -> Option<Vec<u8>> {
        self.lock().data.get(profile).cloned()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn read(&self, profile: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        let mut inner = self.lock();
        inner.read_count += 1;
        if inner.fail_reads {
            return Err(ConfigError::Unavailable("simulated read failure".into()));
        }
        Ok(inner.data.get(profile).cloned())
    }

    fn write(&self, profile: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.lock();
        inner.write_count += 1;
        if inner.fail_writes {
            return Err(ConfigError::Unavailable("simulated write failure".into()));
        }
        inner.data.insert(profile.to_string(), data.to_vec());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, ConfigError> {
        Ok(self.lock().data.keys().cloned().collect())
    }
}
