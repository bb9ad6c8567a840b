// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-test guard over the process-wide patch manager, interceptor and clock.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use understudy_clock::VirtualClock;
use understudy_config::{selected_profile, ConfigError, ProfileStore, Profiles, SandboxPrefs};
use understudy_core::{Double, Mock, PatchManager, Result, Surface};
use understudy_net::{Interceptor, Scope};

use crate::logging;

static SERIAL: Mutex<()> = Mutex::new(());

/// Exclusive access to process-wide test state for the lifetime of a test.
///
/// Dropping the sandbox restores every patched member, removes intercept
/// rules and history, re-enables real requests and uninstalls the virtual
/// clock. Teardown runs on every exit path, panics included.
pub struct Sandbox {
    prefs: SandboxPrefs,
    _serial: MutexGuard<'static, ()>,
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("prefs", &self.prefs)
            .finish_non_exhaustive()
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    /// Enter with the selected profile from the discovered config directory.
    ///
    /// A missing or unreadable profile falls back to defaults (network
    /// blocked unless `UNDERSTUDY_ALLOW_NET=1`).
    pub fn new() -> Self {
        let profile = selected_profile();
        let prefs = match Profiles::discover() {
            Ok(profiles) => profiles.load_or_default(&profile),
            Err(err) => {
                warn!(%err, "sandbox profiles unavailable; using defaults");
                SandboxPrefs::default().with_env_overrides()
            }
        };
        Self::with_prefs(prefs)
    }

    /// Enter with `profile` from `profiles`.
    pub fn from_profile<S: ProfileStore>(
        profiles: &Profiles<S>,
        profile: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self::with_prefs(profiles.load(profile)?))
    }

    /// Enter with explicit prefs. Blocks until no other sandbox is live.
    pub fn with_prefs(prefs: SandboxPrefs) -> Self {
        logging::init_with_default(&prefs.log_filter);
        let serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        if prefs.block_real_requests {
            Interceptor::global().disable_real_requests();
        } else {
            Interceptor::global().allow_real_requests();
        }
        debug!(block_real = prefs.block_real_requests, "sandbox entered");
        Self {
            prefs,
            _serial: serial,
        }
    }

    /// Prefs this sandbox was entered with.
    pub fn prefs(&self) -> &SandboxPrefs {
        &self.prefs
    }

    /// Process-wide patch manager.
    pub fn patches(&self) -> &'static PatchManager {
        PatchManager::global()
    }

    /// Process-wide interceptor.
    pub fn net(&self) -> &'static Interceptor {
        Interceptor::global()
    }

    /// Process-wide virtual clock.
    pub fn clock(&self) -> &'static VirtualClock {
        VirtualClock::global()
    }

    /// Wrap `surface.member` in a forwarding spy.
    pub fn spy(&self, surface: &Arc<Surface>, member: &str) -> Result<Double> {
        self.patches().spy_member(surface, member)
    }

    /// Replace `surface.member` with a stub.
    pub fn stub(&self, surface: &Arc<Surface>, member: &str) -> Result<Double> {
        self.patches().stub_member(surface, member)
    }

    /// Start a mock over `surface`.
    pub fn mock(&self, surface: &Arc<Surface>) -> Mock<'static> {
        Mock::new(surface)
    }

    /// Start declaring intercept rules for `origin`.
    pub fn intercept(&self, origin: &str) -> Scope<'static> {
        self.net().intercept(origin)
    }

    /// Install the virtual clock at `start`.
    pub fn install_clock(&self, start: DateTime<Utc>) -> Result<()> {
        self.clock().install(start)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        let restored = PatchManager::global().restore_all();
        let net = Interceptor::global();
        let pending = net.pending_rules();
        if !pending.is_empty() {
            info!(?pending, "intercept rules never used");
        }
        let rules = net.clear_rules();
        net.clear_history();
        net.allow_real_requests();
        let clock = VirtualClock::global().restore();
        debug!(restored, rules, clock, "sandbox torn down");
    }
}
