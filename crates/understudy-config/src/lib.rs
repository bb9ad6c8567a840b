// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Named sandbox profiles: the preference record, a storage port, and a
//! directory-backed store found through `UNDERSTUDY_CONFIG_DIR` or the
//! platform config dir.
#![forbid(unsafe_code)]

pub mod dir;
pub mod prefs;
pub mod profiles;
pub mod store;

pub use dir::{DirStore, CONFIG_DIR_ENV};
pub use prefs::{SandboxPrefs, ALLOW_NET_ENV};
pub use profiles::{selected_profile, Profiles, DEFAULT_PROFILE, PROFILE_ENV};
pub use store::{check_profile_name, ConfigError, ProfileStore};
