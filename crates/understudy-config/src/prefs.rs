// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sandbox preference record and its environment overrides.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable that re-enables real network requests when set to `1`.
pub const ALLOW_NET_ENV: &str = "UNDERSTUDY_ALLOW_NET";

/// Defaults applied when a sandbox is entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxPrefs {
    /// Refuse requests no intercept rule matches.
    pub block_real_requests: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for SandboxPrefs {
    fn default() -> Self {
        Self {
            block_real_requests: true,
            log_filter: "warn".to_string(),
        }
    }
}

impl SandboxPrefs {
    /// Apply [`ALLOW_NET_ENV`] from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        let value = std::env::var(ALLOW_NET_ENV).ok();
        self.with_allow_net(value.as_deref())
    }

    /// Apply an explicit value of [`ALLOW_NET_ENV`].
    #[must_use]
    pub fn with_allow_net(mut self, value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1" | "true") => {
                debug!("{ALLOW_NET_ENV} set; real requests allowed");
                self.block_real_requests = false;
            }
            Some("0" | "false") => self.block_real_requests = true,
            _ => {}
        }
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_block_the_network() {
        let p = SandboxPrefs::default();
        assert!(p.block_real_requests);
        assert_eq!(p.log_filter, "warn");
    }

    #[test]
    fn allow_net_flips_posture() {
        assert!(!SandboxPrefs::default().with_allow_net(Some("1")).block_real_requests);
        assert!(SandboxPrefs::default().with_allow_net(Some("yes?")).block_real_requests);
        let open = SandboxPrefs {
            block_real_requests: false,
            ..SandboxPrefs::default()
        };
        assert!(open.with_allow_net(Some("0")).block_real_requests);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let p: SandboxPrefs = serde_json::from_str(r#"{"log_filter":"debug"}"#).unwrap();
        assert!(p.block_real_requests);
        assert_eq!(p.log_filter, "debug");
    }
}
