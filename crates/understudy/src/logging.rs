// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `tracing` bootstrap for test binaries.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a fmt subscriber that writes through the test harness.
///
/// `RUST_LOG` wins when set; otherwise only warnings are shown. Safe to call
/// from every test: only the first call in a process has any effect.
pub fn init_test_logging() {
    init_with_default("warn");
}

/// Like [`init_test_logging`] with a custom fallback directive.
pub fn init_with_default(directive: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(directive))
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        // Another subscriber may already be set by the host binary.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
