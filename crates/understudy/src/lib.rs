// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Test doubles for Rust: spies, stubs and mocks over swappable
//! [`Surface`]s, outbound request interception and a virtual clock.
//!
//! Every test that touches process-wide state enters a [`Sandbox`]. The
//! sandbox serializes such tests and, when dropped, restores every patched
//! member, clears intercept rules, re-enables real requests and uninstalls
//! the virtual clock, even if the test panicked.
//!
//! ```ignore
//! let sb = Sandbox::new();
//! let mail = sb.stub(&mail_sender, "send")?;
//! mail.returns(json!({"delivered": true}))?;
//! run_workflow().await?;
//! assert_eq!(mail.call_count(), 1);
//! ```
//!
//! # Modules
//!
//! - [`sandbox`] - Per-test guard with guaranteed teardown
//! - [`logging`] - `tracing` bootstrap for test binaries
#![forbid(unsafe_code)]

pub mod logging;
pub mod sandbox;

pub use logging::init_test_logging;
pub use sandbox::Sandbox;

pub use understudy_clock as clock;
pub use understudy_config as config;
pub use understudy_net as net;

pub use understudy_clock::{TimeSource, TimerId, VirtualClock};
pub use understudy_core::{
    args, callable, json, verify, Args, CallRange, Callable, Double, DoubleKind, Error, ErrorKind,
    Expectation, ExpectationReport, Fault, Identity, Invocation, Matcher, Mock, Outcome,
    PatchManager, Recorder, Result, StubRule, Surface, SurfaceBuilder, SurfaceId,
    UnmetExpectations, Value, ValueKind,
};
pub use understudy_net::{Interceptor, Method, PathMatcher, Request, Response};
