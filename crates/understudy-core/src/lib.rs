// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Core of Understudy: test doubles for collaborators reached through a
//! redirection table.
//!
//! # Modules
//!
//! - [`value`] - Values, faults, invocations and the `Callable` member shape
//! - [`matcher`] - Positional argument matchers
//! - [`recorder`] - Per-double invocation history
//! - [`double`] - Spies, stubs and mock doubles
//! - [`surface`] - Objects/modules whose members can be swapped at runtime
//! - [`patch`] - Install and restore doubles on surfaces
//! - [`mock`] - Declarative expectations
//! - [`verify`] - Expectation verifier
//! - [`error`] - Error taxonomy with stable kind names
#![forbid(unsafe_code)]

pub mod double;
pub mod error;
pub mod matcher;
pub mod mock;
pub mod patch;
pub mod recorder;
pub mod surface;
pub mod value;
pub mod verify;

pub use double::{Double, DoubleKind, Identity, StubRule};
pub use error::{Error, ErrorKind, Result};
pub use matcher::{Matcher, ValueKind};
pub use mock::{CallRange, Expectation, Mock};
pub use patch::PatchManager;
pub use recorder::Recorder;
pub use surface::{Surface, SurfaceBuilder, SurfaceId};
pub use value::{callable, Args, Callable, Fault, Invocation, Outcome};
pub use verify::{verify, ExpectationReport, UnmetExpectations};

pub use serde_json::{json, Value};
