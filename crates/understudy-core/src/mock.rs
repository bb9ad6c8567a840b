// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mocks: declarative expectations on named members of a surface.
//!
//! ```
//! use understudy_core::{args, Matcher, Mock, PatchManager, Surface};
//! use serde_json::json;
//!
//! let data_access = Surface::builder("data-access")
//!     .member("save", |_| Ok(json!(true)))
//!     .build();
//! let patches = PatchManager::new();
//! let mock = Mock::with_manager(&patches, &data_access);
//! mock.expects("save")
//!     .unwrap()
//!     .exactly(1)
//!     .with_exact_args(vec![Matcher::object(), Matcher::exact(true), Matcher::string()])
//!     .returns(false)
//!     .unwrap();
//!
//! data_access.call("save", &args![json!({"id": 1}), true, "token"]).unwrap();
//! assert!(mock.verify().is_ok());
//! patches.restore_all();
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;

use crate::double::Double;
use crate::error::{Error, Result};
use crate::matcher::Matcher;
use crate::patch::PatchManager;
use crate::surface::Surface;
use crate::value::Fault;

/// Allowed number of calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallRange {
    /// Inclusive lower bound.
    pub min: usize,
    /// Inclusive upper bound; `None` is unbounded.
    pub max: Option<usize>,
}

impl CallRange {
    /// Exactly `n` calls.
    pub fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    /// True if `count` lies within the range.
    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

impl fmt::Display for CallRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "call" } else { "calls" };
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {max} {}", plural(max)),
            Some(max) if self.min == 0 => write!(f, "at most {max} {}", plural(max)),
            Some(max) => write!(f, "between {} and {max} calls", self.min),
            None => write!(f, "at least {} {}", self.min, plural(self.min)),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Requirement {
    pub(crate) calls: CallRange,
    pub(crate) args: Option<Vec<Matcher>>,
    pub(crate) exact_arity: bool,
    limits_set: bool,
}

impl Default for Requirement {
    fn default() -> Self {
        Self {
            calls: CallRange::exactly(1),
            args: None,
            exact_arity: false,
            limits_set: false,
        }
    }
}

/// One declared expectation. Methods chain by reference.
#[derive(Clone)]
pub struct Expectation {
    member: String,
    double: Double,
    requirement: Arc<Mutex<Requirement>>,
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("member", &self.member)
            .field("requirement", &self.requirement())
            .finish()
    }
}

impl Expectation {
    fn edit(&self, f: impl FnOnce(&mut Requirement)) -> &Self {
        f(&mut self.requirement.lock().unwrap_or_else(|e| e.into_inner()));
        self
    }

    pub(crate) fn requirement(&self) -> Requirement {
        self.requirement.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Member this expectation is about.
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The mock double installed on the member.
    pub fn double(&self) -> &Double {
        &self.double
    }

    /// Expect exactly `n` calls.
    pub fn exactly(&self, n: usize) -> &Self {
        self.edit(|s| {
            s.calls = CallRange::exactly(n);
            s.limits_set = true;
        })
    }

    /// Expect exactly one call.
    pub fn once(&self) -> &Self {
        self.exactly(1)
    }

    /// Expect exactly two calls.
    pub fn twice(&self) -> &Self {
        self.exactly(2)
    }

    /// Expect no calls.
    pub fn never(&self) -> &Self {
        self.exactly(0)
    }

    /// Expect `n` or more calls.
    pub fn at_least(&self, n: usize) -> &Self {
        self.edit(|s| {
            if !s.limits_set {
                s.calls.max = None;
                s.limits_set = true;
            }
            s.calls.min = n;
        })
    }

    /// Expect `n` or fewer calls.
    pub fn at_most(&self, n: usize) -> &Self {
        self.edit(|s| {
            if !s.limits_set {
                s.calls.min = 0;
                s.limits_set = true;
            }
            s.calls.max = Some(n);
        })
    }

    /// Every call's leading arguments must satisfy `matchers`.
    pub fn with_args(&self, matchers: Vec<Matcher>) -> &Self {
        self.edit(|s| {
            s.args = Some(matchers);
            s.exact_arity = false;
        })
    }

    /// Every call's arguments must satisfy `matchers`, with no extra arguments.
    pub fn with_exact_args(&self, matchers: Vec<Matcher>) -> &Self {
        self.edit(|s| {
            s.args = Some(matchers);
            s.exact_arity = true;
        })
    }

    /// Value supplied to callers.
    pub fn returns(&self, value: impl Into<Value>) -> Result<&Self> {
        self.double.returns(value)?;
        Ok(self)
    }

    /// Value supplied to async callers after a suspension.
    pub fn resolves(&self, value: impl Into<Value>) -> Result<&Self> {
        self.double.resolves(value)?;
        Ok(self)
    }

    /// Fault raised to callers.
    pub fn throws(&self, fault: Fault) -> Result<&Self> {
        self.double.throws(fault)?;
        Ok(self)
    }

    /// Fault raised to async callers after a suspension.
    pub fn rejects(&self, fault: Fault) -> Result<&Self> {
        self.double.rejects(fault)?;
        Ok(self)
    }
}

/// Expectation builder over a surface.
///
/// Members are patched lazily, the first time [`Mock::expects`] names them;
/// members never named keep their real implementation.
pub struct Mock<'m> {
    manager: &'m PatchManager,
    surface: Arc<Surface>,
    expectations: Mutex<Vec<Expectation>>,
}

impl fmt::Debug for Mock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("surface", &self.surface.name())
            .field("expectations", &self.expectations())
            .finish()
    }
}

impl Mock<'static> {
    /// Mock `surface` through the process-wide [`PatchManager`].
    pub fn new(surface: &Arc<Surface>) -> Self {
        Self::with_manager(PatchManager::global(), surface)
    }
}

impl<'m> Mock<'m> {
    /// Mock `surface` through `manager`.
    pub fn with_manager(manager: &'m PatchManager, surface: &Arc<Surface>) -> Self {
        Self {
            manager,
            surface: Arc::clone(surface),
            expectations: Mutex::new(Vec::new()),
        }
    }

    /// The mocked surface.
    pub fn surface(&self) -> &Arc<Surface> {
        &self.surface
    }

    /// Declare (or fetch) the expectation for `member`.
    ///
    /// Defaults to exactly one call with any arguments.
    pub fn expects(&self, member: &str) -> Result<Expectation> {
        let mut expectations = self.expectations.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = expectations.iter().find(|e| e.member == member) {
            return Ok(existing.clone());
        }
        if !self.surface.has_member(member) {
            return Err(Error::DoubleTarget {
                surface: self.surface.name().to_string(),
                member: member.to_string(),
            });
        }
        let double = self.manager.mock_member(&self.surface, member)?;
        let expectation = Expectation {
            member: member.to_string(),
            double,
            requirement: Arc::new(Mutex::new(Requirement::default())),
        };
        expectations.push(expectation.clone());
        Ok(expectation)
    }

    /// Every declared expectation, in declaration order.
    pub fn expectations(&self) -> Vec<Expectation> {
        self.expectations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Check all expectations; see [`verify`](crate::verify()).
    pub fn verify(&self) -> Result<()> {
        crate::verify::verify(self)
    }

    /// Put back the real members this mock replaced. Returns how many were restored.
    pub fn restore(&self) -> usize {
        self.expectations()
            .iter()
            .filter(|e| self.manager.restore(&self.surface, &e.member))
            .count()
    }
}
