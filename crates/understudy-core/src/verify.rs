// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Expectation verifier.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::matcher::{args_match, describe, Matcher};
use crate::mock::{CallRange, Expectation, Mock};
use crate::value::Args;

/// Expected-versus-actual detail for one expectation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectationReport {
    /// Member the expectation targets.
    pub member: String,
    /// Allowed call count.
    pub expected_calls: CallRange,
    /// Positional matchers every call must satisfy, if declared.
    pub expected_args: Option<Vec<Matcher>>,
    /// Whether extra arguments are rejected.
    pub exact_arity: bool,
    /// Arguments of every recorded call, in order.
    pub actual_calls: Vec<Args>,
    /// Human-readable reasons the expectation failed; empty when met.
    pub problems: Vec<String>,
}

impl ExpectationReport {
    /// True when nothing went wrong.
    pub fn is_met(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Failed expectations of one mock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmetExpectations {
    /// Mocked surface name.
    pub surface: String,
    /// One report per failed expectation.
    pub reports: Vec<ExpectationReport>,
}

impl fmt::Display for UnmetExpectations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unmet expectations on `{}`", self.surface)?;
        for r in &self.reports {
            write!(f, "\n  {}: expected {}", r.member, r.expected_calls)?;
            if let Some(m) = &r.expected_args {
                write!(f, " with {}", describe(m))?;
            }
            write!(f, ", got {}", r.actual_calls.len())?;
            for p in &r.problems {
                write!(f, "\n    - {p}")?;
            }
            for (i, call) in r.actual_calls.iter().enumerate() {
                let rendered: Vec<String> = call.iter().map(ToString::to_string).collect();
                write!(f, "\n    #{i} [{}]", rendered.join(", "))?;
            }
        }
        Ok(())
    }
}

pub(crate) fn check(expectation: &Expectation) -> ExpectationReport {
    let requirement = expectation.requirement();
    let actual_calls: Vec<Args> = expectation
        .double()
        .calls()
        .into_iter()
        .map(|c| c.args)
        .collect();

    let mut problems = Vec::new();
    if !requirement.calls.contains(actual_calls.len()) {
        problems.push(format!(
            "expected {}, got {}",
            requirement.calls,
            actual_calls.len()
        ));
    }
    if let Some(matchers) = &requirement.args {
        for (i, args) in actual_calls.iter().enumerate() {
            if !args_match(matchers, args, requirement.exact_arity) {
                let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
                problems.push(format!(
                    "call #{i} arguments [{}] do not match {}",
                    rendered.join(", "),
                    describe(matchers)
                ));
            }
        }
    }

    ExpectationReport {
        member: expectation.member().to_string(),
        expected_calls: requirement.calls,
        expected_args: requirement.args,
        exact_arity: requirement.exact_arity,
        actual_calls,
        problems,
    }
}

/// Check every expectation declared on `mock` against its call history.
///
/// Succeeds silently, or fails with [`Error::UnmetExpectation`] listing each
/// failed expectation. Reads history only, so repeated calls agree.
pub fn verify(mock: &Mock<'_>) -> Result<()> {
    let reports: Vec<ExpectationReport> = mock
        .expectations()
        .iter()
        .map(check)
        .filter(|r| !r.is_met())
        .collect();
    if reports.is_empty() {
        return Ok(());
    }
    let unmet = UnmetExpectations {
        surface: mock.surface().name().to_string(),
        reports,
    };
    warn!(surface = %unmet.surface, failed = unmet.reports.len(), "mock verification failed");
    Err(Error::UnmetExpectation(unmet))
}
