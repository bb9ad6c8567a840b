// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy shared by every Understudy crate.

use thiserror::Error;

use crate::verify::UnmetExpectations;

/// Stable failure category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A double was requested for a member that does not exist.
    DoubleTarget,
    /// The member is already patched.
    AlreadyPatched,
    /// Stub behaviors disagree for the same selector.
    ConflictingBehavior,
    /// An unmatched request was refused while real requests are disabled.
    NetworkBlocked,
    /// A virtual clock is already installed.
    ClockAlreadyInstalled,
    /// Mock verification failed.
    UnmetExpectation,
    /// A host or path pattern did not compile.
    InvalidPattern,
    /// The real transport failed.
    Transport,
}

impl ErrorKind {
    /// Kebab-case tag, stable across releases.
    pub fn name(self) -> &'static str {
        match self {
            Self::DoubleTarget => "double-target",
            Self::AlreadyPatched => "already-patched",
            Self::ConflictingBehavior => "conflicting-behavior",
            Self::NetworkBlocked => "network-blocked",
            Self::ClockAlreadyInstalled => "clock-already-installed",
            Self::UnmetExpectation => "unmet-expectation",
            Self::InvalidPattern => "invalid-pattern",
            Self::Transport => "transport",
        }
    }
}

/// Errors raised while configuring, running or verifying doubles.
#[derive(Debug, Error)]
pub enum Error {
    /// No member named `member` on `surface`.
    #[error("cannot double `{surface}.{member}`: no such member")]
    DoubleTarget {
        /// Surface name.
        surface: String,
        /// Requested member.
        member: String,
    },
    /// `surface.member` already carries a double.
    #[error("`{surface}.{member}` is already patched; restore it first")]
    AlreadyPatched {
        /// Surface name.
        surface: String,
        /// Patched member.
        member: String,
    },
    /// A second behavior of a different kind was attached to the same selector.
    #[error("conflicting stub behavior for {selector}: `{existing}` already set, refusing `{requested}`")]
    ConflictingBehavior {
        /// Which calls the behavior applies to.
        selector: String,
        /// Behavior already programmed.
        existing: &'static str,
        /// Behavior that was refused.
        requested: &'static str,
    },
    /// Outbound request refused because no rule matched and real requests are disabled.
    #[error("real network request blocked: {method} {url}")]
    NetworkBlocked {
        /// HTTP method.
        method: String,
        /// Full request URL.
        url: String,
    },
    /// `install` called while a clock is installed.
    #[error("a virtual clock is already installed; restore it first")]
    ClockAlreadyInstalled,
    /// One or more mock expectations were not met.
    #[error("{0}")]
    UnmetExpectation(UnmetExpectations),
    /// Pattern failed to compile.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// Offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
    /// Pass-through request failed at the I/O layer.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Failure category, for assertions that should not depend on message text.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DoubleTarget { .. } => ErrorKind::DoubleTarget,
            Self::AlreadyPatched { .. } => ErrorKind::AlreadyPatched,
            Self::ConflictingBehavior { .. } => ErrorKind::ConflictingBehavior,
            Self::NetworkBlocked { .. } => ErrorKind::NetworkBlocked,
            Self::ClockAlreadyInstalled => ErrorKind::ClockAlreadyInstalled,
            Self::UnmetExpectation(_) => ErrorKind::UnmetExpectation,
            Self::InvalidPattern { .. } => ErrorKind::InvalidPattern,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Shorthand for `self.kind().name()`.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn names_are_stable_kebab_case() {
        let err = Error::NetworkBlocked {
            method: "GET".into(),
            url: "http://x.test/".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NetworkBlocked);
        assert_eq!(err.name(), "network-blocked");
        assert_eq!(Error::ClockAlreadyInstalled.name(), "clock-already-installed");
    }

    #[test]
    fn messages_name_the_member() {
        let err = Error::DoubleTarget {
            surface: "mail-sender".into(),
            member: "sendd".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot double `mail-sender.sendd`: no such member"
        );
    }
}
