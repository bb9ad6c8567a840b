// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Intercept rules and their matchers.

use std::fmt;

use regex::Regex;
use serde::Serialize;
use understudy_core::{Error, Result};

use crate::request::{Method, Request, Response};

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Which origins a rule applies to.
#[derive(Debug, Clone)]
pub enum HostPattern {
    /// `scheme://host[:port]`, compared case-insensitively, trailing slash ignored.
    Exact(String),
    /// Searched in the request origin.
    Regex(Regex),
}

impl HostPattern {
    /// Exact origin.
    pub fn exact(origin: &str) -> Self {
        Self::Exact(origin.trim_end_matches('/').to_ascii_lowercase())
    }

    /// Compile a regex pattern.
    pub fn regex(pattern: &str) -> Result<Self> {
        compile(pattern).map(Self::Regex)
    }

    /// True if `origin` is covered.
    pub fn matches(&self, origin: &str) -> bool {
        match self {
            Self::Exact(o) => o == origin,
            Self::Regex(r) => r.is_match(origin),
        }
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(o) => f.write_str(o),
            Self::Regex(r) => write!(f, "/{}/", r.as_str()),
        }
    }
}

/// Which paths a rule applies to.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// Equal to the path without its query string.
    Literal(String),
    /// Searched in the path including the query string.
    Regex(Regex),
}

impl PathMatcher {
    /// Compile a regex path matcher.
    pub fn regex(pattern: &str) -> Result<Self> {
        compile(pattern).map(Self::Regex)
    }

    /// True if `request`'s path is covered.
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            Self::Literal(p) => p == request.path_only(),
            Self::Regex(r) => r.is_match(&request.path),
        }
    }
}

impl From<&str> for PathMatcher {
    fn from(path: &str) -> Self {
        Self::Literal(path.to_string())
    }
}

impl From<Regex> for PathMatcher {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

impl fmt::Display for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(p) => f.write_str(p),
            Self::Regex(r) => write!(f, "/{}/", r.as_str()),
        }
    }
}

/// How many more requests a rule answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    /// Never exhausted.
    Unlimited,
    /// Removed once this reaches zero.
    Remaining(usize),
}

/// Opaque id of a registered rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RuleId(pub u64);

/// A registered pattern and its canned response.
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) id: RuleId,
    pub(crate) host: HostPattern,
    pub(crate) method: Method,
    pub(crate) path: PathMatcher,
    pub(crate) response: Response,
    pub(crate) remaining: Times,
    pub(crate) hits: usize,
}

impl Rule {
    /// Rule id.
    pub fn id(&self) -> RuleId {
        self.id
    }

    /// Uses left.
    pub fn remaining(&self) -> Times {
        self.remaining
    }

    /// Requests answered so far.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// True once no uses are left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Times::Remaining(0)
    }

    /// True if this rule covers `request`. An exhausted rule covers nothing.
    pub fn matches(&self, request: &Request) -> bool {
        !self.is_exhausted()
            && self.method == request.method
            && self.host.matches(&request.origin)
            && self.path.matches(request)
    }

    /// Count one use. Returns `true` when the rule is now exhausted.
    pub(crate) fn consume(&mut self) -> bool {
        self.hits += 1;
        match &mut self.remaining {
            Times::Unlimited => false,
            Times::Remaining(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{} -> {}",
            self.method, self.host, self.path, self.response.status
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(host: HostPattern, method: Method, path: PathMatcher, times: Times) -> Rule {
        Rule {
            id: RuleId(1),
            host,
            method,
            path,
            response: Response::new(200, json!({"status": "all-good"})),
            remaining: times,
            hits: 0,
        }
    }

    #[test]
    fn regex_path_matches_dynamic_upload_path() {
        let r = rule(
            HostPattern::exact("http://like-youtube.com/"),
            Method::Post,
            PathMatcher::regex("upload.*$").unwrap(),
            Times::Unlimited,
        );
        assert!(r.matches(&Request::post("http://like-youtube.com/upload/42?token=x").unwrap()));
        assert!(!r.matches(&Request::get("http://like-youtube.com/upload/42").unwrap()));
        assert!(!r.matches(&Request::post("http://other.com/upload/42").unwrap()));
    }

    #[test]
    fn literal_path_ignores_query() {
        let r = rule(
            HostPattern::regex(r"^https?://api\.").unwrap(),
            Method::Get,
            "/v1/me".into(),
            Times::Unlimited,
        );
        assert!(r.matches(&Request::get("https://api.example.com/v1/me?x=1").unwrap()));
        assert!(!r.matches(&Request::get("https://api.example.com/v1/me/extra").unwrap()));
    }

    #[test]
    fn finite_rule_exhausts() {
        let mut r = rule(
            HostPattern::exact("http://h"),
            Method::Get,
            "/".into(),
            Times::Remaining(2),
        );
        let req = Request::get("http://h/").unwrap();
        assert!(!r.consume());
        assert!(r.consume());
        assert_eq!(r.hits(), 2);
        assert!(r.is_exhausted());
        assert!(!r.matches(&req));
        assert_eq!(r.to_string(), "GET http://h/ -> 200");
    }

    #[test]
    fn bad_regex_is_reported() {
        let err = PathMatcher::regex("upload(").unwrap_err();
        assert_eq!(err.name(), "invalid-pattern");
    }
}
