// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Argument matchers: exact values, type predicates, wildcards and containment.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON type of a value, used by [`Matcher::Kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Any number.
    Number,
    /// Any string.
    String,
    /// Any array.
    Array,
    /// Any object.
    Object,
}

impl ValueKind {
    /// Classify a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// A positional argument predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", content = "value", rename_all = "snake_case")]
pub enum Matcher {
    /// Always matches.
    Any,
    /// Matches an equal value.
    Exact(Value),
    /// Matches any value of the given JSON type.
    Kind(ValueKind),
    /// Matches objects that contain every key of the pattern (recursively) and
    /// arrays that contain every pattern element.
    Subset(Value),
}

impl Matcher {
    /// Wildcard.
    pub fn any() -> Self {
        Self::Any
    }

    /// Equality with `value`.
    pub fn exact(value: impl Into<Value>) -> Self {
        Self::Exact(value.into())
    }

    /// Any string.
    pub fn string() -> Self {
        Self::Kind(ValueKind::String)
    }

    /// Any number.
    pub fn number() -> Self {
        Self::Kind(ValueKind::Number)
    }

    /// Any boolean.
    pub fn bool() -> Self {
        Self::Kind(ValueKind::Bool)
    }

    /// Any object.
    pub fn object() -> Self {
        Self::Kind(ValueKind::Object)
    }

    /// Any array.
    pub fn array() -> Self {
        Self::Kind(ValueKind::Array)
    }

    /// Containment of `pattern`.
    pub fn subset(pattern: impl Into<Value>) -> Self {
        Self::Subset(pattern.into())
    }

    /// Evaluate against one argument.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => same_value(expected, value),
            Self::Kind(kind) => ValueKind::of(value) == *kind,
            Self::Subset(pattern) => contains(value, pattern),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Exact(v) => write!(f, "{v}"),
            Self::Kind(k) => write!(f, "any {}", k.label()),
            Self::Subset(v) => write!(f, "containing {v}"),
        }
    }
}

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        Self::Exact(value)
    }
}

fn contains(value: &Value, pattern: &Value) -> bool {
    match (value, pattern) {
        (Value::Object(have), Value::Object(want)) => want
            .iter()
            .all(|(k, w)| have.get(k).is_some_and(|h| contains(h, w))),
        (Value::Array(have), Value::Array(want)) => {
            want.iter().all(|w| have.iter().any(|h| contains(h, w)))
        }
        _ => same_value(value, pattern),
    }
}

/// JSON equality where numbers compare by value, so `1` equals `1.0`.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => same_number(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| same_value(x, y)))
        }
        _ => a == b,
    }
}

#[allow(clippy::float_cmp)]
fn same_number(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Compare `args` against `matchers` positionally.
///
/// With `exact_arity` the lengths must agree; otherwise `matchers` only has to
/// cover a prefix of `args`.
pub fn args_match(matchers: &[Matcher], args: &[Value], exact_arity: bool) -> bool {
    if exact_arity && matchers.len() != args.len() {
        return false;
    }
    if matchers.len() > args.len() {
        return false;
    }
    matchers.iter().zip(args).all(|(m, a)| m.matches(a))
}

/// Render a matcher list as `[a, b, c]` for diagnostics.
pub fn describe(matchers: &[Matcher]) -> String {
    let parts: Vec<String> = matchers.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}
