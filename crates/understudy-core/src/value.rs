// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dynamic values, faults and the callable shape shared by real members and doubles.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Positional call arguments.
pub type Args = Vec<Value>;

/// A member implementation: takes positional arguments, returns a value or a fault.
///
/// Real collaborators and doubles both satisfy this shape, which is what lets a
/// [`Surface`](crate::Surface) swap one for the other at runtime.
pub type Callable = Arc<dyn Fn(&[Value]) -> Result<Value, Fault> + Send + Sync>;

/// Wrap a closure as a [`Callable`].
pub fn callable<F>(f: F) -> Callable
where
    F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build an [`Args`] vector from anything `serde_json::json!` accepts.
///
/// ```
/// use understudy_core::args;
/// let a = args!["yoni@example.com", 3, true];
/// assert_eq!(a.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($v:expr),+ $(,)?) => {
        ::std::vec![$($crate::json!($v)),+]
    };
}

/// The failure side of a doubled call.
///
/// `name` is a stable tag callers can match on (`"video-production-failed"`),
/// `message` is free text for humans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[error("{name}: {message}")]
pub struct Fault {
    /// Stable machine-readable failure category.
    pub name: String,
    /// Human-readable detail.
    pub message: String,
}

impl Fault {
    /// Create a fault with a name and message.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a fault whose message repeats its name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            message: name.clone(),
            name,
        }
    }

    /// The stable failure category.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// How a recorded call ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    /// The call produced a value.
    Returned(Value),
    /// The call failed.
    Threw(Fault),
}

impl Outcome {
    /// Build an outcome from a call result.
    pub fn from_result(result: &Result<Value, Fault>) -> Self {
        match result {
            Ok(v) => Self::Returned(v.clone()),
            Err(f) => Self::Threw(f.clone()),
        }
    }

    /// True when the call failed.
    pub fn is_threw(&self) -> bool {
        matches!(self, Self::Threw(_))
    }
}

/// One recorded call. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Arguments in call order.
    pub args: Args,
    /// Process-wide logical timestamp; strictly increasing across all doubles.
    pub sequence: u64,
    /// Returned value or fault.
    pub outcome: Outcome,
}

impl Invocation {
    /// Argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Returned value, if the call did not fail.
    pub fn returned(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Returned(v) => Some(v),
            Outcome::Threw(_) => None,
        }
    }

    /// Fault raised by the call, if any.
    pub fn fault(&self) -> Option<&Fault> {
        match &self.outcome {
            Outcome::Threw(f) => Some(f),
            Outcome::Returned(_) => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn args_macro_converts_mixed_values() {
        let a = crate::args!["x", 1, Value::Null, json!({ "k": "v" })];
        assert_eq!(a, vec![json!("x"), json!(1), Value::Null, json!({"k": "v"})]);
        assert!(crate::args![].is_empty());
    }

    #[test]
    fn fault_display_includes_name_and_message() {
        let f = Fault::new("video-production-failed", "encoder crashed");
        assert_eq!(f.to_string(), "video-production-failed: encoder crashed");
        assert_eq!(Fault::named("no-photos").message, "no-photos");
    }

    #[test]
    fn outcome_serializes_tagged() {
        let o = Outcome::Threw(Fault::named("boom"));
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["kind"], "threw");
        assert_eq!(v["value"]["name"], "boom");
    }
}
