// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Spies, stubs and mock doubles.
//!
//! A [`Double`] is a cheap, cloneable handle. Every clone shares the same
//! behavior table and [`Recorder`], so a test can keep one clone for assertions
//! while another is installed on a [`Surface`](crate::Surface).
//!
//! Response resolution for a call, first hit wins:
//!
//! 1. a behavior programmed with [`Double::on_call`] for this call index;
//! 2. behaviors programmed with [`Double::with_args`], in registration order;
//! 3. the default behavior ([`Double::returns`] and friends);
//! 4. the forwarding target (spies created with [`Double::spy_on`] or bound to a
//!    member);
//! 5. `null`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};
use crate::matcher::{describe, Matcher};
use crate::recorder::Recorder;
use crate::value::{callable, Callable, Fault, Invocation, Outcome};

/// What a double is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoubleKind {
    /// Records calls, forwards to the original when there is one.
    Spy,
    /// Programmable canned responses.
    Stub,
    /// Carries declarative expectations checked by [`verify`](crate::verify()).
    Mock,
}

/// Who a double stands in for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Not bound to any member.
    Anonymous,
    /// Bound to `surface.member`.
    Member {
        /// Surface name.
        surface: String,
        /// Member name.
        member: String,
    },
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::Member { surface, member } => write!(f, "{surface}.{member}"),
        }
    }
}

#[derive(Clone)]
enum Response {
    Returns(Value),
    Throws(Fault),
    Resolves(Value),
    Rejects(Fault),
    Fake(Callable),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Success,
    Failure,
    Fake,
}

impl Response {
    fn label(&self) -> &'static str {
        match self {
            Self::Returns(_) => "returns",
            Self::Throws(_) => "throws",
            Self::Resolves(_) => "resolves",
            Self::Rejects(_) => "rejects",
            Self::Fake(_) => "calls_fake",
        }
    }

    fn category(&self) -> Category {
        match self {
            Self::Returns(_) | Self::Resolves(_) => Category::Success,
            Self::Throws(_) | Self::Rejects(_) => Category::Failure,
            Self::Fake(_) => Category::Fake,
        }
    }

    fn is_deferred(&self) -> bool {
        matches!(self, Self::Resolves(_) | Self::Rejects(_))
    }

    fn settle(&self, args: &[Value]) -> Result<Value, Fault> {
        match self {
            Self::Returns(v) | Self::Resolves(v) => Ok(v.clone()),
            Self::Throws(f) | Self::Rejects(f) => Err(f.clone()),
            Self::Fake(f) => f(args),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Default,
    Args(Vec<Matcher>),
    Call(usize),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("every call"),
            Self::Args(m) => write!(f, "calls with {}", describe(m)),
            Self::Call(n) => write!(f, "call #{n}"),
        }
    }
}

#[derive(Default)]
struct Behavior {
    rules: Vec<(Selector, Response)>,
}

impl Behavior {
    fn program(&mut self, selector: Selector, response: Response) -> Result<()> {
        if let Some((_, existing)) = self.rules.iter_mut().find(|(s, _)| *s == selector) {
            if existing.category() != response.category() {
                return Err(Error::ConflictingBehavior {
                    selector: selector.to_string(),
                    existing: existing.label(),
                    requested: response.label(),
                });
            }
            *existing = response;
            return Ok(());
        }
        self.rules.push((selector, response));
        Ok(())
    }

    fn resolve(&self, call_index: usize, args: &[Value]) -> Option<Response> {
        let by_call = self
            .rules
            .iter()
            .find(|(s, _)| matches!(s, Selector::Call(n) if *n == call_index));
        let by_args = || {
            self.rules.iter().find(|(s, _)| match s {
                Selector::Args(m) => crate::matcher::args_match(m, args, false),
                _ => false,
            })
        };
        let by_default = || self.rules.iter().find(|(s, _)| *s == Selector::Default);
        by_call
            .or_else(by_args)
            .or_else(by_default)
            .map(|(_, r)| r.clone())
    }
}

struct Inner {
    identity: Identity,
    kind: DoubleKind,
    recorder: Recorder,
    behavior: Mutex<Behavior>,
    forward: Option<Callable>,
    live: AtomicBool,
}

/// A spy, stub or mock handle.
#[derive(Clone)]
pub struct Double {
    inner: Arc<Inner>,
}

impl fmt::Debug for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Double")
            .field("identity", &self.inner.identity)
            .field("kind", &self.inner.kind)
            .field("calls", &self.call_count())
            .field("live", &self.is_live())
            .finish()
    }
}

impl Double {
    pub(crate) fn bound(kind: DoubleKind, identity: Identity, forward: Option<Callable>) -> Self {
        Self {
            inner: Arc::new(Inner {
                identity,
                kind,
                recorder: Recorder::new(),
                behavior: Mutex::new(Behavior::default()),
                forward,
                live: AtomicBool::new(true),
            }),
        }
    }

    /// Anonymous spy: records every call and returns `null`.
    pub fn spy() -> Self {
        Self::bound(DoubleKind::Spy, Identity::Anonymous, None)
    }

    /// Spy that records every call and forwards it to `target`.
    pub fn spy_on(target: Callable) -> Self {
        Self::bound(DoubleKind::Spy, Identity::Anonymous, Some(target))
    }

    /// Programmable stub returning `null` until told otherwise.
    pub fn stub() -> Self {
        Self::bound(DoubleKind::Stub, Identity::Anonymous, None)
    }

    /// Spy, stub or mock.
    pub fn kind(&self) -> DoubleKind {
        self.inner.kind
    }

    /// Anonymous or bound member.
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// False once the patch that installed this double has been restored.
    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    pub(crate) fn retire(&self) {
        self.inner.live.store(false, Ordering::SeqCst);
    }

    /// True if both handles point at the same double.
    pub fn same_as(&self, other: &Double) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn program(&self, selector: Selector, response: Response) -> Result<()> {
        self.inner
            .behavior
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .program(selector, response)
    }

    /// Return `value` on every call.
    pub fn returns(&self, value: impl Into<Value>) -> Result<()> {
        self.program(Selector::Default, Response::Returns(value.into()))
    }

    /// Fail every call with `fault`.
    pub fn throws(&self, fault: Fault) -> Result<()> {
        self.program(Selector::Default, Response::Throws(fault))
    }

    /// Like [`returns`](Self::returns), but async callers observe a suspension first.
    pub fn resolves(&self, value: impl Into<Value>) -> Result<()> {
        self.program(Selector::Default, Response::Resolves(value.into()))
    }

    /// Like [`throws`](Self::throws), but async callers observe a suspension first.
    pub fn rejects(&self, fault: Fault) -> Result<()> {
        self.program(Selector::Default, Response::Rejects(fault))
    }

    /// Run `fake` in place of the real member.
    pub fn calls_fake<F>(&self, fake: F) -> Result<()>
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        self.program(Selector::Default, Response::Fake(callable(fake)))
    }

    /// Program a behavior for calls whose leading arguments satisfy `matchers`.
    pub fn with_args(&self, matchers: Vec<Matcher>) -> StubRule<'_> {
        StubRule {
            double: self,
            selector: Selector::Args(matchers),
        }
    }

    /// Program a behavior for the `n`th call only (0-based).
    pub fn on_call(&self, n: usize) -> StubRule<'_> {
        StubRule {
            double: self,
            selector: Selector::Call(n),
        }
    }

    /// Forget every programmed behavior.
    pub fn reset_behavior(&self) {
        self.inner
            .behavior
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .rules
            .clear();
    }

    /// Forget recorded calls.
    pub fn reset_history(&self) {
        self.inner.recorder.reset();
    }

    /// Forget behaviors and history.
    pub fn reset(&self) {
        self.reset_behavior();
        self.reset_history();
    }

    fn prepare(&self, args: &[Value]) -> Result<Option<Response>, Fault> {
        if !self.is_live() {
            return Err(Fault::new(
                "inert-double",
                format!("double for {} was restored", self.inner.identity),
            ));
        }
        let call_index = self.inner.recorder.call_count();
        Ok(self
            .inner
            .behavior
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .resolve(call_index, args))
    }

    fn finish(&self, args: &[Value], response: Option<Response>) -> Result<Value, Fault> {
        let result = match (response, &self.inner.forward) {
            (Some(r), _) => r.settle(args),
            (None, Some(target)) => target(args),
            (None, None) => Ok(Value::Null),
        };
        let invocation = self
            .inner
            .recorder
            .record(args, Outcome::from_result(&result));
        trace!(
            double = %self.inner.identity,
            sequence = invocation.sequence,
            failed = invocation.outcome.is_threw(),
            "double invoked"
        );
        result
    }

    /// Call the double synchronously.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, Fault> {
        let response = self.prepare(args)?;
        self.finish(args, response)
    }

    /// Call the double from async code.
    ///
    /// `resolves`/`rejects` responses yield to the runtime once before settling.
    pub async fn invoke_async(&self, args: Vec<Value>) -> Result<Value, Fault> {
        let response = self.prepare(&args)?;
        if response.as_ref().is_some_and(Response::is_deferred) {
            tokio::task::yield_now().await;
        }
        self.finish(&args, response)
    }

    /// A [`Callable`] that routes into this double.
    pub fn as_callable(&self) -> Callable {
        let double = self.clone();
        callable(move |args| double.invoke(args))
    }

    /// Call history.
    pub fn recorder(&self) -> &Recorder {
        &self.inner.recorder
    }

    /// True after at least one call.
    pub fn called(&self) -> bool {
        self.inner.recorder.called()
    }

    /// Number of calls, failed ones included.
    pub fn call_count(&self) -> usize {
        self.inner.recorder.call_count()
    }

    /// Every call in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.inner.recorder.calls()
    }

    /// The `n`th call (0-based).
    pub fn call(&self, n: usize) -> Option<Invocation> {
        self.inner.recorder.call(n)
    }

    /// The first call.
    pub fn first_call(&self) -> Option<Invocation> {
        self.inner.recorder.first_call()
    }

    /// The most recent call.
    pub fn last_call(&self) -> Option<Invocation> {
        self.inner.recorder.last_call()
    }

    /// True if any call's leading arguments satisfy `matchers`.
    pub fn called_with(&self, matchers: &[Matcher]) -> bool {
        self.inner.recorder.called_with(matchers)
    }

    /// True if every call's leading arguments satisfy `matchers`.
    pub fn always_called_with(&self, matchers: &[Matcher]) -> bool {
        self.inner.recorder.always_called_with(matchers)
    }

    /// True if any call failed.
    pub fn threw(&self) -> bool {
        self.inner.recorder.threw()
    }

    /// True if this double's first call happened before `other`'s last call.
    pub fn called_before(&self, other: &Double) -> bool {
        match (self.inner.recorder.first_sequence(), other.last_call()) {
            (Some(mine), Some(theirs)) => mine < theirs.sequence,
            _ => false,
        }
    }
}

/// Behavior builder scoped to some calls of a double.
pub struct StubRule<'a> {
    double: &'a Double,
    selector: Selector,
}

impl StubRule<'_> {
    /// Return `value` for the selected calls.
    pub fn returns(self, value: impl Into<Value>) -> Result<()> {
        self.double
            .program(self.selector, Response::Returns(value.into()))
    }

    /// Fail the selected calls with `fault`.
    pub fn throws(self, fault: Fault) -> Result<()> {
        self.double.program(self.selector, Response::Throws(fault))
    }

    /// Resolve the selected calls with `value` after a suspension.
    pub fn resolves(self, value: impl Into<Value>) -> Result<()> {
        self.double
            .program(self.selector, Response::Resolves(value.into()))
    }

    /// Reject the selected calls with `fault` after a suspension.
    pub fn rejects(self, fault: Fault) -> Result<()> {
        self.double.program(self.selector, Response::Rejects(fault))
    }

    /// Run `fake` for the selected calls.
    pub fn calls_fake<F>(self, fake: F) -> Result<()>
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        self.double
            .program(self.selector, Response::Fake(callable(fake)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn anonymous_spy_swallows_and_records() {
        let spy = Double::spy();
        assert_eq!(spy.invoke(&[json!("a")]), Ok(Value::Null));
        assert!(spy.called());
        assert_eq!(spy.kind(), DoubleKind::Spy);
        assert_eq!(spy.identity(), &Identity::Anonymous);
    }

    #[test]
    fn spy_on_forwards_to_target() {
        let spy = Double::spy_on(callable(|args| Ok(json!(args.len()))));
        assert_eq!(spy.invoke(&[json!(1), json!(2)]), Ok(json!(2)));
        assert_eq!(spy.last_call().unwrap().returned(), Some(&json!(2)));
    }

    #[test]
    fn stub_returns_then_conflicting_rejects_fails() {
        let stub = Double::stub();
        stub.returns(json!(true)).unwrap();
        let err = stub.rejects(Fault::named("boom")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConflictingBehavior);
        // same kind replaces
        stub.resolves(json!(false)).unwrap();
        assert_eq!(stub.invoke(&[]), Ok(json!(false)));
        stub.reset_behavior();
        stub.throws(Fault::named("boom")).unwrap();
        assert_eq!(stub.invoke(&[]), Err(Fault::named("boom")));
    }

    #[test]
    fn selectors_resolve_call_then_args_then_default() {
        let stub = Double::stub();
        stub.returns("default").unwrap();
        stub.with_args(vec![Matcher::exact("paris")])
            .returns("sunny")
            .unwrap();
        stub.on_call(0).returns("first").unwrap();

        assert_eq!(stub.invoke(&[json!("paris")]), Ok(json!("first")));
        assert_eq!(stub.invoke(&[json!("paris")]), Ok(json!("sunny")));
        assert_eq!(stub.invoke(&[json!("oslo")]), Ok(json!("default")));
    }

    #[test]
    fn calls_fake_runs_custom_logic_and_counts_faults() {
        let stub = Double::stub();
        stub.calls_fake(|args| match args.first() {
            Some(Value::Null) => Err(Fault::named("null-arg")),
            _ => Ok(json!("ok")),
        })
        .unwrap();
        assert!(stub.invoke(&[Value::Null]).is_err());
        assert!(stub.invoke(&[json!(1)]).is_ok());
        assert_eq!(stub.call_count(), 2);
        assert!(stub.threw());
    }

    #[test]
    fn retired_double_refuses_calls_without_recording() {
        let stub = Double::stub();
        stub.invoke(&[]).unwrap();
        stub.retire();
        let err = stub.invoke(&[]).unwrap_err();
        assert_eq!(err.name(), "inert-double");
        assert_eq!(stub.call_count(), 1);
    }

    #[test]
    fn called_before_uses_global_sequence() {
        let a = Double::spy();
        let b = Double::spy();
        a.invoke(&[]).unwrap();
        b.invoke(&[]).unwrap();
        assert!(a.called_before(&b));
        assert!(!b.called_before(&a));
    }

    #[tokio::test]
    async fn rejects_settles_after_yield() {
        let stub = Double::stub();
        stub.rejects(Fault::new("video-production-failed", "encoder"))
            .unwrap();
        let err = stub.invoke_async(vec![json!({})]).await.unwrap_err();
        assert_eq!(err.name(), "video-production-failed");
        assert_eq!(stub.call_count(), 1);
    }
}
