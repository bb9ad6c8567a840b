// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rule table, block mode, and request history.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use understudy_core::{Error, Result};

use crate::request::{Method, Request, Response};
use crate::rule::{HostPattern, PathMatcher, Rule, RuleId, Times};
use crate::transport::{ReqwestTransport, Transport};

/// What happened to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disposition {
    /// Answered by the given rule.
    Intercepted(RuleId),
    /// Refused because real requests are disabled.
    Blocked,
    /// Sent through the transport.
    PassedThrough,
}

/// One entry in the interceptor's request history.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    /// The request as sent by the code under test.
    pub request: Request,
    /// How it was handled.
    pub disposition: Disposition,
    /// Status returned to the caller, if any.
    pub status: Option<u16>,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    history: Vec<RequestRecord>,
}

/// Routes outbound requests through registered rules.
///
/// Rules are tried in registration order; the first match answers. A rule
/// registered with a finite count is dropped after its last use, so later
/// requests fall through to the next match or to the transport.
pub struct Interceptor {
    state: Mutex<State>,
    block_real: AtomicBool,
    next_id: AtomicU64,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("rules", &self.lock().rules.len())
            .field("block_real", &self.real_requests_blocked())
            .finish_non_exhaustive()
    }
}

impl Default for Interceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor {
    /// Interceptor that passes unmatched requests to a [`ReqwestTransport`].
    pub fn new() -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::default()))
    }

    /// Interceptor with a custom pass-through transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            block_real: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            transport,
        }
    }

    /// Process-wide interceptor.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Interceptor> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start declaring rules for an exact origin such as `http://like-youtube.com`.
    pub fn intercept(&self, origin: &str) -> Scope<'_> {
        Scope {
            interceptor: self,
            host: HostPattern::exact(origin),
        }
    }

    /// Start declaring rules for every origin matching `pattern`.
    pub fn intercept_matching(&self, pattern: &str) -> Result<Scope<'_>> {
        Ok(Scope {
            interceptor: self,
            host: HostPattern::regex(pattern)?,
        })
    }

    fn register(&self, mut rule: Rule) -> RuleId {
        let id = RuleId(self.next_id.fetch_add(1, Ordering::Relaxed));
        rule.id = id;
        if rule.is_exhausted() {
            debug!(rule = %rule, "zero-use rule not registered");
            return id;
        }
        debug!(rule = %rule, "rule registered");
        self.lock().rules.push(rule);
        id
    }

    /// Refuse every request no rule matches.
    pub fn disable_real_requests(&self) {
        info!("real network requests disabled");
        self.block_real.store(true, Ordering::SeqCst);
    }

    /// Let unmatched requests reach the transport again.
    pub fn allow_real_requests(&self) {
        info!("real network requests allowed");
        self.block_real.store(false, Ordering::SeqCst);
    }

    /// True while unmatched requests are refused.
    pub fn real_requests_blocked(&self) -> bool {
        self.block_real.load(Ordering::SeqCst)
    }

    /// Drop every rule. Returns how many were removed.
    pub fn clear_rules(&self) -> usize {
        let mut st = self.lock();
        let n = st.rules.len();
        st.rules.clear();
        n
    }

    /// Drop a single rule.
    pub fn remove_rule(&self, id: RuleId) -> bool {
        let mut st = self.lock();
        let before = st.rules.len();
        st.rules.retain(|r| r.id != id);
        st.rules.len() != before
    }

    /// Human-readable descriptions of finite rules that still have uses left.
    pub fn pending_rules(&self) -> Vec<String> {
        self.lock()
            .rules
            .iter()
            .filter(|r| matches!(r.remaining, Times::Remaining(n) if n > 0))
            .map(ToString::to_string)
            .collect()
    }

    /// True when no finite rule is waiting to be used.
    pub fn is_done(&self) -> bool {
        self.pending_rules().is_empty()
    }

    /// Snapshot of live rules.
    pub fn rules(&self) -> Vec<Rule> {
        self.lock().rules.clone()
    }

    /// Every request seen since the last [`clear_history`](Self::clear_history).
    pub fn history(&self) -> Vec<RequestRecord> {
        self.lock().history.clone()
    }

    /// Forget recorded requests.
    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    /// Route `request`.
    ///
    /// # Errors
    /// [`Error::NetworkBlocked`] when nothing matches and real requests are
    /// disabled; [`Error::Transport`] or I/O errors from pass-through.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let hit = {
            let mut st = self.lock();
            let found = st.rules.iter().position(|r| r.matches(&request));
            found.map(|i| {
                let rule = &mut st.rules[i];
                let id = rule.id;
                let response = rule.response.clone();
                if rule.consume() {
                    st.rules.remove(i);
                }
                (id, response)
            })
        };

        if let Some((id, response)) = hit {
            debug!(method = %request.method, url = %request.url(), status = response.status, "request intercepted");
            self.push(request, Disposition::Intercepted(id), Some(response.status));
            return Ok(response);
        }

        if self.real_requests_blocked() {
            warn!(method = %request.method, url = %request.url(), "blocked real request");
            let err = Error::NetworkBlocked {
                method: request.method.to_string(),
                url: request.url(),
            };
            self.push(request, Disposition::Blocked, None);
            return Err(err);
        }

        let result = self.transport.send(&request).await;
        let status = result.as_ref().ok().map(|r| r.status);
        self.push(request, Disposition::PassedThrough, status);
        result
    }

    fn push(&self, request: Request, disposition: Disposition, status: Option<u16>) {
        self.lock().history.push(RequestRecord {
            request,
            disposition,
            status,
        });
    }
}

/// Rules under construction for one host pattern.
#[derive(Debug)]
pub struct Scope<'i> {
    interceptor: &'i Interceptor,
    host: HostPattern,
}

impl<'i> Scope<'i> {
    /// Match `method` and `path`.
    pub fn on(&self, method: Method, path: impl Into<PathMatcher>) -> RuleBuilder<'i> {
        RuleBuilder {
            interceptor: self.interceptor,
            host: self.host.clone(),
            method,
            path: path.into(),
            headers: Vec::new(),
            times: Times::Unlimited,
        }
    }

    /// `on(Method::Get, path)`.
    pub fn get(&self, path: impl Into<PathMatcher>) -> RuleBuilder<'i> {
        self.on(Method::Get, path)
    }

    /// `on(Method::Post, path)`.
    pub fn post(&self, path: impl Into<PathMatcher>) -> RuleBuilder<'i> {
        self.on(Method::Post, path)
    }

    /// `on(Method::Put, path)`.
    pub fn put(&self, path: impl Into<PathMatcher>) -> RuleBuilder<'i> {
        self.on(Method::Put, path)
    }

    /// `on(Method::Delete, path)`.
    pub fn delete(&self, path: impl Into<PathMatcher>) -> RuleBuilder<'i> {
        self.on(Method::Delete, path)
    }
}

/// One rule under construction.
#[derive(Debug)]
pub struct RuleBuilder<'i> {
    interceptor: &'i Interceptor,
    host: HostPattern,
    method: Method,
    path: PathMatcher,
    headers: Vec<(String, String)>,
    times: Times,
}

impl RuleBuilder<'_> {
    /// Add a header to the canned response.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Answer at most `n` requests. `times(0)` registers nothing.
    #[must_use]
    pub fn times(mut self, n: usize) -> Self {
        self.times = Times::Remaining(n);
        self
    }

    /// `times(1)`.
    #[must_use]
    pub fn once(self) -> Self {
        self.times(1)
    }

    /// Register the rule with a canned `status` and `body`.
    pub fn reply(self, status: u16, body: impl Into<Value>) -> RuleId {
        let response = Response {
            status,
            headers: self.headers,
            body: body.into(),
        };
        self.interceptor.register(Rule {
            id: RuleId(0),
            host: self.host,
            method: self.method,
            path: self.path,
            response,
            remaining: self.times,
            hits: 0,
        })
    }

    /// `times(n).reply(status, body)`.
    pub fn reply_times(self, status: u16, body: impl Into<Value>, n: usize) -> RuleId {
        self.times(n).reply(status, body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, request: &Request) -> Result<Response> {
            Ok(Response::new(299, json!(request.url())))
        }
    }

    fn offline() -> Interceptor {
        Interceptor::with_transport(Arc::new(Echo))
    }

    #[tokio::test]
    async fn first_matching_rule_answers() {
        let net = offline();
        let scope = net.intercept("http://like-youtube.com");
        scope.post("/upload").reply(200, json!({"status": "first"}));
        scope.post("/upload").reply(200, json!({"status": "second"}));

        let r = net
            .send(Request::post("http://like-youtube.com/upload").unwrap())
            .await
            .unwrap();
        assert_eq!(r.body, json!({"status": "first"}));
    }

    #[tokio::test]
    async fn exhausted_rule_falls_through() {
        let net = offline();
        let id = net
            .intercept("http://h.test")
            .get("/x")
            .reply_times(201, json!("once"), 1);
        assert_eq!(net.pending_rules().len(), 1);
        assert!(!net.is_done());

        let a = net.send(Request::get("http://h.test/x").unwrap()).await.unwrap();
        let b = net.send(Request::get("http://h.test/x").unwrap()).await.unwrap();
        assert_eq!(a.status, 201);
        assert_eq!(b.status, 299);
        assert!(net.is_done());

        let h = net.history();
        assert_eq!(h[0].disposition, Disposition::Intercepted(id));
        assert_eq!(h[1].disposition, Disposition::PassedThrough);
    }

    #[tokio::test]
    async fn zero_use_rule_never_answers() {
        let net = offline();
        net.intercept("http://h.test")
            .get("/x")
            .times(0)
            .reply(201, json!("never"));
        assert!(net.rules().is_empty());
        assert!(net.pending_rules().is_empty());
        assert!(net.is_done());

        let r = net.send(Request::get("http://h.test/x").unwrap()).await.unwrap();
        assert_eq!(r.status, 299);
        assert_eq!(net.history()[0].disposition, Disposition::PassedThrough);
    }

    #[tokio::test]
    async fn blocked_requests_are_refused_and_recorded() {
        let net = offline();
        net.disable_real_requests();
        let err = net
            .send(Request::get("http://weather.test/now").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "network-blocked");
        assert!(err.to_string().contains("http://weather.test/now"));
        assert_eq!(net.history()[0].disposition, Disposition::Blocked);

        net.allow_real_requests();
        assert!(net.send(Request::get("http://weather.test/now").unwrap()).await.is_ok());
    }

    #[tokio::test]
    async fn canned_headers_are_returned() {
        let net = offline();
        net.intercept_matching(r"^http://.*\.cdn\.test$")
            .unwrap()
            .get("/asset")
            .with_header("Content-Type", "application/json")
            .reply(200, json!({}));
        let r = net
            .send(Request::get("http://eu.cdn.test/asset").unwrap())
            .await
            .unwrap();
        assert_eq!(r.header("content-type"), Some("application/json"));
    }

    #[test]
    fn clear_and_remove_rules() {
        let net = offline();
        let keep = net.intercept("http://h").get("/a").reply(200, json!(null));
        let drop = net.intercept("http://h").get("/b").reply(200, json!(null));
        assert!(net.remove_rule(drop));
        assert!(!net.remove_rule(drop));
        assert_eq!(net.rules().len(), 1);
        assert_eq!(net.rules()[0].id(), keep);
        assert_eq!(net.clear_rules(), 1);
    }

    #[test]
    fn invalid_host_pattern_is_an_error() {
        let net = offline();
        assert_eq!(
            net.intercept_matching("(").unwrap_err().name(),
            "invalid-pattern"
        );
    }
}
