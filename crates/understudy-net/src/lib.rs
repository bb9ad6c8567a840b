// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Outbound HTTP interception for tests.
//!
//! Code under test sends requests through [`send`] (or its own
//! [`Interceptor`]). Tests register rules that answer with canned
//! responses and can refuse every request no rule covers.
//!
//! ```ignore
//! let net = Interceptor::global();
//! net.intercept("http://like-youtube.com")
//!     .post(PathMatcher::regex("upload.*$")?)
//!     .reply(200, json!({"status": "all-good"}));
//! net.disable_real_requests();
//! ```
#![forbid(unsafe_code)]

pub mod interceptor;
pub mod request;
pub mod rule;
pub mod transport;

pub use interceptor::{Disposition, Interceptor, RequestRecord, RuleBuilder, Scope};
pub use request::{Method, Request, Response};
pub use rule::{HostPattern, PathMatcher, Rule, RuleId, Times};
pub use transport::{ReqwestTransport, Transport};

use understudy_core::Result;

/// Route `request` through the process-wide interceptor.
///
/// # Errors
/// See [`Interceptor::send`].
pub async fn send(request: Request) -> Result<Response> {
    Interceptor::global().send(request).await
}
