// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Real I/O for requests no rule intercepts.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use understudy_core::{Error, Result};

use crate::request::{Method, Request, Response};

/// Performs a request for real.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and wait for the full response.
    async fn send(&self, request: &Request) -> Result<Response>;
}

/// Pass-through transport backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }
}

impl ReqwestTransport {
    /// Transport whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), timeout)
    }

    /// Reuse an existing client (proxies, TLS roots and pools stay the caller's).
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
            Method::Head => Self::HEAD,
            Method::Options => Self::OPTIONS,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> Result<Response> {
        debug!(method = %request.method, url = %request.url(), "passing request through");
        let mut builder = self
            .client
            .request(request.method.into(), request.url())
            .timeout(self.timeout);
        for (k, v) in &request.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let bytes = resp.bytes().await.map_err(transport_error)?;
        Ok(Response {
            status,
            headers,
            body: body_value(&bytes),
        })
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Transport(format!("timed out: {e}"))
    } else {
        Error::Transport(e.to_string())
    }
}

/// JSON when the bytes parse, otherwise lossy text; empty is `null`.
fn body_value(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
