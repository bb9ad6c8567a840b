// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Outbound request and response values.

use std::fmt;
use std::str::FromStr;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use understudy_core::{Error, Result};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl Method {
    /// Upper-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(Error::InvalidPattern {
                pattern: s.to_string(),
                reason: "unknown HTTP method".into(),
            }),
        }
    }
}

/// An outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Method.
    pub method: Method,
    /// `scheme://host[:port]`, lower-cased.
    pub origin: String,
    /// Path plus query string, always starting with `/`.
    pub path: String,
    /// Request headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl Request {
    /// Parse `url` into a request with no headers or body.
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidPattern {
            pattern: url.to_string(),
            reason,
        };
        let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid("URL has no host".into()))?;
        let origin = match parsed.port() {
            Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
            None => format!("{}://{host}", parsed.scheme()),
        };
        let path = match parsed.query() {
            Some(q) => format!("{}?{q}", parsed.path()),
            None => parsed.path().to_string(),
        };
        Ok(Self {
            method,
            origin: origin.to_ascii_lowercase(),
            path,
            headers: Vec::new(),
            body: None,
        })
    }

    /// GET `url`.
    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::Get, url)
    }

    /// POST `url`.
    pub fn post(url: &str) -> Result<Self> {
        Self::new(Method::Post, url)
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Path without the query string.
    pub fn path_only(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }

    /// Full URL.
    pub fn url(&self) -> String {
        format!("{}{}", self.origin, self.path)
    }
}

/// A response, canned or real.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Body: parsed JSON when possible, otherwise a string.
    pub body: Value,
}

impl Response {
    /// Response with `status` and `body` and no headers.
    pub fn new(status: u16, body: impl Into<Value>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_origin_and_path() {
        let r = Request::post("http://Like-YouTube.com/upload/abc?x=1").unwrap();
        assert_eq!(r.origin, "http://like-youtube.com");
        assert_eq!(r.path, "/upload/abc?x=1");
        assert_eq!(r.path_only(), "/upload/abc");
        assert_eq!(r.url(), "http://like-youtube.com/upload/abc?x=1");
    }

    #[test]
    fn bare_host_gets_root_path() {
        let r = Request::get("http://localhost:8080").unwrap();
        assert_eq!(r.origin, "http://localhost:8080");
        assert_eq!(r.path, "/");
        let q = Request::get("http://h?x=1").unwrap();
        assert_eq!(q.path, "/?x=1");
    }

    #[test]
    fn rejects_urls_without_scheme() {
        let err = Request::get("like-youtube.com/upload").unwrap_err();
        assert_eq!(err.name(), "invalid-pattern");
        assert!(Request::get("mailto:someone@like-youtube.com").is_err());
    }

    #[test]
    fn default_ports_are_dropped_from_the_origin() {
        let r = Request::get("https://Example.test:443/a/../b").unwrap();
        assert_eq!(r.origin, "https://example.test");
        assert_eq!(r.path, "/b");
    }

    #[test]
    fn method_round_trips_through_str() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn response_helpers() {
        let mut r = Response::new(204, json!(null));
        r.headers.push(("Content-Type".into(), "application/json".into()));
        assert!(r.is_success());
        assert_eq!(r.header("content-type"), Some("application/json"));
        assert!(!Response::new(500, json!({})).is_success());
    }
}
