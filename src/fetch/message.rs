//! Request and response shapes passed through the fetcher.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use crate::cache::CachedResponse;

/// Header list in wire order. A name repeats once per value.
pub type Headers = Vec<(String, String)>;

/// Values of every header named `name`, case-insensitively.
pub fn header_values<'a, 'n>(
    headers: &'a Headers,
    name: &'n str,
) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
    headers
        .iter()
        .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

// == Request ==
/// Outgoing request as seen by the caching layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

impl Request {
    /// Creates a bodiless request.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Only GET requests may touch the cache.
    pub fn is_cacheable_method(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

// == Served From ==
/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServedFrom {
    Network,
    Cache,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedFrom::Network => "network",
            ServedFrom::Cache => "cache",
        }
    }
}

impl fmt::Display for ServedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Response ==
/// Response handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
    pub served_from: ServedFrom,
    /// True only for cache responses past their max age
    pub stale: bool,
}

impl Response {
    /// Creates a network response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
            served_from: ServedFrom::Network,
            stale: false,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of header `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_values(&self.headers, name).next()
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Rebuilds a response from a stored entry.
    pub fn from_cache(cached: CachedResponse, stale: bool) -> Self {
        Self {
            status: cached.status,
            headers: cached.headers,
            body: cached.body,
            served_from: ServedFrom::Cache,
            stale,
        }
    }

    /// Payload to store.
    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}
