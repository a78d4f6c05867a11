//! Network seam of the fetcher.
//!
//! The fetcher never opens sockets itself; it goes through a [`Transport`].
//! [`HttpTransport`] forwards to an upstream HTTP server with reqwest.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::{Headers, Request, Response};
use crate::error::TransportError;

/// Headers that describe a single hop and are not forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

// == Transport Trait ==
/// Sends a request over the network.
///
/// Any status code counts as a successful exchange here; the fetcher decides
/// what a non-2xx status means.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

// == HTTP Transport ==
/// Transport that resolves request URLs against an upstream base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let base = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client, base })
    }

    /// Upstream every relative URL is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Joins a relative URL onto the base; absolute URLs pass through.
    fn resolve(&self, url: &str) -> Result<Url, TransportError> {
        self.base
            .join(url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let url = self.resolve(&request.url)?;
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::Request(format!("invalid method {}", request.method)))?;

        debug!(method = %method, url = %url, "Forwarding request upstream");

        let mut builder = self.client.request(method, url);
        for (name, value) in request.headers.iter().filter(|(n, _)| !is_hop_by_hop(n)) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let upstream = builder.send().await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = upstream.status().as_u16();
        let headers: Headers = upstream
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = upstream
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let mut response = Response::new(status, body);
        response.headers = headers;
        Ok(response)
    }
}
