//! Next stage for allowed requests
//!
//! [`Upstream`] is whatever handles a request once the filters let it
//! through. [`ProxyClient`] is the stock implementation: a reverse proxy to a
//! single backend that adds forwarding headers and strips hop-by-hop ones.

use std::net::SocketAddr;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, HOST};
use hyper::{HeaderMap, Request, Response, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::error::{GateError, Result};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Handler invoked with the untouched request when every filter allows it
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    async fn forward(
        &self,
        req: Request<Incoming>,
        client_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>>;
}

/// Proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream backend URL (e.g., "http://localhost:3000")
    pub upstream_url: String,
    pub timeout: Duration,
    /// Keep the client's Host header instead of the upstream authority
    pub preserve_host: bool,
}

impl ProxyConfig {
    pub fn new(upstream_url: String) -> Self {
        Self {
            upstream_url,
            timeout: Duration::from_secs(30),
            preserve_host: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_preserve_host(mut self, preserve: bool) -> Self {
        self.preserve_host = preserve;
        self
    }
}

/// Reverse proxy client with connection pooling
pub struct ProxyClient {
    config: ProxyConfig,
    client: Client<HttpConnector, Incoming>,
    upstream_uri: Uri,
}

impl ProxyClient {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let upstream_uri: Uri = config
            .upstream_url
            .parse()
            .map_err(|e| GateError::Config(format!("Invalid upstream URL: {}", e)))?;

        if upstream_uri.authority().is_none() {
            return Err(GateError::Config(format!(
                "Upstream URL has no host: {}",
                config.upstream_url
            )));
        }

        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            config,
            client,
            upstream_uri,
        })
    }

    fn upstream_target(&self, original: &Uri) -> Result<Uri> {
        let path = original
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let mut parts = self.upstream_uri.clone().into_parts();
        parts.path_and_query = Some(
            path.parse()
                .map_err(|e| GateError::Upstream(format!("Invalid request path: {}", e)))?,
        );
        if parts.scheme.is_none() {
            parts.scheme = Some(http::uri::Scheme::HTTP);
        }

        Uri::from_parts(parts)
            .map_err(|e| GateError::Upstream(format!("Failed to build upstream URI: {}", e)))
    }

    fn rewrite_headers(&self, headers: &mut HeaderMap, client_addr: SocketAddr) {
        let client_ip = client_addr.ip().to_string();

        let forwarded_for = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, client_ip),
            None => client_ip.clone(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
        if let Ok(value) = HeaderValue::from_str(&client_ip) {
            headers.insert(X_REAL_IP, value);
        }

        if !self.config.preserve_host {
            if let Some(value) = self
                .upstream_uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
            {
                headers.insert(HOST, value);
            }
        }

        for name in HOP_BY_HOP {
            headers.remove(name);
        }
    }
}

#[async_trait::async_trait]
impl Upstream for ProxyClient {
    async fn forward(
        &self,
        mut req: Request<Incoming>,
        client_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>> {
        *req.uri_mut() = self.upstream_target(req.uri())?;
        self.rewrite_headers(req.headers_mut(), client_addr);

        let response = tokio::time::timeout(self.config.timeout, self.client.request(req))
            .await
            .map_err(|_| GateError::Upstream("Upstream request timeout".to_string()))?
            .map_err(|e| GateError::Upstream(format!("Upstream request failed: {}", e)))?;

        let (parts, body) = response.into_parts();
        let body_bytes = body
            .collect()
            .await
            .map_err(|e| GateError::Upstream(format!("Failed to read upstream response: {}", e)))?
            .to_bytes();

        Ok(Response::from_parts(parts, Full::new(body_bytes)))
    }
}
