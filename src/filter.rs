//! Filter chain for request inspection
//!
//! Filters look at the request head only and decide whether it may reach the
//! upstream. The first non-Allow action short-circuits the chain.

pub mod user_agent;

pub use user_agent::{UserAgentFilter, Verdict};

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use http::request::Parts;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

/// Action to take after filter inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    /// Allow request to proceed
    Allow,
    /// Deny request with HTTP status and reason
    Deny { status: u16, reason: String },
}

impl FilterAction {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        FilterAction::Deny {
            status: StatusCode::FORBIDDEN.as_u16(),
            reason: reason.into(),
        }
    }

    pub fn bad_request() -> Self {
        FilterAction::Deny {
            status: StatusCode::BAD_REQUEST.as_u16(),
            reason: "Bad Request".to_string(),
        }
    }
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterAction::Allow => write!(f, "Allow"),
            FilterAction::Deny { status, reason } => {
                write!(f, "Deny(status={}, reason={})", status, reason)
            }
        }
    }
}

/// Trait for request filters
#[async_trait::async_trait]
pub trait Filter: Send + Sync {
    /// Inspect the request head and return an action
    async fn filter(&self, req: &Parts, remote_addr: SocketAddr) -> FilterAction;

    /// Filter name for logging
    fn name(&self) -> &str;
}

/// Chain of filters executed sequentially
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn add_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub async fn execute(&self, req: &Parts, remote_addr: SocketAddr) -> FilterAction {
        for filter in &self.filters {
            let action = filter.filter(req, remote_addr).await;
            if action != FilterAction::Allow {
                tracing::info!(
                    filter = filter.name(),
                    action = %action,
                    "Filter blocked request"
                );
                return action;
            }
        }
        FilterAction::Allow
    }

    /// Render a non-Allow action as the response sent back to the client
    pub fn action_to_response(&self, action: FilterAction) -> Response<Full<Bytes>> {
        let (status, body) = match action {
            FilterAction::Allow => (StatusCode::OK, "OK".to_string()),
            FilterAction::Deny { status, reason } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::FORBIDDEN),
                reason,
            ),
        };

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("text/plain"),
        );
        response
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;

    struct StaticFilter(FilterAction);

    #[async_trait::async_trait]
    impl Filter for StaticFilter {
        async fn filter(&self, _req: &Parts, _remote_addr: SocketAddr) -> FilterAction {
            self.0.clone()
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    fn parts() -> Parts {
        Request::builder().uri("/").body(()).unwrap().into_parts().0
    }

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 4000))
    }

    #[test]
    fn test_filter_action_display() {
        assert_eq!(FilterAction::Allow.to_string(), "Allow");
        assert_eq!(
            FilterAction::forbidden("Unsupported OS").to_string(),
            "Deny(status=403, reason=Unsupported OS)"
        );
        assert_eq!(
            FilterAction::bad_request().to_string(),
            "Deny(status=400, reason=Bad Request)"
        );
    }

    #[test]
    fn test_action_to_response_deny() {
        let chain = FilterChain::new();
        let response = chain.action_to_response(FilterAction::forbidden("Access denied"));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers().get("Content-Type").unwrap(), "text/plain");
    }

    #[test]
    fn test_action_to_response_bad_request() {
        let chain = FilterChain::new();
        let response = chain.action_to_response(FilterAction::bad_request());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chain_short_circuits() {
        let chain = FilterChain::new()
            .add_filter(Arc::new(StaticFilter(FilterAction::Allow)))
            .add_filter(Arc::new(StaticFilter(FilterAction::forbidden("first"))))
            .add_filter(Arc::new(StaticFilter(FilterAction::forbidden("second"))));

        assert_eq!(chain.len(), 3);
        assert_eq!(
            chain.execute(&parts(), addr()).await,
            FilterAction::forbidden("first")
        );
    }

    #[tokio::test]
    async fn test_empty_chain_allows() {
        let chain = FilterChain::default();
        assert!(chain.is_empty());
        assert_eq!(chain.execute(&parts(), addr()).await, FilterAction::Allow);
    }
}
