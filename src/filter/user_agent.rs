//! User-Agent allow-list filter
//!
//! Every request is blocked unless its User-Agent:
//! - matches at least one allowed browser rule, and
//! - matches at least one allowed OS pattern, when any are configured.
//!
//! Rejections answer 403 and go to the injected [`BlockedRequestLog`].
//! A missing request answers 400 without touching the matchers or the log.

use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use http::request::Parts;
use hyper::header::{HOST, USER_AGENT};

use crate::audit::{BlockedRequest, BlockedRequestLog};
use crate::error::Result;
use crate::filter::{Filter, FilterAction};
use crate::matcher::MatcherSet;
use crate::policy::PolicyConfig;

/// Outcome of evaluating one User-Agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Forward,
    RejectNoUserAgent,
    RejectUnsupportedBrowser,
    RejectUnsupportedOs,
}

impl Verdict {
    pub fn is_forward(self) -> bool {
        self == Verdict::Forward
    }

    pub fn reason(self) -> &'static str {
        match self {
            Verdict::Forward => "Allowed",
            Verdict::RejectNoUserAgent => "No User-Agent",
            Verdict::RejectUnsupportedBrowser => "Unsupported Browser",
            Verdict::RejectUnsupportedOs => "Unsupported OS",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

pub struct UserAgentFilter {
    name: String,
    matchers: MatcherSet,
    audit: Arc<dyn BlockedRequestLog>,
}

impl UserAgentFilter {
    /// Validate and compile the policy
    ///
    /// Fails on an empty browser list, a rule with neither pattern nor
    /// version threshold, or any pattern that is not a valid regex.
    pub fn new(
        name: impl Into<String>,
        policy: &PolicyConfig,
        audit: Arc<dyn BlockedRequestLog>,
    ) -> Result<Self> {
        let name = name.into();
        let matchers = MatcherSet::compile(policy)?;

        tracing::info!(
            filter = %name,
            browsers = matchers.browsers().len(),
            os_patterns = matchers.os_patterns().len(),
            "User-Agent filter ready"
        );

        Ok(Self {
            name,
            matchers,
            audit,
        })
    }

    /// Decide for a single User-Agent value
    pub fn evaluate(&self, user_agent: Option<&str>) -> Verdict {
        let user_agent = match user_agent {
            Some(ua) if !ua.is_empty() => ua,
            _ => return Verdict::RejectNoUserAgent,
        };

        if !self.matchers.matches_browser(user_agent) {
            return Verdict::RejectUnsupportedBrowser;
        }

        if !self.matchers.matches_os(user_agent) {
            return Verdict::RejectUnsupportedOs;
        }

        Verdict::Forward
    }

    /// Evaluate a request head, recording rejections
    ///
    /// `None` stands for a request that could not be read at all.
    pub fn check(&self, req: Option<&Parts>, remote_addr: SocketAddr) -> FilterAction {
        let Some(req) = req else {
            return FilterAction::bad_request();
        };

        let user_agent = user_agent(req);
        let verdict = self.evaluate(user_agent.as_deref());

        if verdict.is_forward() {
            return FilterAction::Allow;
        }

        let blocked = BlockedRequest {
            user_agent: user_agent.map(Cow::into_owned).unwrap_or_default(),
            remote_addr: remote_addr.to_string(),
            host: request_host(req),
            uri: req.uri.to_string(),
        };
        self.audit.record(&self.name, verdict.reason(), &blocked);

        FilterAction::forbidden(verdict.reason())
    }
}

#[async_trait::async_trait]
impl Filter for UserAgentFilter {
    async fn filter(&self, req: &Parts, remote_addr: SocketAddr) -> FilterAction {
        self.check(Some(req), remote_addr)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn user_agent(req: &Parts) -> Option<Cow<'_, str>> {
    req.headers
        .get(USER_AGENT)
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
}

/// Host header, falling back to the URI authority (absolute-form requests)
fn request_host(req: &Parts) -> String {
    req.headers
        .get(HOST)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .or_else(|| req.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}
