//! Blocked-request audit log
//!
//! The evaluator never writes logs directly; it hands each rejection to a
//! [`BlockedRequestLog`] injected at construction. Implementations must be
//! safe to call from many requests at once.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

/// Request identity recorded for a blocked request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockedRequest {
    #[serde(rename = "user-agent")]
    pub user_agent: String,
    #[serde(rename = "ip")]
    pub remote_addr: String,
    pub host: String,
    pub uri: String,
}

/// Sink for rejected requests
pub trait BlockedRequestLog: Send + Sync {
    /// `filter` is the instance name, `reason` the human-readable verdict
    fn record(&self, filter: &str, reason: &str, request: &BlockedRequest);
}

/// Default sink: one `warn` line per rejection with the record as JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBlockLog;

impl BlockedRequestLog for TracingBlockLog {
    fn record(&self, filter: &str, reason: &str, request: &BlockedRequest) {
        tracing::warn!("{}", blocked_line(filter, reason, request));
    }
}

/// `<filter>: Blocked (<reason>) - <json record>`
pub fn blocked_line(filter: &str, reason: &str, request: &BlockedRequest) -> String {
    match serde_json::to_string(request) {
        Ok(json) => format!("{}: Blocked ({}) - {}", filter, reason, json),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize blocked request");
            fallback_line(filter, reason, request)
        }
    }
}

/// Plain-text line used when the record cannot be serialized
fn fallback_line(filter: &str, reason: &str, request: &BlockedRequest) -> String {
    format!("{}: Blocked ({}) - {}", filter, reason, request.user_agent)
}

/// One captured rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub filter: String,
    pub reason: String,
    pub request: BlockedRequest,
}

/// In-memory sink, handy for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryBlockLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryBlockLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries are only ever pushed whole, so a poisoned lock still guards a
    /// consistent list; keep recording instead of dropping rejections.
    fn lock(&self) -> MutexGuard<'_, Vec<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Blocked-request log lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl BlockedRequestLog for MemoryBlockLog {
    fn record(&self, filter: &str, reason: &str, request: &BlockedRequest) {
        self.lock().push(AuditEntry {
            filter: filter.to_string(),
            reason: reason.to_string(),
            request: request.clone(),
        });
    }
}
