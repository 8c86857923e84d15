//! Unified error types for the User-Agent gatekeeper

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Upstream connection failed: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: at least one allowed browser must be specified")]
    NoBrowsers,

    #[error("Configuration error: browser rule {name:?} has neither a pattern nor a version threshold")]
    InertRule { name: String },

    #[error("Configuration error: browser rule {name:?} has invalid version threshold {threshold:?}")]
    InvalidThreshold { name: String, threshold: String },

    #[error("Configuration error: invalid browser pattern for {name:?}: {source}")]
    InvalidBrowserPattern { name: String, source: regex::Error },

    #[error("Configuration error: invalid OS pattern {pattern:?}: {source}")]
    InvalidOsPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Failed to load policy file {path}: {reason}")]
    PolicyFile { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, GateError>;
