//! User-Agent gatekeeper
//!
//! Reverse proxy that only lets through requests whose `User-Agent` matches
//! an allow-list of browsers and, optionally, operating systems:
//! - Policy compilation (explicit regexes, version thresholds)
//! - Per-request evaluation with structured logging of rejections
//! - hyper-based server forwarding allowed requests upstream

pub mod audit;
pub mod config;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod policy;
pub mod proxy;
pub mod server;
pub mod version;
