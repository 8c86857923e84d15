//! Configuration management via environment variables
//!
//! Loads configuration from environment variables with .env file support.
//! The browser/OS allow-list lives in a separate policy file referenced by
//! `POLICY_FILE`.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{GateError, Result};
use crate::policy::PolicyConfig;

const DEFAULT_FILTER_NAME: &str = "block-useragents";

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
    pub filter: FilterConfig,
}

/// Server binding configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub upstream_url: String,
    pub timeout: Duration,
    pub preserve_host: bool,
}

/// User-Agent filter settings
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Instance name prefixed to every blocked-request log line
    pub name: String,
    pub policy_file: PathBuf,
    pub policy: PolicyConfig,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Reads .env file if present, then parses environment variables.
    /// Returns error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            server: ServerConfig::from_env()?,
            proxy: ProxyConfig::from_env()?,
            filter: FilterConfig::from_env()?,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| GateError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

        Ok(Self { host, port })
    }

    pub fn bind_addr(&self) -> Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| GateError::Config(format!("Invalid SERVER_HOST: {}", e)))
    }
}

impl ProxyConfig {
    fn from_env() -> Result<Self> {
        let upstream_url = env::var("PROXY_UPSTREAM_URL")
            .map_err(|_| GateError::Config("PROXY_UPSTREAM_URL is required".to_string()))?;

        let timeout_secs = env::var("PROXY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map_err(|e| GateError::Config(format!("Invalid PROXY_TIMEOUT_SECS: {}", e)))?;

        let preserve_host = env::var("PROXY_PRESERVE_HOST")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .map_err(|e| GateError::Config(format!("Invalid PROXY_PRESERVE_HOST: {}", e)))?;

        Ok(Self {
            upstream_url,
            timeout: Duration::from_secs(timeout_secs),
            preserve_host,
        })
    }
}

impl From<ProxyConfig> for crate::proxy::ProxyConfig {
    fn from(config: ProxyConfig) -> Self {
        crate::proxy::ProxyConfig::new(config.upstream_url)
            .with_timeout(config.timeout)
            .with_preserve_host(config.preserve_host)
    }
}

impl FilterConfig {
    fn from_env() -> Result<Self> {
        let name = env::var("FILTER_NAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER_NAME.to_string());

        let policy_file = env::var("POLICY_FILE")
            .map(PathBuf::from)
            .map_err(|_| GateError::Config("POLICY_FILE is required".to_string()))?;

        let policy = PolicyConfig::from_file(&policy_file)?;

        Ok(Self {
            name,
            policy_file,
            policy,
        })
    }
}
