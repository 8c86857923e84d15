//! TCP server hosting the filter chain
//!
//! Responsibilities:
//! - Accept TCP connections
//! - HTTP/1.1 parsing via hyper
//! - Spawn per-connection tasks
//! - Run the filter chain, then hand allowed requests to the upstream

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::{GateError, Result};
use crate::filter::{FilterAction, FilterChain};
use crate::proxy::Upstream;

pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    filter_chain: Arc<FilterChain>,
    upstream: Arc<dyn Upstream>,
}

impl Server {
    pub async fn bind(
        addr: SocketAddr,
        filter_chain: FilterChain,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GateError::Bind { addr, source: e })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|e| GateError::Config(format!("Failed to get local address: {}", e)))?;

        info!(%actual_addr, "Server bound successfully");

        Ok(Self {
            listener,
            addr: actual_addr,
            filter_chain: Arc::new(filter_chain),
            upstream,
        })
    }

    pub async fn run(self) -> Result<()> {
        info!(addr = %self.addr, "Starting server");

        loop {
            let (stream, remote_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(%e, "Failed to accept connection");
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let filter_chain = self.filter_chain.clone();
            let upstream = self.upstream.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    handle_request(req, remote_addr, filter_chain.clone(), upstream.clone())
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(%remote_addr, %e, "Connection error");
                }
            });
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Filter the request head, then forward the reassembled request or reject
async fn handle_request(
    req: Request<Incoming>,
    remote_addr: SocketAddr,
    filter_chain: Arc<FilterChain>,
    upstream: Arc<dyn Upstream>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    debug!(%remote_addr, method = %parts.method, uri = %parts.uri, "Request received");

    let response = match filter_chain.execute(&parts, remote_addr).await {
        FilterAction::Allow => {
            let req = Request::from_parts(parts, body);
            match upstream.forward(req, remote_addr).await {
                Ok(response) => response,
                Err(e) => {
                    error!(%remote_addr, error = %e, "Upstream forward failed");
                    filter_chain.action_to_response(FilterAction::Deny {
                        status: StatusCode::BAD_GATEWAY.as_u16(),
                        reason: "Bad Gateway".to_string(),
                    })
                }
            }
        }
        rejected => filter_chain.action_to_response(rejected),
    };

    Ok(response)
}
