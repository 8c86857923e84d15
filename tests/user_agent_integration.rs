use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use hyper_util::client::legacy::{Client, connect::HttpConnector};

use block_useragents::audit::MemoryBlockLog;
use block_useragents::error::Result;
use block_useragents::filter::{FilterChain, UserAgentFilter};
use block_useragents::policy::{BrowserRule, PolicyConfig};
use block_useragents::proxy::Upstream;
use block_useragents::server::Server;

const FIREFOX_ANDROID: &str =
    "Mozilla/5.0 (Android 14; Mobile; rv:123.0) Gecko/123.0 Firefox/123.0";
const FIREFOX_WINDOWS: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0";

/// Next stage that counts calls and echoes the User-Agent it received
struct EchoUpstream {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Upstream for EchoUpstream {
    async fn forward(
        &self,
        req: Request<Incoming>,
        _client_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ua = req
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("missing")
            .to_string();
        Ok(Response::new(Full::new(Bytes::from(ua))))
    }
}

struct Harness {
    addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    log: Arc<MemoryBlockLog>,
    handle: tokio::task::JoinHandle<()>,
}

async fn start(policy: PolicyConfig) -> Harness {
    let log = Arc::new(MemoryBlockLog::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let filter = UserAgentFilter::new("it-gate", &policy, log.clone()).unwrap();
    let chain = FilterChain::new().add_filter(Arc::new(filter));
    let upstream = Arc::new(EchoUpstream {
        calls: calls.clone(),
    });

    let server = Server::bind(SocketAddr::from(([127, 0, 0, 1], 0)), chain, upstream)
        .await
        .unwrap();
    let addr = server.addr();
    let handle = tokio::spawn(async move {
        let _ = server.run().await;
    });

    Harness {
        addr,
        calls,
        log,
        handle,
    }
}

async fn send(addr: SocketAddr, user_agent: Option<&str>) -> (StatusCode, String) {
    let client: Client<HttpConnector, Full<Bytes>> =
        Client::builder(hyper_util::rt::TokioExecutor::new()).build_http();

    let mut builder = Request::builder().uri(format!("http://{}/account?tab=1", addr));
    if let Some(ua) = user_agent {
        builder = builder.header("User-Agent", ua);
    }
    let req = builder.body(Full::new(Bytes::new())).unwrap();

    let response = client.request(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn firefox_policy(os: &[&str]) -> PolicyConfig {
    PolicyConfig::new(
        vec![BrowserRule::with_version("Firefox", ">122")],
        os.iter().map(|s| s.to_string()).collect(),
    )
}

#[tokio::test]
async fn test_allowed_request_reaches_upstream_unchanged() {
    let h = start(firefox_policy(&[])).await;

    let (status, body) = send(h.addr, Some(FIREFOX_WINDOWS)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, FIREFOX_WINDOWS);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    assert!(h.log.is_empty());

    h.handle.abort();
}

#[tokio::test]
async fn test_old_browser_is_forbidden() {
    let h = start(firefox_policy(&[])).await;

    let (status, _) = send(h.addr, Some("Mozilla/5.0 Firefox/122.0")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);

    let entries = h.log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason, "Unsupported Browser");
    assert_eq!(entries[0].request.uri, "/account?tab=1");
    assert_eq!(entries[0].request.host, h.addr.to_string());
    assert!(entries[0].request.remote_addr.starts_with("127.0.0.1:"));

    h.handle.abort();
}

#[tokio::test]
async fn test_unsupported_os_is_forbidden() {
    let h = start(firefox_policy(&["Android"])).await;

    let (status, _) = send(h.addr, Some(FIREFOX_WINDOWS)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(h.log.entries()[0].reason, "Unsupported OS");

    let (status, _) = send(h.addr, Some(FIREFOX_ANDROID)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);

    h.handle.abort();
}

#[tokio::test]
async fn test_missing_user_agent_is_forbidden() {
    let h = start(firefox_policy(&[])).await;

    let (status, _) = send(h.addr, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(h.log.entries()[0].reason, "No User-Agent");
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);

    h.handle.abort();
}

#[tokio::test]
async fn test_concurrent_requests_share_filter() {
    let h = start(PolicyConfig::new(
        vec![
            BrowserRule::with_pattern("Chrome", "Chrome/12[0-1].*"),
            BrowserRule::with_version("Firefox", ">122"),
        ],
        vec![],
    ))
    .await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let addr = h.addr;
        tasks.push(tokio::spawn(async move {
            let ua = if i % 2 == 0 {
                "Mozilla/5.0 Chrome/120.0"
            } else {
                "Mozilla/5.0 Chrome/122.0"
            };
            send(addr, Some(ua)).await.0
        }));
    }

    let mut allowed = 0;
    let mut forbidden = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::OK => allowed += 1,
            StatusCode::FORBIDDEN => forbidden += 1,
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(allowed, 10);
    assert_eq!(forbidden, 10);
    assert_eq!(h.calls.load(Ordering::SeqCst), 10);
    assert_eq!(h.log.len(), 10);

    h.handle.abort();
}
