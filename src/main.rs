//! User-Agent gatekeeper - Entry point

use std::sync::Arc;

use block_useragents::audit::TracingBlockLog;
use block_useragents::config::Config;
use block_useragents::filter::{FilterChain, UserAgentFilter};
use block_useragents::proxy::ProxyClient;
use block_useragents::server::Server;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    let user_agent_filter = UserAgentFilter::new(
        config.filter.name.clone(),
        &config.filter.policy,
        Arc::new(TracingBlockLog),
    )?;
    tracing::info!(policy = %config.filter.policy_file.display(), "Policy loaded");

    let filter_chain = FilterChain::new().add_filter(Arc::new(user_agent_filter));
    let proxy_client = ProxyClient::new(config.proxy.into())?;

    let server = Server::bind(
        config.server.bind_addr()?,
        filter_chain,
        Arc::new(proxy_client),
    )
    .await?;
    server.run().await?;

    Ok(())
}
