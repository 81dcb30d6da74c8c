use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("initialising log filter")?;
    fmt().with_env_filter(filter).init();

    let config = resrv::config::Config::from_env().context("loading configuration")?;

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "resrv starting: RUST_LOG='{}', addr={}, backend='{}', timeout_ms={}, page_size={}, cookie_secure={}",
        rust_log,
        config.addr(),
        config.backend_url,
        config.backend_timeout.as_millis(),
        config.page_size,
        config.cookie_secure
    );

    resrv::server::run(config).await
}
