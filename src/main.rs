use std::sync::Arc;

use anyhow::Context;
use pulse_bff::auth::SignedSessionValidator;
use pulse_bff::config::Config;
use pulse_bff::proxy::ProxyHandler;
use pulse_bff::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let Config {
        server: server_cfg,
        backend,
        session,
    } = Config::load()?;

    let sessions =
        SignedSessionValidator::from_config(session).context("SESSION_SECRET must be set")?;
    tracing::info!(backend = %backend.url, timeout_ms = backend.timeout.as_millis() as u64, "Proxy configured");
    let handler = Arc::new(ProxyHandler::new(backend, sessions)?);

    tokio::select! {
        res = server::listener::run(&server_cfg.listen_addr, handler) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
