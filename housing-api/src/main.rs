//! `housing-api` binary: serves published predictions over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use housing_core::logging::{init_logging, LogConfig};

struct ServerConfig {
    host: String,
    port: u16,
    published_dir: PathBuf,
}

impl ServerConfig {
    fn from_env() -> Self {
        let host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);
        let published_dir = std::env::var("PUBLISHED_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/published"));

        Self {
            host,
            port,
            published_dir,
        }
    }

    fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_logging(LogConfig::from_env()).context("failed to initialize logging")?;

    let config = ServerConfig::from_env();
    let addr = config
        .socket_addr()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    if !config.published_dir.exists() {
        warn!(
            dir = %config.published_dir.display(),
            "published directory does not exist yet"
        );
    }

    let app = housing_api::router(config.published_dir.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        published_dir = %config.published_dir.display(),
        "lookup service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("lookup service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
