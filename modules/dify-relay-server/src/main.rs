use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dify_relay_common::Config;
use dify_relay_server::{build_router, AppState};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_tracing(production: bool) {
    if production {
        tracing_subscriber::fmt().with_env_filter(env_filter()).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Config warnings go to a plain subscriber until the configured one is installed.
    let bootstrap = tracing_subscriber::fmt().with_env_filter(env_filter()).finish();
    let config = tracing::subscriber::with_default(bootstrap, Config::from_env);

    init_tracing(config.is_production());
    config.log_summary();

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, http));
    let app = build_router(state);

    info!("Dify relay starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
