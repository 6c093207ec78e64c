use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use webpilot::brain::Brain;
use webpilot::config::Config;
use webpilot::face::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env()?);
    let port = config.port;
    let state = Arc::new(AppState {
        brain: Brain::new(config.clone()),
        config,
    });

    let app = face::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "webpilot listening");
    axum::serve(listener, app).await?;
    Ok(())
}
