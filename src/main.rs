mod app;
mod artifacts;
mod auth;
mod authz;
mod config;
mod db;
mod error;
#[cfg(test)]
mod fakes;
mod products;
mod reviews;
mod state;
mod storage;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "softswap=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;
    tracing::info!(
        ordering = %state.ordering(),
        upload_limit_bytes = state.config.upload_limit_bytes,
        "state ready"
    );

    app::serve(app::build_app(state)).await
}
