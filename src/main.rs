use std::env;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use magpie_backend::logging;
use magpie_backend::server;
use magpie_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    logging::init(&state.paths);

    let server_settings = state.config.server_settings();
    let port = env::var("MAGPIE_PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(server_settings.port);
    let bind_addr = format!("{}:{}", server_settings.host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
