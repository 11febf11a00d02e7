//! Lodging search HTTP server.
//!
//! # Environment Variables
//!
//! - `HOTELS_SIMULATOR_URL`: upstream simulator endpoint (required)
//! - `HOST`: bind host (default: 0.0.0.0)
//! - `PORT`: bind port (default: 3001)
//! - `CLIENT_ORIGIN`: allowed CORS origin (default: *)
//! - `PROVIDER_TIMEOUT_MS`, `PROVIDER_MAX_RETRIES`, `SEARCH_MAX_IN_FLIGHT`
//! - `RUST_LOG`: log filter (default: info)

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ski_lodging_search::http::{create_router, AppState};
use ski_lodging_search::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = ServiceConfig::from_env().context("loading configuration")?;
    let providers = config
        .build_providers()
        .context("building search providers")?;
    info!(
        providers = providers.len(),
        simulator = %config.simulator.url,
        max_in_flight = ?config.max_in_flight,
        "providers ready"
    );

    let state = AppState::new(providers, config.max_in_flight);
    let app = create_router(state, &config.client_origin);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
