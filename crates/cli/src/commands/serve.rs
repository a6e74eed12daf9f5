//! `ragline serve`: Start the HTTP API server.

use std::path::Path;

use tracing::info;

use super::{load_config, require_api_key};

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;
    require_api_key(&config)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    info!(
        host = %config.gateway.host,
        port = config.gateway.port,
        index = config.retrieval.index_name.as_deref().unwrap_or("<unset>"),
        backend = ?config.retrieval.backend,
        "Starting Ragline gateway"
    );

    ragline_gateway::start(config).await?;

    Ok(())
}
