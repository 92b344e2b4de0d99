use std::sync::Arc;

use clap::Parser;

use mcp_chat_gateway::config::{Cli, Settings};
use mcp_chat_gateway::mcp::StreamableHttpConnector;
use mcp_chat_gateway::providers::openai::OpenAiClient;
use mcp_chat_gateway::server::{AppState, router};
use mcp_chat_gateway::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = telemetry::init_from_env()?;

    let settings = Settings::from_cli(cli)?;
    tracing::info!(
        bind = %settings.bind,
        model = %settings.provider.model,
        base_url = %settings.provider.base_url,
        mcp_endpoint = %settings.mcp_endpoint,
        max_steps = settings.orchestrator.max_steps,
        gateway_token = settings.has_gateway_token(),
        "starting gateway"
    );

    let model = OpenAiClient::new(settings.provider.clone())?;
    let state = AppState {
        model: Arc::new(model),
        connector: Arc::new(StreamableHttpConnector::new()),
        mcp_endpoint: settings.mcp_endpoint.as_str().into(),
        orchestrator: settings.orchestrator.clone(),
        ui: settings.ui.clone(),
    };

    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
