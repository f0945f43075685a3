mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use crewbot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use crewbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = bootstrap::load_config(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config);

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.registry.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "crewbot-server started"
    );

    tokio::select! {
        result = app.gateway_runner.start() => {
            result?;
            tracing::warn!(
                event_name = "system.server.gateway_stopped",
                correlation_id = "runtime",
                "gateway loop ended; waiting for shutdown signal"
            );
            wait_for_shutdown().await?;
        }
        result = wait_for_shutdown() => result?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "crewbot-server stopping"
    );
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, app.transport.disconnect()).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::warn!(
            event_name = "system.server.disconnect_failed",
            correlation_id = "shutdown",
            error = %error,
            "gateway disconnect failed"
        ),
        Err(_) => tracing::warn!(
            event_name = "system.server.disconnect_timeout",
            correlation_id = "shutdown",
            grace_secs = app.config.server.graceful_shutdown_secs,
            "gateway disconnect did not finish within the grace period"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
