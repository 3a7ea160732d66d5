//! # Site Admin API
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`SITE_CONFIG` file, then environment overrides)
//! 2. Initialize telemetry sinks under the configured log directory
//! 3. Open the request id record and build the router
//! 4. Serve until Ctrl+C

use anyhow::{Context, Result};
use tracing::{error, info};

use site_admin_api::{AdminApiService, AdminConfig, VERSION};
use site_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AdminConfig::load().context("failed to load configuration")?;

    let _telemetry = init_telemetry(
        TelemetryConfig::from_env().with_log_dir(config.storage.log_dir.clone()),
    )
    .context("failed to initialize telemetry")?;

    info!("===========================================");
    info!("  Site Admin API v{}", VERSION);
    info!("  Listening on {}", config.http_addr());
    info!("===========================================");

    let service = AdminApiService::new(config).context("failed to create service")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    service
        .serve_with_shutdown(shutdown)
        .await
        .context("server terminated with an error")?;

    Ok(())
}
