//! Drowsiness Monitor - Main Entry Point

use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_logging(&config.log)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        camera = config.camera.index,
        fallback = config.camera.fallback_index,
        frame_skip = config.capture.frame_skip,
        "Starting driver drowsiness monitor..."
    );

    run_server(config).await?;

    Ok(())
}
