use std::path::PathBuf;

use color_eyre::{eyre::eyre, Result};
use shredlink::config::AppConfig;
use shredlink::pipeline::Pipeline;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let path = AppConfig::resolve_path(std::env::args_os().nth(1).map(PathBuf::from));
    let config = AppConfig::load(&path).await?;
    setup_logging_env(config.log_level()?);

    if path.exists() {
        info!("Using config {}", path.display());
    } else {
        warn!("No config at {}, running with defaults", path.display());
    }

    let pipeline = Pipeline::assemble(config)?
        .start_hardware()
        .await
        .map_err(|e| eyre!("Failed to start pipeline: {}", e))?;
    if let Some(e) = pipeline.tilt_error() {
        warn!("Running without tilt sensor: {}", e);
    }

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received");

    pipeline.shutdown().await;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
