use anyhow::Result;
use buildlogger_gateway::{config, init_tracing, server};
use colored::Colorize;
use std::path::Path;
use tracing::info;

/// Execute the start command
///
/// This will:
/// 1. Load configuration
/// 2. Initialize tracing from the configured level and format
/// 3. Start the server
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting buildlogger gateway...".green());

    let cfg = config::load_config(config_path)?;
    init_tracing(&cfg.server.log_level, &cfg.server.log_format);
    info!(config = %config_path.display(), "Configuration loaded");

    // Blocks until shutdown
    server::start_server(cfg).await?;

    Ok(())
}
