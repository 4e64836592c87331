use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use buildlogger_gateway::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    match args.get_command() {
        cli::Commands::Start => {
            // Tracing is initialized from the loaded configuration
            commands::start::execute(&args.config).await?;
        }
        cli::Commands::Test => {
            init_tracing("info", "text");
            commands::test::execute(&args.config)?;
        }
        cli::Commands::Config { action } => {
            init_tracing("info", "text");
            match action {
                cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            }
        }
        cli::Commands::Version => {
            println!("Buildlogger Gateway v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
