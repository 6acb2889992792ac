use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use portalsync::config::{default_config_path, PortalConfig};
use portalsync::navigator::{ChromeLauncher, PortalNavigator};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "portalsync")]
#[command(about = "Browser-assisted capture of investment portal data")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the portal automation once with a live browser
    Run {
        /// Print the run result as JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "info,chromiumoxide=warn,chromiumoxide::conn=off,chromiumoxide::handler=off",
            )
        }))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = PortalConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    match cli.command {
        Command::Run { json } => {
            let mut navigator = PortalNavigator::new(config)?;
            let result = navigator.run(&ChromeLauncher).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for line in &result.logs {
                    println!("{line}");
                }
                println!();
                println!("{}", result.message);
                if let Some(data) = &result.data {
                    println!("Available balance: {}", data.balance);
                }
            }

            if !result.success {
                std::process::exit(1);
            }
        }
        Command::Config => {
            println!("Config file: {}", config_path.display());
            println!("Login URL: {}", config.urls.login);
            println!("Target URL: {}", config.urls.target);
            println!(
                "Timeouts: navigation {:?}, login confirmation {:?}, element visibility {:?}",
                config.timeouts.navigation,
                config.timeouts.login_confirmation,
                config.timeouts.element_visibility
            );
            println!("Filters: {}", config.filters.labels.len());
            println!("Table columns: {}", config.table.columns.len());
        }
    }

    Ok(())
}
