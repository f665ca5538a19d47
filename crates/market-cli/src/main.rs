//! Extension marketplace CLI
//!
//! Installs, updates and removes marketplace packages.

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;
use market_core::{InstallOptions, MarketConfig, PackageInstaller, UninstallOptions};

use cli::{Cli, Commands};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: logging disabled: {e}", "warning".yellow().bold());
    }
    tracing::debug!("Verbose mode enabled");

    let config = MarketConfig::load(cli.config.as_deref())?;
    let installer = PackageInstaller::from_config(&config);
    execute_command(&installer, &config, cli.command).await
}

async fn execute_command(installer: &PackageInstaller, config: &MarketConfig, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Install {
            id,
            force,
            no_deps,
            skip_checksum,
            tool,
            target_dir,
        } => {
            let options = InstallOptions {
                force,
                install_dependencies: !no_deps,
                target_dir,
                skip_checksum,
                code_tool: tool.or_else(|| config.code_tool.clone()),
            };
            commands::handle_install(installer, &id, &options).await
        }
        Commands::Uninstall {
            id,
            force,
            keep_config,
        } => commands::handle_uninstall(installer, &id, UninstallOptions { force, keep_config }).await,
        Commands::Update { id } => commands::handle_update(installer, &id).await,
        Commands::Outdated { json } => commands::handle_outdated(installer, json).await,
        Commands::Tree { id } => commands::handle_tree(installer, &id).await,
        Commands::List { json } => commands::handle_list(installer, json),
        Commands::Enable { id } => commands::handle_set_enabled(installer, &id, true),
        Commands::Disable { id } => commands::handle_set_enabled(installer, &id, false),
    }
}
