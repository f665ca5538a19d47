//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Extension marketplace - install and manage packages
#[derive(Parser, Debug)]
#[command(name = "market")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ~/.market/config.toml)
    #[arg(long, global = true, env = "MARKET_CONFIG")]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install a package and its dependencies
    ///
    /// Examples:
    ///   market install git-helper
    ///   market install git-helper --force --no-deps
    ///   market install git-helper --tool cursor
    Install {
        /// Package id
        id: String,

        /// Reinstall even if already installed
        #[arg(short, long)]
        force: bool,

        /// Do not install dependencies
        #[arg(long)]
        no_deps: bool,

        /// Skip archive checksum verification
        #[arg(long)]
        skip_checksum: bool,

        /// Host tool to check compatibility against
        #[arg(short, long)]
        tool: Option<String>,

        /// Install under this directory instead of the configured one
        #[arg(long)]
        target_dir: Option<PathBuf>,
    },

    /// Remove an installed package
    Uninstall {
        /// Package id
        id: String,

        /// Remove even if other packages depend on it
        #[arg(short, long)]
        force: bool,

        /// Keep the package's config/ directory for a later install
        #[arg(long)]
        keep_config: bool,
    },

    /// Reinstall a package at its latest registry version
    Update {
        /// Package id
        id: String,
    },

    /// List installed packages with a different registry version
    Outdated {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved dependency tree of a package
    Tree {
        /// Package id
        id: String,
    },

    /// List installed packages
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Enable an installed package
    Enable {
        /// Package id
        id: String,
    },

    /// Disable an installed package without removing it
    Disable {
        /// Package id
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_install_flags() {
        let cli = Cli::try_parse_from([
            "market",
            "install",
            "git-helper",
            "--force",
            "--no-deps",
            "--tool",
            "cursor",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Commands::Install {
                id: "git-helper".into(),
                force: true,
                no_deps: true,
                skip_checksum: false,
                tool: Some("cursor".into()),
                target_dir: None,
            }
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["market", "list", "--json", "-v", "--config", "/tmp/c.toml"])
            .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert_eq!(cli.command, Commands::List { json: true });
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["market"]).is_err());
    }
}
