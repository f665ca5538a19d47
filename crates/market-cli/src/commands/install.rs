//! `market install` and `market update`.

use colored::Colorize;
use market_core::{Error, InstallOptions, InstallOutcome, PackageInstaller};

use crate::error::{CliError, Result};

/// Handle `market install <id> [...]`
pub async fn handle_install(installer: &PackageInstaller, id: &str, options: &InstallOptions) -> Result<()> {
    let outcome = installer.install_package(id, options).await?;

    if outcome.already_installed {
        println!(
            "{} {} is already installed at {}",
            "=>".blue().bold(),
            outcome.package.spec().cyan(),
            outcome.path.display()
        );
        println!("   {} Use {} to reinstall", "Hint:".dimmed(), "--force".bold());
        return Ok(());
    }

    report(&outcome, "Installed");
    Ok(())
}

/// Handle `market update <id>`
pub async fn handle_update(installer: &PackageInstaller, id: &str) -> Result<()> {
    let previous = installer.installed(id)?.map(|p| p.package.version);
    let outcome = match installer.update_package(id).await {
        Ok(outcome) => outcome,
        Err(Error::HasDependents { dependents, .. }) => {
            return Err(CliError::user(format!(
                "cannot update '{id}' while {} depend on it",
                dependents.join(", ")
            )));
        }
        Err(e) => return Err(e.into()),
    };

    match previous {
        Some(version) if version != outcome.package.version => report(
            &outcome,
            &format!("Updated {version} ->"),
        ),
        _ => report(&outcome, "Reinstalled"),
    }
    Ok(())
}

fn report(outcome: &InstallOutcome, verb: &str) {
    for dependency in &outcome.dependencies {
        if !dependency.already_installed {
            println!("   {} {}", "+".green(), dependency.package.spec());
        }
        print_warnings(&dependency.warnings);
    }
    println!(
        "{} {} {} ({} ms)",
        "OK".green().bold(),
        verb,
        outcome.package.spec().cyan(),
        outcome.duration.as_millis()
    );
    println!("   {} {}", "Path:".dimmed(), outcome.path.display());
    print_warnings(&outcome.warnings);
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        println!("   {} {}", "warning:".yellow().bold(), warning);
    }
}
