//! `market list`, `market enable` and `market disable`.

use colored::Colorize;
use market_core::{InstalledPackage, PackageInstaller};

use crate::error::Result;

/// Handle `market list [--json]`
pub fn handle_list(installer: &PackageInstaller, json: bool) -> Result<()> {
    let packages = installer.list_installed()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(());
    }

    if packages.is_empty() {
        println!("{} No packages installed.", "=>".blue().bold());
        return Ok(());
    }
    println!("{} Installed packages:", "=>".blue().bold());
    for package in &packages {
        println!("   {}", describe(package));
    }
    Ok(())
}

fn describe(record: &InstalledPackage) -> String {
    let state = if record.enabled {
        String::new()
    } else {
        format!(" {}", "(disabled)".yellow())
    };
    format!(
        "{} {}{} {}",
        record.id().cyan(),
        record.version(),
        state,
        record.path.display().to_string().dimmed()
    )
}

/// Handle `market enable <id>` and `market disable <id>`
pub fn handle_set_enabled(installer: &PackageInstaller, id: &str, enabled: bool) -> Result<()> {
    let record = installer.set_enabled(id, enabled)?;
    let state = if enabled { "Enabled" } else { "Disabled" };
    println!("{} {} {}", "OK".green().bold(), state, record.package.spec().cyan());
    Ok(())
}
