//! `market outdated`.

use colored::Colorize;
use market_core::PackageInstaller;

use crate::error::Result;

/// Handle `market outdated [--json]`
pub async fn handle_outdated(installer: &PackageInstaller, json: bool) -> Result<()> {
    let updates = installer.check_for_updates().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updates)?);
        return Ok(());
    }

    if updates.is_empty() {
        println!("{} All packages are up to date.", "=>".blue().bold());
        return Ok(());
    }
    println!("{} Updates available:", "=>".blue().bold());
    for update in &updates {
        println!(
            "   {} {} -> {}",
            update.id.cyan(),
            update.current_version.dimmed(),
            update.latest_version.green()
        );
        if let Some(changelog) = &update.changelog {
            println!("      {}", changelog.dimmed());
        }
    }
    println!("   {} Run {} to apply", "Next:".dimmed(), "market update <id>".bold());
    Ok(())
}
