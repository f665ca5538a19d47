//! `market uninstall`.

use colored::Colorize;
use market_core::{Error, PackageInstaller, UninstallOptions};

use crate::error::{CliError, Result};

/// Handle `market uninstall <id> [--force] [--keep-config]`
pub async fn handle_uninstall(installer: &PackageInstaller, id: &str, options: UninstallOptions) -> Result<()> {
    let removed = match installer.uninstall_package(id, options).await {
        Ok(removed) => removed,
        Err(e @ Error::HasDependents { .. }) => {
            return Err(CliError::user(format!("{e}. Use --force to remove it anyway")));
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "{} Removed {} from {}",
        "OK".green().bold(),
        removed.package.spec().cyan(),
        removed.path.display()
    );
    if options.keep_config {
        println!("   {} configuration kept for the next install", "Note:".dimmed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::InstallOptions;
    use market_test_utils::TestMarket;

    #[tokio::test]
    async fn dependents_produce_a_hint() {
        let market = TestMarket::new();
        market.publish_simple("y", "1.0.0", &[]);
        market.publish_simple("x", "1.0.0", &[("y", "*")]);
        market
            .installer
            .install_package("x", &InstallOptions::default())
            .await
            .unwrap();

        let err = handle_uninstall(&market.installer, "y", UninstallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CliError::User { .. }));
        assert!(err.to_string().contains("--force"), "{err}");
        market.assert_installed("y");
    }

    #[tokio::test]
    async fn removes_installed_package() {
        let market = TestMarket::new();
        market.publish_simple("gone", "1.0.0", &[]);
        market
            .installer
            .install_package("gone", &InstallOptions::default())
            .await
            .unwrap();

        handle_uninstall(&market.installer, "gone", UninstallOptions::default())
            .await
            .unwrap();

        market.assert_not_installed("gone");
    }
}
