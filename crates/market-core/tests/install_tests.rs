//! End-to-end install pipeline tests against in-memory collaborators.

use std::time::Duration;

use market_core::{DownloadPolicy, Error, InstallOptions, Package};
use market_test_utils::{Failure, TestMarket, tar_gz_archive, zip_archive};
use pretty_assertions::assert_eq;

fn defaults() -> InstallOptions {
    InstallOptions::default()
}

fn ids(outcomes: &[market_core::InstallOutcome]) -> Vec<&str> {
    outcomes.iter().map(|o| o.package.id.as_str()).collect()
}

#[tokio::test]
async fn installs_dependency_before_dependent() {
    let market = TestMarket::new();
    market.publish_simple("lib", "2.1.5", &[]);
    market.publish_simple("app", "1.0.0", &[("lib", "^2.1.0")]);

    let outcome = market.installer.install_package("app", &defaults()).await.unwrap();

    assert!(!outcome.already_installed);
    assert_eq!(outcome.path, market.package_dir("app"));
    assert_eq!(ids(&outcome.dependencies), vec!["lib"]);
    assert_eq!(outcome.dependencies[0].package.version, "2.1.5");
    assert_eq!(market.installed_ids(), vec!["lib", "app"]);
    market.assert_installed("lib");
    market.assert_installed("app");
    assert!(market.package_dir("app").join("README.md").is_file());
}

#[tokio::test]
async fn second_install_is_a_no_op() {
    let market = TestMarket::new();
    market.publish_simple("solo", "1.0.0", &[]);
    let url = TestMarket::archive_url("solo", "1.0.0");

    market.installer.install_package("solo", &defaults()).await.unwrap();
    let manifest_before = std::fs::read_to_string(market.manifest_path()).unwrap();
    let again = market.installer.install_package("solo", &defaults()).await.unwrap();

    assert!(again.already_installed);
    assert_eq!(again.package.version, "1.0.0");
    assert_eq!(market.transport.request_count(&url), 1);
    assert_eq!(
        std::fs::read_to_string(market.manifest_path()).unwrap(),
        manifest_before
    );
}

#[tokio::test]
async fn transitive_chain_installs_leaf_first() {
    let market = TestMarket::new();
    market.publish_simple("d", "1.0.0", &[]);
    market.publish_simple("c", "1.0.0", &[("d", "^1.0.0")]);
    market.publish_simple("b", "1.0.0", &[("d", "~1.0.0")]);
    market.publish_simple("a", "1.0.0", &[("b", "*"), ("c", ">=1.0.0")]);

    let outcome = market.installer.install_package("a", &defaults()).await.unwrap();

    assert_eq!(ids(&outcome.dependencies), vec!["d", "b", "c"]);
    assert_eq!(market.installed_ids(), vec!["d", "b", "c", "a"]);
    assert_eq!(
        market.transport.request_count(&TestMarket::archive_url("d", "1.0.0")),
        1
    );
}

#[tokio::test]
async fn already_installed_dependency_is_reused() {
    let market = TestMarket::new();
    market.publish_simple("lib", "2.1.5", &[]);
    market.publish_simple("app", "1.0.0", &[("lib", "^2.0.0")]);
    market.installer.install_package("lib", &defaults()).await.unwrap();

    let outcome = market.installer.install_package("app", &defaults()).await.unwrap();

    assert!(outcome.dependencies[0].already_installed);
    assert_eq!(
        market.transport.request_count(&TestMarket::archive_url("lib", "2.1.5")),
        1
    );
}

#[tokio::test]
async fn cycle_installs_each_package_once_with_warning() {
    let market = TestMarket::new();
    market.publish_simple("a", "1.0.0", &[("b", "*")]);
    market.publish_simple("b", "1.0.0", &[("a", "*")]);

    let outcome = market.installer.install_package("a", &defaults()).await.unwrap();

    assert_eq!(market.installed_ids(), vec!["b", "a"]);
    assert!(
        outcome
            .warnings
            .iter()
            .any(|w| w == "circular dependency: a -> b -> a"),
        "{:?}",
        outcome.warnings
    );
    assert_eq!(market.transport.requests().len(), 2);
}

#[tokio::test]
async fn checksum_mismatch_rolls_back() {
    let market = TestMarket::new();
    let archive = tar_gz_archive("bad-1.0.0", &[("README.md", "bad")]);
    market.publish(
        Package::new("bad", "1.0.0").with_checksum("0".repeat(64)),
        archive,
    );

    let err = market.installer.install_package("bad", &defaults()).await.unwrap_err();

    assert!(matches!(err, Error::InstallFailed { ref id, .. } if id == "bad"), "{err:?}");
    match err.root_cause() {
        Error::ChecksumMismatch { expected, actual } => {
            assert_eq!(expected, &"0".repeat(64));
            assert_eq!(actual.len(), 64);
        }
        other => panic!("expected ChecksumMismatch, got {other:?}"),
    }
    assert!(!market.package_dir("bad").exists());
    market.assert_not_installed("bad");
    let leftovers: Vec<_> = std::fs::read_dir(market.packages_dir()).unwrap().collect();
    assert!(leftovers.is_empty(), "archive left behind: {leftovers:?}");
}

#[tokio::test]
async fn rollback_keeps_a_directory_it_did_not_create() {
    let market = TestMarket::new();
    let existing = market.package_dir("bad");
    std::fs::create_dir_all(&existing).unwrap();
    std::fs::write(existing.join("precious.txt"), "keep me").unwrap();
    market.publish(
        Package::new("bad", "1.0.0").with_checksum("0".repeat(64)),
        tar_gz_archive("bad-1.0.0", &[("README.md", "bad")]),
    );

    let err = market.installer.install_package("bad", &defaults()).await.unwrap_err();

    assert!(matches!(err.root_cause(), Error::ChecksumMismatch { .. }), "{err:?}");
    assert_eq!(
        std::fs::read_to_string(existing.join("precious.txt")).unwrap(),
        "keep me"
    );
    market.assert_not_installed("bad");
    assert!(!market.packages_dir().join("bad-1.0.0.tar.gz").exists());
}

#[tokio::test]
async fn ids_that_are_not_one_path_component_are_rejected() {
    let market = TestMarket::new();
    market.publish_simple("other", "1.0.0", &[]);
    market.installer.install_package("other", &defaults()).await.unwrap();

    for id in ["..", ".", "", "nested/pkg"] {
        market.publish(
            Package::new(id, "1.0.0").with_checksum("0".repeat(64)),
            tar_gz_archive("evil", &[("README.md", "")]),
        );

        let err = market.installer.install_package(id, &defaults()).await.unwrap_err();

        assert!(matches!(err, Error::InvalidPackageId { .. }), "{id:?}: {err:?}");
    }
    market.assert_installed("other");
    assert!(market.package_dir("other").join("README.md").is_file());
    assert_eq!(market.installed_ids(), vec!["other"]);
    assert_eq!(market.transport.requests().len(), 1);
}

#[tokio::test]
async fn matching_checksum_is_accepted_in_any_case() {
    let market = TestMarket::new();
    let archive = tar_gz_archive("ok-1.0.0", &[("README.md", "ok")]);
    let digest = market_fs::checksum::sha256_hex(&archive).to_uppercase();
    market.publish(
        Package::new("ok", "1.0.0").with_checksum(format!("sha256:{digest}")),
        archive,
    );

    market.installer.install_package("ok", &defaults()).await.unwrap();

    market.assert_installed("ok");
}

#[tokio::test]
async fn skip_checksum_ignores_mismatch() {
    let market = TestMarket::new();
    let archive = tar_gz_archive("lax-1.0.0", &[("README.md", "lax")]);
    market.publish(Package::new("lax", "1.0.0").with_checksum("abc"), archive);
    let options = InstallOptions {
        skip_checksum: true,
        ..defaults()
    };

    market.installer.install_package("lax", &options).await.unwrap();

    market.assert_installed("lax");
}

#[tokio::test]
async fn unknown_package_fails_without_side_effects() {
    let market = TestMarket::new();

    let err = market.installer.install_package("ghost", &defaults()).await.unwrap_err();

    assert!(matches!(err, Error::PackageNotFound { ref id } if id == "ghost"), "{err:?}");
    assert!(!market.packages_dir().exists());
}

#[tokio::test]
async fn missing_download_url_fails_before_writing() {
    let market = TestMarket::new();
    market.registry.publish(Package::new("nourl", "1.0.0"));

    let err = market.installer.install_package("nourl", &defaults()).await.unwrap_err();

    assert!(matches!(err, Error::MissingDownloadUrl { .. }), "{err:?}");
    assert!(!market.packages_dir().exists());
}

#[tokio::test]
async fn unresolvable_dependency_aborts_before_install() {
    let market = TestMarket::new();
    market.publish_simple("app", "1.0.0", &[("lib", "^2.1.0")]);
    market.publish_simple("lib", "3.0.0", &[]);

    let err = market.installer.install_package("app", &defaults()).await.unwrap_err();

    assert!(
        matches!(err, Error::VersionMismatch { ref id, ref found, .. } if id == "lib" && found == "3.0.0"),
        "{err:?}"
    );
    assert!(market.installed_ids().is_empty());
    assert!(market.transport.requests().is_empty());
}

#[tokio::test]
async fn failed_dependency_is_wrapped_and_earlier_ones_stay() {
    let market = TestMarket::new();
    market.publish_simple("base", "1.0.0", &[]);
    market.registry.publish(
        Package::new("broken", "1.0.0").with_download_url("https://packages.test/missing.tar.gz"),
    );
    market.publish_simple("app", "1.0.0", &[("base", "*"), ("broken", "*")]);

    let err = market.installer.install_package("app", &defaults()).await.unwrap_err();

    assert!(matches!(err, Error::Dependency { ref id, .. } if id == "broken"), "{err:?}");
    assert!(matches!(err.root_cause(), Error::DownloadFailed { .. }));
    assert_eq!(market.installed_ids(), vec!["base"]);
    assert!(!market.package_dir("broken").exists());
    assert!(!market.package_dir("app").exists());
}

#[tokio::test]
async fn no_deps_option_skips_dependencies() {
    let market = TestMarket::new();
    market.publish_simple("app", "1.0.0", &[("lib", "^2.1.0")]);
    let options = InstallOptions {
        install_dependencies: false,
        ..defaults()
    };

    let outcome = market.installer.install_package("app", &options).await.unwrap();

    assert!(outcome.dependencies.is_empty());
    assert_eq!(market.installed_ids(), vec!["app"]);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let market = TestMarket::new();
    market.publish_simple("flaky", "1.0.0", &[]);
    let url = TestMarket::archive_url("flaky", "1.0.0");
    market.transport.fail_next(&url, Failure::Status(503), 1);
    market.transport.fail_next(&url, Failure::Network, 1);

    market.installer.install_package("flaky", &defaults()).await.unwrap();

    assert_eq!(market.transport.request_count(&url), 3);
    market.assert_installed("flaky");
}

#[tokio::test]
async fn exhausted_retries_roll_back() {
    let market = TestMarket::new();
    market.publish_simple("down", "1.0.0", &[]);
    let url = TestMarket::archive_url("down", "1.0.0");
    market.transport.fail_next(&url, Failure::Status(500), 3);

    let err = market.installer.install_package("down", &defaults()).await.unwrap_err();

    assert_eq!(market.transport.request_count(&url), 3);
    assert!(matches!(err.root_cause(), Error::DownloadFailed { .. }), "{err:?}");
    assert!(!market.package_dir("down").exists());
    market.assert_not_installed("down");
}

#[tokio::test]
async fn timeout_ends_the_download() {
    let market = TestMarket::with_policy(DownloadPolicy {
        max_attempts: 3,
        attempt_timeout: Duration::from_millis(200),
        retry_step: Duration::from_millis(10),
    });
    market.publish_simple("slow", "1.0.0", &[]);
    let url = TestMarket::archive_url("slow", "1.0.0");
    market.transport.delay(&url, Duration::from_secs(10));

    let err = market.installer.install_package("slow", &defaults()).await.unwrap_err();

    assert_eq!(market.transport.request_count(&url), 1);
    assert!(
        matches!(err.root_cause(), Error::DownloadTimeout { timeout_ms: 200, .. }),
        "{err:?}"
    );
    assert!(!market.package_dir("slow").exists());
    let leftovers: Vec<_> = std::fs::read_dir(market.packages_dir()).unwrap().collect();
    assert!(leftovers.is_empty(), "partial download left behind: {leftovers:?}");
}

#[tokio::test]
async fn zip_archives_are_installed() {
    let market = TestMarket::new();
    market.publish(
        Package::new("zipped", "0.2.0").with_download_url("https://packages.test/zipped.zip"),
        zip_archive(&[("manifest.json", "{}"), ("lib/main.js", "export {}")]),
    );

    let outcome = market.installer.install_package("zipped", &defaults()).await.unwrap();

    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    assert!(market.package_dir("zipped").join("lib/main.js").is_file());
}

#[tokio::test]
async fn unsupported_archive_format_rolls_back() {
    let market = TestMarket::new();
    market.publish(
        Package::new("odd", "1.0.0").with_download_url("https://packages.test/odd.rar"),
        b"Rar!".to_vec(),
    );

    let err = market.installer.install_package("odd", &defaults()).await.unwrap_err();

    assert!(
        matches!(err.root_cause(), Error::UnsupportedArchiveFormat { .. }),
        "{err:?}"
    );
    assert!(!market.package_dir("odd").exists());
    market.assert_not_installed("odd");
}

#[tokio::test]
async fn malformed_package_manifest_is_a_warning() {
    let market = TestMarket::new();
    market.publish(
        Package::new("sloppy", "1.0.0"),
        tar_gz_archive("sloppy", &[("manifest.json", "{ not json")]),
    );

    let outcome = market.installer.install_package("sloppy", &defaults()).await.unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].starts_with("failed to read package manifest"));
    market.assert_installed("sloppy");
}

#[cfg(unix)]
#[tokio::test]
async fn post_install_script_runs_in_install_dir() {
    let market = TestMarket::new();
    market.publish(
        Package::new("hooked", "1.0.0"),
        tar_gz_archive(
            "hooked",
            &[
                ("manifest.json", r#"{ "postInstall": "scripts/setup.sh" }"#),
                ("scripts/setup.sh", "echo \"$MARKET_PACKAGE_ID\" > setup.done\n"),
            ],
        ),
    );

    let outcome = market.installer.install_package("hooked", &defaults()).await.unwrap();

    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    let marker = std::fs::read_to_string(market.package_dir("hooked").join("setup.done")).unwrap();
    assert_eq!(marker.trim(), "hooked");
}

#[cfg(unix)]
#[tokio::test]
async fn failing_post_install_script_is_a_warning() {
    let market = TestMarket::new();
    market.publish(
        Package::new("grumpy", "1.0.0"),
        tar_gz_archive(
            "grumpy",
            &[
                ("manifest.json", r#"{ "postInstall": "setup.sh" }"#),
                ("setup.sh", "echo 'node not found' >&2\nexit 4\n"),
            ],
        ),
    );

    let outcome = market.installer.install_package("grumpy", &defaults()).await.unwrap();

    assert_eq!(
        outcome.warnings,
        vec!["post-install script setup.sh exited with code 4: node not found".to_string()]
    );
    market.assert_installed("grumpy");
}

#[tokio::test]
async fn missing_post_install_script_is_a_warning() {
    let market = TestMarket::new();
    market.publish(
        Package::new("lost", "1.0.0"),
        tar_gz_archive("lost", &[("manifest.json", r#"{ "postInstall": "nope.sh" }"#)]),
    );

    let outcome = market.installer.install_package("lost", &defaults()).await.unwrap();

    assert_eq!(
        outcome.warnings,
        vec!["post-install script not found: nope.sh".to_string()]
    );
    market.assert_installed("lost");
}

#[tokio::test]
async fn unsupported_tool_is_a_warning() {
    let market = TestMarket::new();
    market.publish(
        Package::new("picky", "1.0.0").with_supported_tools(["claude"]),
        tar_gz_archive("picky", &[("README.md", "")]),
    );
    let options = InstallOptions {
        code_tool: Some("vscode".into()),
        ..defaults()
    };

    let outcome = market.installer.install_package("picky", &options).await.unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("'vscode'"));
    market.assert_installed("picky");
}

#[tokio::test]
async fn custom_target_dir_is_used() {
    let market = TestMarket::new();
    market.publish_simple("placed", "1.0.0", &[]);
    let target = market.root().join("elsewhere");
    let options = InstallOptions {
        target_dir: Some(target.clone()),
        ..defaults()
    };

    let outcome = market.installer.install_package("placed", &options).await.unwrap();

    assert_eq!(outcome.path, target.join("placed"));
    assert_eq!(market.manifest().get("placed").unwrap().path, target.join("placed"));
    assert!(!market.package_dir("placed").exists());
}

#[tokio::test]
async fn forced_reinstall_replaces_files_and_keeps_enabled_flag() {
    let market = TestMarket::new();
    market.publish(
        Package::new("tool", "1.0.0"),
        tar_gz_archive("tool", &[("old.txt", "v1")]),
    );
    market.installer.install_package("tool", &defaults()).await.unwrap();
    market.installer.set_enabled("tool", false).unwrap();
    market.publish(
        Package::new("tool", "1.1.0"),
        tar_gz_archive("tool", &[("new.txt", "v2")]),
    );
    let options = InstallOptions {
        force: true,
        ..defaults()
    };

    let outcome = market.installer.install_package("tool", &options).await.unwrap();

    assert!(!outcome.already_installed);
    assert_eq!(outcome.package.version, "1.1.0");
    assert!(market.package_dir("tool").join("new.txt").is_file());
    assert!(!market.package_dir("tool").join("old.txt").exists());
    let record = market.manifest().get("tool").cloned().unwrap();
    assert_eq!(record.package.version, "1.1.0");
    assert!(!record.enabled);
    assert_eq!(market.installed_ids(), vec!["tool"]);
}

#[tokio::test]
async fn failed_forced_reinstall_drops_the_stale_record() {
    let market = TestMarket::new();
    market.publish_simple("fragile", "1.0.0", &[]);
    market.installer.install_package("fragile", &defaults()).await.unwrap();
    market.publish(
        Package::new("fragile", "2.0.0").with_checksum("ff"),
        tar_gz_archive("fragile", &[("README.md", "")]),
    );
    let options = InstallOptions {
        force: true,
        ..defaults()
    };

    let err = market.installer.install_package("fragile", &options).await.unwrap_err();

    assert!(matches!(err.root_cause(), Error::ChecksumMismatch { .. }));
    assert!(!market.package_dir("fragile").exists());
    market.assert_not_installed("fragile");
}
