//! Post-install script execution.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::Result;
use crate::package::Package;

/// Result of running a script to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl ScriptOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Pick an interpreter from the script's extension.
///
/// `.js`/`.mjs`/`.cjs` run under `node`, `.py` under `python3`, `.ps1`
/// under `powershell -File`. Anything else goes to the platform shell.
fn interpreter_for(script: &Path) -> Command {
    let ext = script
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let mut cmd = match ext.as_deref() {
        Some("js" | "mjs" | "cjs") => Command::new("node"),
        Some("py") => Command::new("python3"),
        Some("ps1") => {
            let mut c = Command::new("powershell");
            c.args(["-NoProfile", "-File"]);
            c
        }
        _ => shell(),
    };
    cmd.arg(script);
    cmd
}

#[cfg(windows)]
fn shell() -> Command {
    let mut c = Command::new("cmd");
    c.arg("/C");
    c
}

#[cfg(not(windows))]
fn shell() -> Command {
    Command::new("sh")
}

/// Run `script` with `cwd` as working directory.
///
/// The child inherits the environment plus `MARKET_PACKAGE_ID`,
/// `MARKET_PACKAGE_VERSION` and `MARKET_INSTALL_DIR`. Stdout is discarded
/// and stderr captured. A non-zero exit is reported in the outcome, not as
/// an error.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the interpreter cannot be started.
pub async fn run_script(script: &Path, cwd: &Path, package: &Package) -> Result<ScriptOutcome> {
    let mut cmd = interpreter_for(script);
    cmd.current_dir(cwd)
        .env("MARKET_PACKAGE_ID", &package.id)
        .env("MARKET_PACKAGE_VERSION", &package.version)
        .env("MARKET_INSTALL_DIR", cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    tracing::debug!(script = %script.display(), id = %package.id, "running post-install script");
    let output = cmd.output().await?;

    Ok(ScriptOutcome {
        exit_code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
