//! Checks for the external executables some tasks require, and the vendor
//! install step that shells out to the package manager.

use std::process::{Command, Stdio};

use console::style;

pub const GIT_HINT: &str = "Git, the version control system, is required to fetch vendored \
    libraries. Download it from https://git-scm.com/downloads and run 'kiln install' again.";

pub const PACKAGER_HINT: &str = "Cordova is required to package the mobile app. \
    Install it with 'npm install -g cordova'.";

/// Is `tool` runnable from the current environment?
pub fn installed(tool: &str) -> bool {
    Command::new(tool)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Exit immediately with status 1 when `tool` is absent. Missing external
/// executables are a fatal startup condition, not a recoverable task
/// failure.
pub fn require(tool: &str, hint: &str) {
    if installed(tool) {
        return;
    }
    eprintln!("  {}", style(format!("{tool} is not installed.")).red());
    eprintln!("  {hint}");
    std::process::exit(1);
}

/// Run the package manager to populate the vendor directory.
pub fn vendor_install() -> anyhow::Result<()> {
    tracing::info!("installing vendored dependencies via {}", style("npm").cyan());

    let status = Command::new("npm").arg("install").status()?;
    if !status.success() {
        anyhow::bail!("npm install failed with status {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_tool_is_detected() {
        assert!(!installed("kiln-no-such-tool-3f9a"));
    }
}
