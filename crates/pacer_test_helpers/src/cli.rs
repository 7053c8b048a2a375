//! CLI command builders for tests
//!
//! Commands come with a clean environment so a developer's own API URL or
//! token never leaks into a test run.

use assert_cmd::Command;

/// Get a Command for the `pacer` binary with clean environment
///
/// - `RUST_LOG=error` to keep INFO/DEBUG lines out of stderr assertions
/// - `PACER_API_URL` / `PACER_TOKEN` removed
///
/// # Example
///
/// ```rust,no_run
/// use pacer_test_helpers::cli::pacer_command;
///
/// pacer_command().arg("--version").assert().success();
/// ```
#[allow(deprecated)]
pub fn pacer_command() -> Command {
    command_for("pacer")
}

/// Get a Command for a specific binary with clean environment
#[allow(deprecated)]
pub fn command_for(bin_name: &str) -> Command {
    let mut cmd = Command::cargo_bin(bin_name)
        .unwrap_or_else(|_| panic!("Failed to find {} binary", bin_name));
    cmd.env("RUST_LOG", "error");
    cmd.env_remove("PACER_API_URL");
    cmd.env_remove("PACER_TOKEN");
    cmd
}
