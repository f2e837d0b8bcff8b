//! Asynchronous utilities for use with Tokio.
//!
//! Everything that touches external processes or blocking decoders goes
//! through here, so the rest of the program can stay plain `async` code.

use std::{process::Output, time::Duration};

use tokio::process::Command;

use crate::prelude::*;

pub mod io;

/// Report any command failures, and include any error output.
///
/// Standard output and standard error will be logged at appropriate levels.
/// Each line of standard error may optionally be checked by `is_error_line`
/// to determine if the command failed even though it exited successfully.
pub fn check_for_command_failure(
    command_name: &str,
    output: &Output,
    is_error_line: Option<&dyn Fn(&str) -> bool>,
) -> Result<()> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    trace!(
        command_name = command_name,
        bytes = output.stdout.len(),
        "Standard output from command"
    );

    if output.status.success() {
        if !stderr.trim().is_empty() {
            debug!(
                command_name = command_name,
                output = %stderr,
                "Standard error from command",
            );
        }
        if is_error_line.is_some_and(|is_error_line| stderr.lines().any(is_error_line)) {
            return Err(anyhow!(
                "{} printed error output:\n{}",
                command_name,
                stderr.trim(),
            ));
        }
        Ok(())
    } else {
        warn!(
            command_name = command_name,
            output = %stderr,
            "Standard error from failed command",
        );
        if let Some(exit_code) = output.status.code() {
            Err(anyhow!(
                "{} failed with exit code {} and error output:\n{}",
                command_name,
                exit_code,
                stderr.trim(),
            ))
        } else {
            Err(anyhow!(
                "{} failed with error output:\n{}",
                command_name,
                stderr.trim(),
            ))
        }
    }
}

/// Run a command to completion, giving up after `timeout`.
///
/// Used for quick probes like `tesseract --version`, where a hung binary
/// should not keep the server from starting.
pub async fn output_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output> {
    cmd.kill_on_drop(true);
    tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| anyhow!("command timed out after {:?}", timeout))?
        .context("failed to run command")
}

/// Wrapper around [`tokio::task::spawn_blocking`] that propagates panics from
/// the background task.
pub async fn spawn_blocking_propagating_panics<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => value,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => panic!("blocking task was cancelled: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_blocking_returns_value() {
        let value = spawn_blocking_propagating_panics(|| 6 * 7).await;
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn missing_command_is_an_error() {
        let mut cmd = Command::new("this-command-does-not-exist-anywhere");
        let result = output_with_timeout(&mut cmd, Duration::from_secs(5)).await;
        assert!(result.is_err());
    }
}
