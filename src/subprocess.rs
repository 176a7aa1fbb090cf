//! Single chokepoint for running external commands. Every subprocess call in
//! the daemon goes through `run`: argv-list only, never a shell, always
//! timeout-bounded.

use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

/// Runs `argv[0] argv[1..]` with a hard wall-clock timeout. Never invokes a
/// shell. Missing binaries, timeouts, and spawn errors all collapse to a
/// synthetic non-zero exit rather than propagating — callers treat this the
/// same as any other command failure.
pub async fn run(argv: &[&str], timeout: Duration) -> CommandOutput {
    let Some((program, args)) = argv.split_first() else {
        return CommandOutput {
            stdout: String::new(),
            stderr: "empty command".to_string(),
            code: 1,
        };
    };

    let child = Command::new(program)
        .args(args)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(c) => c,
        Err(e) => {
            return CommandOutput {
                stdout: String::new(),
                stderr: e.to_string(),
                code: 127,
            };
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code().unwrap_or(-1),
        },
        Ok(Err(e)) => CommandOutput {
            stdout: String::new(),
            stderr: e.to_string(),
            code: 1,
        },
        Err(_) => CommandOutput {
            stdout: String::new(),
            stderr: format!("command timed out after {timeout:?}"),
            code: 124,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_simple_command() {
        let out = run(&["echo", "hello"], Duration::from_secs(5)).await;
        assert_eq!(out.code, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn missing_binary_yields_nonzero_code_not_panic() {
        let out = run(&["/nonexistent/binary-xyz"], Duration::from_secs(5)).await;
        assert_eq!(out.code, 127);
    }

    #[tokio::test]
    async fn timeout_is_enforced() {
        let out = run(&["sleep", "5"], Duration::from_millis(100)).await;
        assert_eq!(out.code, 124);
    }
}
