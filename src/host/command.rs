use crate::error::{GuardError, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// 外部命令执行器（防火墙、sysctl、apt、docker compose 都经过这里）
#[derive(Debug, Clone, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }

    /// 执行命令，非零退出码视为失败
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!("$ {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GuardError::Command(format!("Failed to execute {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GuardError::Command(format!(
                "{} {} failed ({}): {}",
                program,
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// 只关心退出码的命令
    pub async fn succeeds(&self, program: &str, args: &[&str]) -> bool {
        self.run(program, args).await.is_ok()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = CommandRunner::new().run("sh", &["-c", "echo hello"]).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_is_error() {
        let err = CommandRunner::new()
            .run("sh", &["-c", "echo boom >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            GuardError::Command(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let runner = CommandRunner::new();
        assert!(!runner.succeeds("definitely-not-a-real-binary-4711", &[]).await);
    }
}
