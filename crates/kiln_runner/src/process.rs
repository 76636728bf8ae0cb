//! Hook runner backed by local processes.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{HookCommand, DEFAULT_GRACE_PERIOD};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{HookOutput, HookRunner};

/// Runs hooks as child processes of the current process.
#[derive(Debug, Clone)]
pub struct ProcessHookRunner {
    grace_period: Duration,
}

impl Default for ProcessHookRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHookRunner {
    pub fn new() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Time a running hook gets to exit after cancellation before it is killed.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        let _ = reader.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(t) => tokio::time::sleep(t).await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl HookRunner for ProcessHookRunner {
    async fn run(
        &self,
        hook: &HookCommand,
        cancel: &CancellationToken,
    ) -> RunnerResult<HookOutput> {
        debug!("Executing: {} (in {})", hook.display_command(), hook.dir.display());

        let mut child = Command::new(&hook.program)
            .args(&hook.args)
            .current_dir(&hook.dir)
            .envs(&hook.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: hook.program.clone(),
                source,
            })?;

        let stdout = tokio::spawn(read_all(child.stdout.take()));
        let stderr = tokio::spawn(read_all(child.stderr.take()));

        let started_at = Utc::now();
        let start = Instant::now();

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = deadline(hook.timeout) => {
                warn!("Hook {} timed out, killing it", hook.name);
                child.kill().await?;
                return Err(RunnerError::Timeout {
                    name: hook.name.clone(),
                    secs: hook.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                });
            }
            _ = cancel.cancelled() => {
                debug!(
                    "Hook {} cancelled, waiting up to {:?} for it to exit",
                    hook.name, self.grace_period
                );
                match tokio::time::timeout(self.grace_period, child.wait()).await {
                    Ok(status) => status?,
                    Err(_) => {
                        warn!("Hook {} did not exit within the grace period, killing it", hook.name);
                        child.kill().await?;
                        return Err(RunnerError::Cancelled(hook.name.clone()));
                    }
                }
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        Ok(HookOutput {
            name: hook.name.clone(),
            exit_code: status.code(),
            stdout: stdout.await.unwrap_or_default(),
            stderr: stderr.await.unwrap_or_default(),
            started_at,
            finished_at: Utc::now(),
            duration_ms,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(name: &str, script: &str) -> HookCommand {
        HookCommand::new(name, "sh").args(["-c", script])
    }

    #[tokio::test]
    async fn test_runs_process() {
        let runner = ProcessHookRunner::new();
        let output = runner
            .run(&sh("echo", "echo hello; echo oops >&2"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_reports_exit_code() {
        let runner = ProcessHookRunner::new();
        let output = runner
            .run(&sh("fail", "exit 3"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let runner = ProcessHookRunner::new();
        let output = runner
            .run(&sh("ls", "ls").dir(dir.path()), &CancellationToken::new())
            .await
            .unwrap();
        assert!(output.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = ProcessHookRunner::new();
        let err = runner
            .run(
                &HookCommand::new("nope", "kiln-definitely-not-a-program"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills() {
        let runner = ProcessHookRunner::new();
        let hook = sh("slow", "sleep 5").timeout(Duration::from_millis(100));
        let start = Instant::now();
        let err = runner.run(&hook, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_cancel_kills_after_grace_period() {
        let runner = ProcessHookRunner::new().with_grace_period(Duration::from_millis(100));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = runner.run(&sh("slow", "sleep 5"), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_cancel_lets_hook_finish_within_grace_period() {
        let runner = ProcessHookRunner::new().with_grace_period(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let output = runner
            .run(&sh("quick", "sleep 0.2; echo done"), &cancel)
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "done");
    }
}
