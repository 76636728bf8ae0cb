//! Hook runner trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::HookCommand;
use crate::error::RunnerResult;

/// Result of a hook that ran to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookOutput {
    /// Hook name
    pub name: String,
    /// Exit code; `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Execution start time
    pub started_at: DateTime<Utc>,
    /// Execution end time
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl HookOutput {
    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Runs a single hook command.
///
/// Implementations must return [`crate::RunnerError::Cancelled`] when
/// `cancel` fires and the hook does not finish within the grace period.
#[async_trait]
pub trait HookRunner: Send + Sync {
    async fn run(&self, hook: &HookCommand, cancel: &CancellationToken)
        -> RunnerResult<HookOutput>;
}
