//! Sequential execution of post-generation hooks.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::HookCommand;
use crate::error::RunnerError;
use crate::runner::HookRunner;

/// Outcome of one hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
    Skipped,
}

/// What happened to one hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookRecord {
    pub name: String,
    pub command: String,
    pub status: HookStatus,
    pub exit_code: Option<i32>,
    /// Error text, captured stderr of a failed hook, or the reason it was skipped
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl HookRecord {
    fn new(hook: &HookCommand, status: HookStatus) -> Self {
        Self {
            name: hook.name.clone(),
            command: hook.display_command(),
            status,
            exit_code: None,
            message: None,
            duration_ms: 0,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Records for every hook, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookReport {
    pub records: Vec<HookRecord>,
}

impl HookReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when no hook failed, timed out or was cancelled.
    pub fn all_succeeded(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.status == HookStatus::Succeeded)
    }

    pub fn failures(&self) -> Vec<&HookRecord> {
        self.records
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    HookStatus::Failed | HookStatus::TimedOut | HookStatus::Cancelled
                )
            })
            .collect()
    }

    pub fn count(&self, status: HookStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

/// Run `hooks` one after another.
///
/// A failing hook stops the sequence unless it is marked
/// `continue_on_error`. Once `cancel` fires, the running hook is handled by
/// the runner and every remaining hook is skipped. Nothing already done is
/// undone.
pub async fn run_hooks(
    runner: &dyn HookRunner,
    hooks: &[HookCommand],
    cancel: &CancellationToken,
) -> HookReport {
    let mut report = HookReport::default();
    let mut halted: Option<String> = None;

    for hook in hooks {
        if halted.is_none() && cancel.is_cancelled() {
            halted = Some("generation was cancelled".to_string());
        }
        if let Some(reason) = &halted {
            info!("Skipping hook {}: {}", hook.name, reason);
            report
                .records
                .push(HookRecord::new(hook, HookStatus::Skipped).with_message(reason.clone()));
            continue;
        }

        info!("Running hook {}: {}", hook.name, hook.display_command());
        let record = match runner.run(hook, cancel).await {
            Ok(output) => {
                let status = if output.success() {
                    HookStatus::Succeeded
                } else {
                    HookStatus::Failed
                };
                let mut record = HookRecord::new(hook, status);
                record.exit_code = output.exit_code;
                record.duration_ms = output.duration_ms;
                if status == HookStatus::Failed {
                    record.message = Some(output.combined_output().trim().to_string());
                }
                record
            }
            Err(e @ RunnerError::Timeout { .. }) => {
                HookRecord::new(hook, HookStatus::TimedOut).with_message(e.to_string())
            }
            Err(e @ RunnerError::Cancelled(_)) => {
                halted = Some("generation was cancelled".to_string());
                HookRecord::new(hook, HookStatus::Cancelled).with_message(e.to_string())
            }
            Err(e) => HookRecord::new(hook, HookStatus::Failed).with_message(e.to_string()),
        };

        if matches!(record.status, HookStatus::Failed | HookStatus::TimedOut) {
            warn!(
                "Hook {} failed{}",
                hook.name,
                record
                    .message
                    .as_deref()
                    .map(|m| format!(": {}", m))
                    .unwrap_or_default()
            );
            if !hook.continue_on_error && halted.is_none() {
                halted = Some(format!("hook {} failed", hook.name));
            }
        }
        report.records.push(record);
    }

    report
}
