//! Mock hook runner for testing.
//!
//! Records every hook it is asked to run and answers with predefined
//! responses, so generation can be tested without spawning processes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::HookCommand;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{HookOutput, HookRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Behavior {
    Exit,
    Timeout,
    /// Fire the cancellation token, as a Ctrl-C during the hook would.
    Interrupt,
}

/// Predefined mock response for one hook run.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    behavior: Behavior,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 10,
            behavior: Behavior::Exit,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 10,
            behavior: Behavior::Exit,
        }
    }

    /// The hook exceeds its timeout.
    pub fn timeout() -> Self {
        Self {
            behavior: Behavior::Timeout,
            ..Self::failure(-1, "")
        }
    }

    /// Cancellation arrives while the hook runs and it does not exit in time.
    pub fn interrupt() -> Self {
        Self {
            behavior: Behavior::Interrupt,
            ..Self::failure(-1, "")
        }
    }
}

/// Mock hook runner for testing.
#[derive(Clone, Default)]
pub struct MockHookRunner {
    responses: Arc<RwLock<Vec<MockResponse>>>,
    response_index: Arc<AtomicUsize>,
    captured_calls: Arc<RwLock<Vec<HookCommand>>>,
}

impl MockHookRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a response for the next unanswered call.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    /// Responses are used in order; calls beyond the list succeed.
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        *self.responses.write() = responses;
        self
    }

    pub fn get_calls(&self) -> Vec<HookCommand> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Names of the hooks run, in call order.
    pub fn called_names(&self) -> Vec<String> {
        self.captured_calls
            .read()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    fn next_response(&self) -> MockResponse {
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        self.responses
            .read()
            .get(index)
            .cloned()
            .unwrap_or_else(|| MockResponse::success(""))
    }
}

#[async_trait]
impl HookRunner for MockHookRunner {
    async fn run(
        &self,
        hook: &HookCommand,
        cancel: &CancellationToken,
    ) -> RunnerResult<HookOutput> {
        self.captured_calls.write().push(hook.clone());
        let response = self.next_response();

        match response.behavior {
            Behavior::Timeout => {
                return Err(RunnerError::Timeout {
                    name: hook.name.clone(),
                    secs: hook.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                })
            }
            Behavior::Interrupt => {
                cancel.cancel();
                return Err(RunnerError::Cancelled(hook.name.clone()));
            }
            Behavior::Exit => {}
        }

        let started_at = Utc::now();
        let finished_at = started_at + chrono::Duration::milliseconds(response.duration_ms as i64);
        Ok(HookOutput {
            name: hook.name.clone(),
            exit_code: Some(response.exit_code),
            stdout: response.stdout,
            stderr: response.stderr,
            started_at,
            finished_at,
            duration_ms: response.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runner_captures_calls() {
        let runner = MockHookRunner::new().add_response(MockResponse::success("ok"));
        let hook = HookCommand::new("tidy", "go").args(["mod", "tidy"]);

        let output = runner.run(&hook, &CancellationToken::new()).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "ok");

        let calls = runner.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["mod", "tidy"]);
    }

    #[tokio::test]
    async fn test_mock_runner_responses_in_order() {
        let runner = MockHookRunner::new().with_responses(vec![
            MockResponse::success("first"),
            MockResponse::failure(2, "second failed"),
        ]);
        let hook = HookCommand::new("h", "true");
        let cancel = CancellationToken::new();

        assert_eq!(runner.run(&hook, &cancel).await.unwrap().stdout, "first");
        let second = runner.run(&hook, &cancel).await.unwrap();
        assert_eq!(second.exit_code, Some(2));
        assert_eq!(second.stderr, "second failed");
        assert!(runner.run(&hook, &cancel).await.unwrap().success());
    }

    #[tokio::test]
    async fn test_mock_runner_interrupt_cancels_token() {
        let runner = MockHookRunner::new().add_response(MockResponse::interrupt());
        let cancel = CancellationToken::new();
        let err = runner
            .run(&HookCommand::new("h", "true"), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(cancel.is_cancelled());
    }
}
