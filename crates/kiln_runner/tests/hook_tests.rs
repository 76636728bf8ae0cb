//! Integration tests for hook sequencing.
//!
//! These use the mock runner so no processes are spawned.

use std::time::Duration;

use kiln_runner::{run_hooks, HookCommand, HookStatus, MockHookRunner, MockResponse};
use tokio_util::sync::CancellationToken;

fn hooks() -> Vec<HookCommand> {
    vec![
        HookCommand::new("tidy", "go").args(["mod", "tidy"]),
        HookCommand::new("format", "gofmt").args(["-w", "."]),
        HookCommand::new("vet", "go").args(["vet", "./..."]),
    ]
}

fn statuses(report: &kiln_runner::HookReport) -> Vec<HookStatus> {
    report.records.iter().map(|r| r.status).collect()
}

/// Hooks run in declaration order.
#[tokio::test]
async fn test_hooks_run_in_order() {
    let runner = MockHookRunner::new();
    let report = run_hooks(&runner, &hooks(), &CancellationToken::new()).await;

    assert_eq!(runner.called_names(), vec!["tidy", "format", "vet"]);
    assert!(report.all_succeeded());
    assert_eq!(report.count(HookStatus::Succeeded), 3);
}

/// A failure stops the remaining hooks.
#[tokio::test]
async fn test_failure_skips_remaining() {
    let runner = MockHookRunner::new().with_responses(vec![
        MockResponse::success(""),
        MockResponse::failure(1, "gofmt: syntax error"),
    ]);
    let report = run_hooks(&runner, &hooks(), &CancellationToken::new()).await;

    assert_eq!(runner.called_names(), vec!["tidy", "format"]);
    assert_eq!(
        statuses(&report),
        vec![HookStatus::Succeeded, HookStatus::Failed, HookStatus::Skipped]
    );
    let failures = report.failures();
    let failed = failures[0];
    assert_eq!(failed.name, "format");
    assert_eq!(failed.exit_code, Some(1));
    assert_eq!(failed.message.as_deref(), Some("gofmt: syntax error"));
    assert_eq!(
        report.records[2].message.as_deref(),
        Some("hook format failed")
    );
}

/// `continue_on_error` keeps the sequence going.
#[tokio::test]
async fn test_continue_on_error() {
    let mut hooks = hooks();
    hooks[0] = hooks[0].clone().continue_on_error(true);
    let runner = MockHookRunner::new().add_response(MockResponse::timeout());

    let report = run_hooks(&runner, &hooks, &CancellationToken::new()).await;
    assert_eq!(runner.call_count(), 3);
    assert_eq!(
        statuses(&report),
        vec![
            HookStatus::TimedOut,
            HookStatus::Succeeded,
            HookStatus::Succeeded
        ]
    );
    assert!(!report.all_succeeded());
}

/// Cancellation during a hook skips everything after it.
#[tokio::test]
async fn test_cancel_mid_run_skips_rest() {
    let mut hooks = hooks();
    for hook in &mut hooks {
        hook.continue_on_error = true;
        hook.timeout = Some(Duration::from_secs(1));
    }
    let runner = MockHookRunner::new().with_responses(vec![
        MockResponse::success(""),
        MockResponse::interrupt(),
    ]);
    let cancel = CancellationToken::new();

    let report = run_hooks(&runner, &hooks, &cancel).await;
    assert!(cancel.is_cancelled());
    assert_eq!(runner.call_count(), 2);
    assert_eq!(
        statuses(&report),
        vec![
            HookStatus::Succeeded,
            HookStatus::Cancelled,
            HookStatus::Skipped
        ]
    );
}

/// Nothing runs once cancellation has already fired.
#[tokio::test]
async fn test_cancelled_before_start() {
    let runner = MockHookRunner::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run_hooks(&runner, &hooks(), &cancel).await;
    assert_eq!(runner.call_count(), 0);
    assert_eq!(report.count(HookStatus::Skipped), 3);
}

#[tokio::test]
async fn test_empty_hook_list() {
    let runner = MockHookRunner::new();
    let report = run_hooks(&runner, &[], &CancellationToken::new()).await;
    assert!(report.is_empty());
    assert!(report.all_succeeded());
}
