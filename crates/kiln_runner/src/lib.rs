//! # kiln_runner
//!
//! Post-generation hook execution for kiln.
//!
//! Hooks are commands a blueprint asks to run inside the generated project,
//! such as `go mod tidy`. They run one after another, each with an optional
//! timeout, under a cancellation token: a cancelled hook gets a grace period
//! to exit before it is killed and the remaining hooks are skipped.
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_runner::{run_hooks, HookCommand, ProcessHookRunner};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = ProcessHookRunner::new().with_grace_period(Duration::from_secs(2));
//!     let hooks = vec![HookCommand::new("tidy", "go")
//!         .args(["mod", "tidy"])
//!         .dir("./orders")
//!         .timeout(Duration::from_secs(120))];
//!
//!     let report = run_hooks(&runner, &hooks, &CancellationToken::new()).await;
//!     println!("all hooks succeeded: {}", report.all_succeeded());
//! }
//! ```

pub mod config;
pub mod error;
pub mod hooks;
pub mod mock;
pub mod process;
pub mod runner;

pub use config::{HookCommand, DEFAULT_GRACE_PERIOD};
pub use error::{RunnerError, RunnerResult};
pub use hooks::{run_hooks, HookRecord, HookReport, HookStatus};
pub use mock::{MockHookRunner, MockResponse};
pub use process::ProcessHookRunner;
pub use runner::{HookOutput, HookRunner};
