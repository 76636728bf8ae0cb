//! # kiln_core
//!
//! Generation orchestrator for kiln.
//!
//! This crate ties blueprint loading, binding and rendering from
//! `kiln_templates` to hook execution from `kiln_runner`:
//!
//! - **Generator**: resolves a blueprint, binds variables, plans and renders
//!   files, writes them, merges dependencies and runs hooks
//! - **Configuration**: the persisted `config.toml`
//! - **Errors**: one error type with a kind per failure class
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kiln_core::{GenerateRequest, Generator};
//! use kiln_runner::ProcessHookRunner;
//! use kiln_templates::{BlueprintLoader, DiskProvider, FileProvider};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider: Arc<dyn FileProvider> = Arc::new(DiskProvider::new("blueprints"));
//!     let registry = Arc::new(BlueprintLoader::new(provider.clone()).load_all()?);
//!     let generator = Generator::new(registry, provider, Arc::new(ProcessHookRunner::new()));
//!
//!     let request = GenerateRequest::new("api", "./orders").with_variable("ProjectName", "orders");
//!     let report = generator.generate(&request, &CancellationToken::new()).await?;
//!     println!("{} files written", report.files_written.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod generator;

pub use config::{GenerationSettings, KilnConfig, CONFIG_ENV};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use generator::{GenerateRequest, GenerationReport, Generator, SkippedFile};
