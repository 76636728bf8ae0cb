//! # kiln_templates
//!
//! Blueprint loading, variable binding and rendering for kiln.
//!
//! A blueprint is a directory holding a `template.yaml` descriptor, optional
//! include fragments and the template files it lists. This crate covers:
//!
//! - Reading blueprints through a [`FileProvider`] (disk or embedded bundle)
//! - Keeping loaded descriptors in a thread-safe [`BlueprintRegistry`]
//! - Binding variables from defaults, config, environment, flags and prompts
//! - Rendering paths, contents and conditions against a [`RenderContext`]
//! - Keeping rendered paths inside the output directory
//! - Merging blueprint dependencies into the generated `go.mod`
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kiln_templates::{BindSources, BlueprintLoader, DiskProvider, TemplateRenderer, VariableBinder};
//!
//! let loader = BlueprintLoader::new(Arc::new(DiskProvider::new("blueprints")));
//! let registry = loader.load_all().unwrap();
//! let blueprint = registry.get("api").unwrap();
//!
//! let sources = BindSources::new().with_flag("ProjectName", "orders");
//! let ctx = VariableBinder::new().bind(&blueprint, &sources).unwrap();
//!
//! let path = TemplateRenderer::new()
//!     .render_path("cmd/{{.ProjectName}}/main.go.tmpl", &ctx)
//!     .unwrap();
//! assert_eq!(path, "cmd/orders/main.go");
//! ```

pub mod binder;
pub mod context;
pub mod deps;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod paths;
pub mod provider;
pub mod registry;
pub mod renderer;
mod syntax;

pub use binder::{env_key, parse_bool, BindSources, Prompter, VariableBinder};
pub use context::{RenderContext, VarValue};
pub use deps::{DependencySet, GoModFile};
pub use error::{TemplateError, TemplateResult, VariableIssue};
pub use loader::BlueprintLoader;
pub use manifest::{
    derive_id, BlueprintDescriptor, DependencySpec, FeatureSpec, FileSpec, PostHook,
    ScalarValue, ValidationRule, VariableSpec, VariableType,
};
pub use paths::{safe_join, PathViolation};
pub use provider::{
    DiskProvider, EmbeddedProvider, FileProvider, ProviderConfig, SourceKind, SubdirProvider,
};
pub use registry::{BlueprintRegistry, DEFAULT_BLUEPRINT_ID};
pub use renderer::{strip_template_suffix, TemplateRenderer, TEMPLATE_SUFFIX};
