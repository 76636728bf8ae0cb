//! Generation orchestrator.
//!
//! One [`Generator`] serves any number of concurrent runs. Each run resolves
//! a blueprint, binds its variables, plans and renders every file, and only
//! then touches the output directory. Nothing is rolled back once writing
//! has started.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, TryStreamExt};
use kiln_runner::{run_hooks, HookCommand, HookReport, HookRunner};
use kiln_templates::{
    safe_join, BindSources, BlueprintDescriptor, BlueprintRegistry, DependencySet,
    FileProvider, GoModFile, RenderContext, TemplateError, TemplateRenderer, VariableBinder,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Variable used to create a module manifest when none exists.
pub const MODULE_PATH_VAR: &str = "ModulePath";

/// Concurrent file writes when neither the request nor the generator says otherwise.
pub const DEFAULT_WORKERS: usize = 4;

/// One generation run.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub blueprint_id: String,
    pub output_dir: PathBuf,
    pub sources: BindSources,
    /// Overwrite files that already exist
    pub force: bool,
    /// Stop after planning; write nothing, run no hooks
    pub dry_run: bool,
    pub skip_hooks: bool,
    /// Overrides the generator's worker count
    pub workers: Option<usize>,
}

impl GenerateRequest {
    pub fn new(blueprint_id: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            blueprint_id: blueprint_id.into(),
            output_dir: output_dir.into(),
            sources: BindSources::default(),
            force: false,
            dry_run: false,
            skip_hooks: false,
            workers: None,
        }
    }

    pub fn with_sources(mut self, sources: BindSources) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.sources = self.sources.with_flag(name, value);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn skip_hooks(mut self, skip_hooks: bool) -> Self {
        self.skip_hooks = skip_hooks;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
}

/// A file excluded from the output, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub source: String,
    pub reason: String,
}

/// What a run did.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub run_id: Uuid,
    pub blueprint_id: String,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    /// Destinations relative to `output_dir`, sorted. For a dry run, the
    /// files that would be written.
    pub files_written: Vec<String>,
    pub skipped_files: Vec<SkippedFile>,
    pub dependencies: DependencySet,
    /// Module manifest that was created or updated, relative to `output_dir`
    pub manifest: Option<String>,
    pub hooks: HookReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GenerationReport {
    fn new(run_id: Uuid, blueprint_id: &str, request: &GenerateRequest) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            blueprint_id: blueprint_id.to_string(),
            output_dir: request.output_dir.clone(),
            dry_run: request.dry_run,
            files_written: Vec::new(),
            skipped_files: Vec::new(),
            dependencies: DependencySet::new(),
            manifest: None,
            hooks: HookReport::default(),
            started_at: now,
            finished_at: now,
        }
    }
}

/// A file that survived planning.
#[derive(Debug, Clone)]
struct PlannedFile {
    /// Source path relative to the provider root
    source: PathBuf,
    /// Source as declared, for messages
    label: String,
    destination: String,
    target: PathBuf,
}

#[derive(Debug)]
struct RenderedFile {
    destination: String,
    target: PathBuf,
    content: String,
}

/// Generates projects from registered blueprints.
pub struct Generator {
    registry: Arc<BlueprintRegistry>,
    provider: Arc<dyn FileProvider>,
    hook_runner: Arc<dyn HookRunner>,
    binder: VariableBinder,
    renderer: TemplateRenderer,
    workers: usize,
}

impl Generator {
    pub fn new(
        registry: Arc<BlueprintRegistry>,
        provider: Arc<dyn FileProvider>,
        hook_runner: Arc<dyn HookRunner>,
    ) -> Self {
        Self {
            registry,
            provider,
            hook_runner,
            binder: VariableBinder::new(),
            renderer: TemplateRenderer::new(),
            workers: DEFAULT_WORKERS,
        }
    }

    /// Default number of concurrent file writes.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<BlueprintRegistry> {
        &self.registry
    }

    /// Run one generation.
    ///
    /// Every path is rendered and checked, and every file rendered, before the
    /// first write. Hook failures are recorded in the report and never turn
    /// into an `Err`.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> CoreResult<GenerationReport> {
        let run_id = Uuid::new_v4();
        let descriptor = self.registry.get(&request.blueprint_id)?;
        info!(
            "Generating {} into {} (run {})",
            descriptor.id,
            request.output_dir.display(),
            run_id
        );
        let mut report = GenerationReport::new(run_id, &descriptor.id, request);

        let ctx = self.binder.bind(&descriptor, &request.sources)?;
        debug!("Bound {} variable(s)", ctx.len());

        let planned = self.plan(&descriptor, &ctx, request, &mut report)?;
        report.dependencies = self.collect_dependencies(&descriptor, &ctx)?;

        let rendered = self.render_files(&planned, &ctx, &mut report)?;

        if request.dry_run {
            info!("Dry run: {} file(s) would be written", rendered.len());
            report.files_written = sorted(rendered.iter().map(|f| f.destination.clone()));
            report.finished_at = Utc::now();
            return Ok(report);
        }

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let workers = request.workers.unwrap_or(self.workers).max(1);
        write_files(&request.output_dir, &rendered, workers).await?;
        report.files_written = sorted(rendered.iter().map(|f| f.destination.clone()));
        info!("Wrote {} file(s)", report.files_written.len());

        report.manifest = self
            .merge_dependencies(&descriptor, &ctx, &request.output_dir, &report.dependencies)
            .await?;

        if request.skip_hooks {
            debug!("Skipping post-generation hooks");
        } else {
            let hooks = self.hook_commands(&descriptor, &ctx, &request.output_dir)?;
            if !hooks.is_empty() {
                info!("Running {} hook(s)", hooks.len());
                report.hooks = run_hooks(self.hook_runner.as_ref(), &hooks, cancel).await;
                for failure in report.hooks.failures() {
                    warn!("Hook {} did not succeed: {:?}", failure.name, failure.status);
                }
            }
        }

        report.finished_at = Utc::now();
        Ok(report)
    }

    /// Decide which files apply and where they go.
    fn plan(
        &self,
        descriptor: &BlueprintDescriptor,
        ctx: &RenderContext,
        request: &GenerateRequest,
        report: &mut GenerationReport,
    ) -> CoreResult<Vec<PlannedFile>> {
        let blueprint_dir = PathBuf::from(descriptor.path().unwrap_or_default());
        let mut planned: Vec<PlannedFile> = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();

        for file in &descriptor.files {
            if let Some(condition) = &file.condition {
                let include = self
                    .renderer
                    .eval_condition(condition, ctx)
                    .map_err(|e| e.in_file(&file.source))?;
                if !include {
                    debug!("Excluding {}: condition is false", file.source);
                    report.skipped_files.push(SkippedFile {
                        source: file.source.clone(),
                        reason: "condition is false".to_string(),
                    });
                    continue;
                }
            }

            let source = self
                .renderer
                .render_content(&file.source, ctx)
                .map_err(|e| e.in_file(&file.source))?;
            let source = safe_join(&blueprint_dir, &source).map_err(|reason| {
                CoreError::PathSecurity {
                    path: source.clone(),
                    reason,
                }
            })?;

            let destination = self
                .renderer
                .render_path(file.destination_template(), ctx)
                .map_err(|e| e.in_file(&file.source))?;
            let target = safe_join(&request.output_dir, &destination).map_err(|reason| {
                CoreError::PathSecurity {
                    path: destination.clone(),
                    reason,
                }
            })?;
            let destination = relative_display(&request.output_dir, &target);

            if let Some(first) = seen.insert(destination.clone(), file.source.clone()) {
                return Err(CoreError::DuplicateDestination {
                    destination,
                    first,
                    second: file.source.clone(),
                });
            }

            planned.push(PlannedFile {
                source,
                label: file.source.clone(),
                destination,
                target,
            });
        }

        if !request.force {
            if let Some(existing) = planned.iter().find(|f| f.target.exists()) {
                return Err(CoreError::OutputExists(existing.target.clone()));
            }
        }

        Ok(planned)
    }

    fn render_files(
        &self,
        planned: &[PlannedFile],
        ctx: &RenderContext,
        report: &mut GenerationReport,
    ) -> CoreResult<Vec<RenderedFile>> {
        let mut rendered = Vec::with_capacity(planned.len());
        for file in planned {
            let template = self
                .provider
                .read_to_string(&file.source)
                .map_err(|source| CoreError::ReadSource {
                    path: file.source.clone(),
                    source,
                })?;
            let content = self
                .renderer
                .render_content(&template, ctx)
                .map_err(|e| e.in_file(&file.label))?;

            if content.trim().is_empty() {
                debug!("Excluding {}: rendered empty", file.label);
                report.skipped_files.push(SkippedFile {
                    source: file.label.clone(),
                    reason: "rendered empty".to_string(),
                });
                continue;
            }
            rendered.push(RenderedFile {
                destination: file.destination.clone(),
                target: file.target.clone(),
                content,
            });
        }
        Ok(rendered)
    }

    fn collect_dependencies(
        &self,
        descriptor: &BlueprintDescriptor,
        ctx: &RenderContext,
    ) -> CoreResult<DependencySet> {
        let mut deps = DependencySet::new();
        for dep in &descriptor.dependencies {
            if let Some(condition) = &dep.condition {
                if !self.renderer.eval_condition(condition, ctx)? {
                    continue;
                }
            }
            deps.insert(dep.module.clone(), dep.version.clone())?;
        }
        Ok(deps)
    }

    /// Merge `deps` into the module manifest, creating it when absent.
    async fn merge_dependencies(
        &self,
        descriptor: &BlueprintDescriptor,
        ctx: &RenderContext,
        output_dir: &Path,
        deps: &DependencySet,
    ) -> CoreResult<Option<String>> {
        if deps.is_empty() {
            return Ok(None);
        }

        let relative = self.renderer.render_path(&descriptor.module_manifest, ctx)?;
        let path = safe_join(output_dir, &relative).map_err(|reason| CoreError::PathSecurity {
            path: relative.clone(),
            reason,
        })?;

        let mut manifest = match tokio::fs::read_to_string(&path).await {
            Ok(content) => GoModFile::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let module = ctx.get(MODULE_PATH_VAR).map(|v| v.to_string()).ok_or_else(|| {
                    TemplateError::Validation {
                        variable: MODULE_PATH_VAR.to_string(),
                        message: format!("required to create {}", relative),
                    }
                })?;
                GoModFile::new(module)
            }
            Err(source) => return Err(CoreError::ReadSource { path, source }),
        };

        let added = manifest.merge(deps)?;
        info!("Added {} requirement(s) to {}", added, relative);
        write_file(&path, &manifest.render()).await?;
        Ok(Some(relative_display(output_dir, &path)))
    }

    fn hook_commands(
        &self,
        descriptor: &BlueprintDescriptor,
        ctx: &RenderContext,
        output_dir: &Path,
    ) -> CoreResult<Vec<HookCommand>> {
        let mut hooks = Vec::new();
        for hook in &descriptor.post_hooks {
            let label = format!("hook {}", hook.name);
            if let Some(condition) = &hook.condition {
                if !self
                    .renderer
                    .eval_condition(condition, ctx)
                    .map_err(|e| e.in_file(&label))?
                {
                    debug!("Skipping hook {}: condition is false", hook.name);
                    continue;
                }
            }

            let render = |s: &str| {
                self.renderer
                    .render_content(s, ctx)
                    .map_err(|e| e.in_file(&label))
            };
            let dir = match &hook.dir {
                Some(dir) => {
                    let dir = render(dir)?;
                    safe_join(output_dir, &dir)
                        .map_err(|reason| CoreError::PathSecurity { path: dir, reason })?
                }
                None => output_dir.to_path_buf(),
            };

            let mut command = HookCommand::new(&hook.name, render(&hook.command)?)
                .args(
                    hook.args
                        .iter()
                        .map(|a| render(a))
                        .collect::<Result<Vec<_>, _>>()?,
                )
                .dir(dir)
                .continue_on_error(hook.continue_on_error);
            for (key, value) in &hook.env {
                command = command.env(key, render(value)?);
            }
            if let Some(secs) = hook.timeout_secs {
                command = command.timeout(Duration::from_secs(secs));
            }
            hooks.push(command);
        }
        Ok(hooks)
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("registry", &self.registry)
            .field("provider", &self.provider)
            .field("workers", &self.workers)
            .finish()
    }
}

/// Create the directory skeleton, then write files with at most `workers`
/// writes in flight. The first failure stops the remaining writes.
async fn write_files(output_dir: &Path, files: &[RenderedFile], workers: usize) -> CoreResult<()> {
    let dirs: BTreeSet<&Path> = files
        .iter()
        .filter_map(|f| f.target.parent())
        .chain(std::iter::once(output_dir))
        .collect();
    for dir in dirs {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| CoreError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
    }

    stream::iter(files.iter().map(Ok::<_, CoreError>))
        .try_for_each_concurrent(workers, |file| async move {
            debug!("Writing {}", file.destination);
            write_file(&file.target, &file.content).await
        })
        .await
}

async fn write_file(path: &Path, content: &str) -> CoreResult<()> {
    tokio::fs::write(path, content)
        .await
        .map_err(|source| CoreError::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn sorted(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut items: Vec<String> = items.collect();
    items.sort();
    items
}
