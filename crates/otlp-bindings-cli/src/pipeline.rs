//! The build pipeline.
//!
//! Fetch, compile, package. The whole task graph, optional tasks included, is
//! planned through the [`TaskGate`] once before anything runs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use otlp_bindings_codegen::{
    render_readme, verify_generated, write_sources_archive, ApiSurface, CompatReport,
    CompileOutput, CompilerConfig, CrateScaffold, LintReport, Linter, SchemaCompiler, Severity,
    VerificationReport,
};
use otlp_bindings_core::{LibraryArtifact, SchemaVersion, Task, TaskCategory, TaskDecision, TaskGate};
use otlp_bindings_source::{ProtoSourceProvider, ProvidedSources, SourceConfig};
use tracing::{info, warn};

pub const FETCH_PROTOS: &str = ":fetchProtos";
pub const LINT_PROTOS: &str = ":lintProtos";
pub const COMPILE_PROTOS: &str = ":compileProtos";
pub const VERIFY_BINDINGS: &str = ":verifyBindings";
pub const CHECK_COMPATIBILITY: &str = ":checkCompatibility";
pub const GENERATE_README: &str = ":generateReadme";
pub const PACKAGE_CRATE: &str = ":packageCrate";
pub const PACKAGE_SOURCES: &str = ":packageSources";

/// The pipeline task graph in execution order.
pub fn task_graph() -> Vec<Task> {
    vec![
        Task::core(FETCH_PROTOS),
        Task::optional(LINT_PROTOS, TaskCategory::StyleCheck),
        Task::core(COMPILE_PROTOS),
        Task::optional(VERIFY_BINDINGS, TaskCategory::Test),
        Task::optional(CHECK_COMPATIBILITY, TaskCategory::CompatibilityCheck),
        Task::optional(GENERATE_README, TaskCategory::Documentation),
        Task::core(PACKAGE_CRATE),
        Task::optional(PACKAGE_SOURCES, TaskCategory::SourceArchive),
    ]
}

/// Gate decisions for the task graph.
#[derive(Debug, Clone)]
pub struct Plan {
    decisions: Vec<(Task, TaskDecision)>,
}

impl Plan {
    /// Plans the task graph. Logs one line per task.
    pub fn new(gate: &TaskGate) -> Self {
        Self {
            decisions: gate.plan(&task_graph()),
        }
    }

    /// Returns true if the task at `path` executes.
    pub fn runs(&self, path: &str) -> bool {
        self.decisions
            .iter()
            .any(|(task, decision)| task.path == path && *decision == TaskDecision::Execute)
    }

    /// Returns every task with its decision.
    pub fn decisions(&self) -> &[(Task, TaskDecision)] {
        &self.decisions
    }
}

/// Everything the pipeline needs, read once from the command line.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub version: SchemaVersion,
    pub sources: SourceConfig,
    pub baseline_sources: SourceConfig,
    pub compiler: CompilerConfig,
    pub out_dir: PathBuf,
    pub gate: TaskGate,
    pub compat_baseline: Option<SchemaVersion>,
}

/// Results of a pipeline run.
#[derive(Debug)]
pub struct BuildOutcome {
    pub sources: ProvidedSources,
    pub artifact: LibraryArtifact,
    pub crate_path: PathBuf,
    pub lint: Option<LintReport>,
    pub verification: Option<VerificationReport>,
    pub compat: Option<CompatReport>,
    pub sources_archive: Option<PathBuf>,
}

/// Runs the build pipeline.
pub async fn run(config: &PipelineConfig) -> Result<BuildOutcome> {
    let plan = Plan::new(&config.gate);
    let version = &config.version;
    let crate_name = &config.compiler.crate_name;
    let crate_dir = &config.compiler.crate_dir;

    info!(%version, crate_name = %crate_name, "Starting bindings build");

    let provider =
        ProtoSourceProvider::new(config.sources.clone()).context("Invalid proto source")?;
    let sources = provider
        .provide(version)
        .await
        .context("Failed to provide proto sources")?;

    let lint = if plan.runs(LINT_PROTOS) {
        Some(lint_protos(&sources)?)
    } else {
        None
    };

    let output = SchemaCompiler::new(config.compiler.clone())
        .compile(&sources.root)
        .context("Failed to compile proto sources")?;

    let scaffold = CrateScaffold::new(crate_name, version.clone());
    scaffold
        .write_sources(crate_dir, &output)
        .context("Failed to write module tree")?;

    let verification = if plan.runs(VERIFY_BINDINGS) {
        let report = verify_generated(&output, &config.compiler.src_dir())?
            .into_result()
            .context("Generated bindings are incomplete")?;
        info!(
            packages = report.packages,
            services = report.services,
            "Verified generated bindings"
        );
        Some(report)
    } else {
        None
    };

    let compat = if plan.runs(CHECK_COMPATIBILITY) {
        check_compatibility(config, &output).await?
    } else {
        None
    };

    let readme_path = crate_dir.join(otlp_bindings_codegen::scaffold::README_FILE);
    if plan.runs(GENERATE_README) {
        std::fs::write(&readme_path, render_readme(crate_name, version, &output.protos))
            .with_context(|| format!("Failed to write {}", readme_path.display()))?;
        info!(path = ?readme_path, "Wrote README");
    } else if readme_path.exists() {
        std::fs::remove_file(&readme_path)
            .with_context(|| format!("Failed to remove stale {}", readme_path.display()))?;
    }

    let artifact = scaffold
        .package(crate_dir)
        .context("Failed to package crate")?;
    let crate_path = artifact
        .write_to_dir(&config.out_dir)
        .context("Failed to write crate artifact")?;
    info!(path = ?crate_path, files = artifact.file_count(), "Packaged crate");

    let sources_archive = if plan.runs(PACKAGE_SOURCES) {
        let path = write_sources_archive(
            &output.root,
            &output.protos,
            &config.out_dir,
            crate_name,
            version,
        )
        .context("Failed to write sources archive")?;
        info!(path = ?path, "Packaged proto sources");
        Some(path)
    } else {
        None
    };

    Ok(BuildOutcome {
        sources,
        artifact,
        crate_path,
        lint,
        verification,
        compat,
        sources_archive,
    })
}

fn lint_protos(sources: &ProvidedSources) -> Result<LintReport> {
    let paths = SchemaCompiler::discover(&sources.root)?;
    let protos = SchemaCompiler::parse_all(&sources.root, &paths)?;
    let report = Linter::new().lint_all(&protos);

    for v in &report.violations {
        match v.severity {
            Severity::Error => warn!(rule = v.rule_id, file = %v.file, line = ?v.line, "{}", v.message),
            Severity::Warning | Severity::Hint => {
                info!(rule = v.rule_id, file = %v.file, line = ?v.line, "{}", v.message);
            }
        }
    }

    if report.has_errors() {
        anyhow::bail!("Proto style check failed with {} error(s)", report.error_count());
    }
    Ok(report)
}

async fn check_compatibility(
    config: &PipelineConfig,
    output: &CompileOutput,
) -> Result<Option<CompatReport>> {
    let Some(baseline) = &config.compat_baseline else {
        warn!("No compatibility baseline given, skipping API check");
        return Ok(None);
    };

    let provider = ProtoSourceProvider::new(config.baseline_sources.clone())
        .context("Invalid baseline source")?;
    let baseline_sources = provider
        .provide(baseline)
        .await
        .with_context(|| format!("Failed to provide baseline {baseline}"))?;

    let previous = ApiSurface::from_root(&baseline_sources.root)?;
    let current = ApiSurface::from_protos(&output.protos);
    let report = current.diff(&previous, baseline.to_string()).into_result()?;
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use otlp_bindings_core::TaskPolicy;

    #[test]
    fn test_default_plan_runs_core_tasks_only() {
        let plan = Plan::new(&TaskGate::default());

        assert!(plan.runs(FETCH_PROTOS));
        assert!(plan.runs(COMPILE_PROTOS));
        assert!(plan.runs(PACKAGE_CRATE));
        for path in [
            LINT_PROTOS,
            VERIFY_BINDINGS,
            CHECK_COMPATIBILITY,
            GENERATE_README,
            PACKAGE_SOURCES,
        ] {
            assert!(!plan.runs(path), "{path} should be skipped");
        }
    }

    #[test]
    fn test_categories_enable_independently() {
        let policy = TaskPolicy::new()
            .enable(TaskCategory::Test)
            .enable(TaskCategory::Documentation);
        let plan = Plan::new(&TaskGate::new(policy));

        assert!(plan.runs(VERIFY_BINDINGS));
        assert!(plan.runs(GENERATE_README));
        assert!(!plan.runs(LINT_PROTOS));
        assert!(!plan.runs(PACKAGE_SOURCES));
    }

    #[test]
    fn test_every_task_is_decided() {
        let plan = Plan::new(&TaskGate::new(TaskPolicy::all()));
        assert_eq!(plan.decisions().len(), task_graph().len());
        assert!(plan
            .decisions()
            .iter()
            .all(|(_, d)| *d == TaskDecision::Execute));
    }

    #[test]
    fn test_unknown_task_does_not_run() {
        let plan = Plan::new(&TaskGate::new(TaskPolicy::all()));
        assert!(!plan.runs(":publish"));
    }

    fn config_with_local(work_dir: &std::path::Path, local: &std::path::Path) -> PipelineConfig {
        let version = SchemaVersion::new(1, 3, 2);
        PipelineConfig {
            version,
            sources: SourceConfig::new(work_dir)
                .with_local(otlp_bindings_source::LocalSource::new(local)),
            baseline_sources: SourceConfig::new(work_dir),
            compiler: CompilerConfig::new("opentelemetry-proto-bindings", work_dir.join("crate")),
            out_dir: work_dir.join("dist"),
            gate: TaskGate::default(),
            compat_baseline: None,
        }
    }

    #[tokio::test]
    async fn test_missing_local_source_fails_before_compile() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_with_local(temp.path(), &temp.path().join("missing"));

        let err = run(&config).await.unwrap_err();

        assert!(format!("{err:#}").contains("missing"));
        assert!(!temp.path().join("crate").exists());
        assert!(!temp.path().join("dist").exists());
    }

    #[tokio::test]
    async fn test_local_version_mismatch_fails_before_compile() {
        let temp = tempfile::tempdir().unwrap();
        let checkout = temp.path().join("checkout");
        std::fs::create_dir_all(&checkout).unwrap();
        std::fs::write(checkout.join("VERSION"), "1.0.0\n").unwrap();
        let config = config_with_local(temp.path(), &checkout);

        assert!(run(&config).await.is_err());
        assert!(!temp.path().join("crate").exists());
    }
}
