//! Manifest runner: batch execution feeding the report service

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use lookalike::{
    AssetStore, BatchCancellation, BatchConfig, BatchRunner, CaseExecutor, ComparisonConfig,
    Manifest, NativeAssetStore, ReportConfiguration, ReportService, ReportSummary, TestCase,
    ThresholdComparer, DEFAULT_TEMPLATE,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything a run needs, after CLI flags override the manifest
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Cases to execute
    pub cases: Vec<TestCase>,
    /// Report settings
    pub report: ReportConfiguration,
    /// Batch settings
    pub batch: BatchConfig,
    /// Comparison tolerances
    pub comparison: ComparisonConfig,
}

impl RunPlan {
    /// Load the manifest named by `args` and apply the overrides
    pub fn load(args: &RunArgs) -> CliResult<Self> {
        let manifest = Manifest::load(&args.manifest)?;
        Self::from_args(manifest, args)
    }

    /// Merge a manifest with command-line overrides
    pub fn from_args(manifest: Manifest, args: &RunArgs) -> CliResult<Self> {
        let mut report = manifest.report.unwrap_or_default();
        if let Some(dir) = &args.output_dir {
            report.output_directory.clone_from(dir);
        }
        if let Some(name) = &args.report_name {
            report.report_name.clone_from(name);
        }
        if let Some(dir) = &args.template_dir {
            report.template_directory.clone_from(dir);
        }
        if args.hide_successes {
            report.display_successes = false;
        }
        if args.link_references {
            report.copy_reference_images = false;
        }
        if args.junit {
            report.write_junit = true;
        }

        let mut batch = manifest.batch.unwrap_or_default();
        if let Some(jobs) = args.jobs {
            batch.max_workers = jobs;
        }
        if let Some(ms) = args.timeout_ms {
            batch = batch.with_case_timeout(Duration::from_millis(ms));
        }

        let mut comparison = manifest.comparison.unwrap_or_default();
        if let Some(threshold) = args.threshold {
            comparison.threshold = threshold;
        }
        if let Some(color_threshold) = args.color_threshold {
            comparison.color_threshold = color_threshold;
        }
        if !(0.0..=1.0).contains(&comparison.threshold) {
            return Err(CliError::invalid_argument(format!(
                "threshold must be between 0.0 and 1.0, got {}",
                comparison.threshold
            )));
        }

        Ok(Self {
            cases: manifest.cases,
            report,
            batch,
            comparison,
        })
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Final tallies
    pub summary: ReportSummary,
    /// Cases cancelled before completion
    pub cancelled: usize,
    /// Results whose artifacts could not be persisted
    pub persistence_errors: usize,
    /// Written report
    pub report_path: PathBuf,
    /// Wall time of the batch
    pub duration_ms: u64,
}

impl RunOutcome {
    /// Whether every case passed and every artifact was written
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.summary.all_passed() && self.persistence_errors == 0
    }
}

/// Runs a manifest end to end
#[derive(Debug)]
pub struct VisualRunner {
    reporter: ProgressReporter,
}

impl VisualRunner {
    /// Create a runner
    #[must_use]
    pub fn new(config: &CliConfig) -> Self {
        let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
            .with_verbose(config.verbosity.is_verbose());
        Self { reporter }
    }

    /// Get the reporter
    #[must_use]
    pub const fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    /// Execute a plan: run the batch, aggregate every result, write the report.
    /// Ctrl-C cancels the cases still outstanding.
    pub fn run(&mut self, plan: RunPlan) -> CliResult<RunOutcome> {
        let started = Instant::now();
        let assets: Arc<dyn AssetStore> = Arc::new(NativeAssetStore::new());
        ensure_template(assets.as_ref(), &plan.report.template_path())?;

        let comparer = Arc::new(ThresholdComparer::new(plan.comparison));
        let batch = BatchRunner::new(CaseExecutor::new(comparer, Arc::clone(&assets)), plan.batch);
        let service = ReportService::new(assets, plan.report)?;

        self.reporter
            .start_progress(plan.cases.len() as u64, "comparing");
        let reporter = &self.reporter;
        let cancel = BatchCancellation::new();

        let runtime = tokio::runtime::Runtime::new()?;
        let mut results = runtime.block_on(async {
            let watcher = cancel.clone();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling outstanding cases");
                    watcher.cancel();
                }
            });
            let results = batch
                .run_with(plan.cases, &cancel, |result| reporter.case_finished(result))
                .await;
            interrupt.abort();
            results
        });
        // Fetches abandoned by a timeout or Ctrl-C must not hold up the exit
        runtime.shutdown_background();
        self.reporter.finish();

        let cancelled = results.iter().filter(|r| r.is_cancelled()).count();
        let mut persistence_errors = 0;
        for result in &mut results {
            if let Err(e) = service.add_result(result) {
                persistence_errors += 1;
                self.reporter
                    .warning(&format!("{}: artifacts not saved: {e}", result.test_id));
            }
            result.release_images();
        }

        let report_path = service
            .finalize()
            .map_err(|e| CliError::report_generation(e.to_string()))?;

        let summary = service.summary();
        let duration = started.elapsed();
        self.reporter
            .summary(summary.passed_tests, summary.failed_tests, cancelled, duration);
        self.reporter
            .info(&format!("Report written to {}", report_path.display()));

        Ok(RunOutcome {
            summary,
            cancelled,
            persistence_errors,
            report_path,
            duration_ms: duration.as_millis() as u64,
        })
    }
}

/// Write the default template into `template_dir`
pub fn write_default_template(template_dir: &Path, force: bool) -> CliResult<PathBuf> {
    let path = template_dir.join(lookalike::report::DEFAULT_TEMPLATE_NAME);
    if path.exists() && !force {
        return Err(CliError::config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    let assets = NativeAssetStore::new();
    assets.create_folder(template_dir)?;
    assets.save_text(DEFAULT_TEMPLATE, &path)?;
    Ok(path)
}

fn ensure_template(assets: &dyn AssetStore, path: &Path) -> CliResult<()> {
    if path.exists() {
        return Ok(());
    }
    tracing::info!(path = %path.display(), "template missing, writing the default one");
    if let Some(dir) = path.parent() {
        assets.create_folder(dir)?;
    }
    assets.save_text(DEFAULT_TEMPLATE, path)?;
    Ok(())
}
