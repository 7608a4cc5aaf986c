use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use decl_e2e_client::App;
use decl_e2e_core::{ErrorHook, Failure};
use decl_e2e_runner::{ConcurrentGenerator, SuiteReport, TestStatus};
use decl_e2e_runtime_config::load_or_default;

use crate::suite_file;

#[derive(Args)]
pub struct RunArgs {
    /// Path to the JSON suite file
    pub suite: PathBuf,

    /// Base URL of the application under test
    #[arg(long, env = "DECL_E2E_APP")]
    pub app: String,

    /// Config file (defaults to ./decl-e2e.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only run tests whose qualified name contains this substring
    #[arg(long)]
    pub filter: Option<String>,
}

fn log_failure(failure: &Failure<'_>) {
    let body = if failure.response.body.is_null() {
        failure.response.text.clone()
    } else {
        failure.response.body.to_string()
    };
    warn!(
        error = %failure.error,
        status = failure.response.status,
        %body,
        "assertion failed"
    );
}

/// Run the suite and print the report. Returns whether every test passed.
pub async fn run(args: RunArgs) -> Result<bool> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let config = load_or_default(args.config.as_deref(), &cwd)?;
    let suite = suite_file::load(&args.suite)?;

    let mut global = config.suite.clone();
    if global.error.is_none() && config.runner.log_failures {
        global.error = Some(ErrorHook::new(log_failure));
    }

    let app = App::new(&args.app, config.client.timeout())
        .with_context(|| format!("failed to create HTTP client for {}", args.app))?;
    let generator =
        ConcurrentGenerator::new().with_filter(args.filter.or(config.runner.filter.clone()));

    info!(app = %args.app, suite = %args.suite.display(), tests = suite.leaf_count(), "running suite");
    let report = decl_e2e_runner::run(&app, global, &suite, &generator)
        .await
        .with_context(|| format!("malformed suite {}", args.suite.display()))?;

    print_report(&report);
    Ok(report.is_success())
}

fn print_report(report: &SuiteReport) {
    for r in &report.results {
        let icon = match r.status {
            TestStatus::Passed => "PASS",
            TestStatus::Failed => "FAIL",
            TestStatus::Skipped => "SKIP",
        };
        let dur = format!("{:.0}ms", r.duration.as_secs_f64() * 1000.0);
        eprintln!("  {icon} {name} ({dur})", name = r.name);
        if let Some(ref err) = r.error {
            eprintln!("       {err}");
        }
    }

    eprintln!(
        "\n{} passed, {} failed, {} skipped, {} total",
        report.passed(),
        report.failed(),
        report.skipped(),
        report.total()
    );
}
