//! Costview - summarize and check construction cost estimates
//!
//! A CLI tool that loads a priced estimate document, validates it, and
//! writes division, pricing-source, confidence and benchmark views as a
//! Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success (or no --fail-on condition met)
//!   1 - Runtime error (unreadable or invalid estimate, bad config, etc.)
//!   2 - The --fail-on condition was met

use anyhow::{Context, Result};
use costview::analysis::{run_checks, Finding, FindingSeverity, LineFilter, Tolerances};
use costview::cli::{Args, FailOn, OutputFormat};
use costview::config::{Config, DEFAULT_CONFIG_FILE};
use costview::loader::load_estimate;
use costview::models::AccuracyTier;
use costview::report::{self, format_money, EstimateReport, ReportOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Output path meaning "write the report to stdout".
const STDOUT_PATH: &str = "-";

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so it can set the log level
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(config.log_level(args.quiet))?;

    info!("Costview v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match run(args, config) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .costview.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize accuracy bands, tolerances, and report options.");
    Ok(())
}

/// Initialize logging at the given level.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(level: tracing::Level) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_str()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the complete workflow. Returns exit code (0 or 2).
fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    config.validate().context("Invalid configuration")?;

    let estimate_path = args
        .estimate
        .as_deref()
        .context("No estimate file given")?;

    // Step 1: Load and validate the estimate
    info!("Loading estimate: {}", estimate_path.display());
    let estimate = load_estimate(estimate_path)
        .with_context(|| format!("Failed to load estimate {}", estimate_path.display()))?;

    info!(
        "Loaded '{}': {} line items, {} sections, {} benchmarks",
        estimate.project.name,
        estimate.lines.len(),
        estimate.sections.len(),
        estimate.benchmarks.len()
    );

    let tolerances = Tolerances::from(&config.tolerance);

    // Handle --check-only: print findings and exit
    if args.check_only {
        let findings = run_checks(&estimate, &tolerances);
        print_findings(&findings);
        return Ok(fail_on_findings(args.fail_on, &findings));
    }

    // Step 2: Build the report
    let filter = LineFilter::from_params(
        args.search.as_deref(),
        args.division.as_deref(),
        args.source.as_deref(),
    )?;

    let options = ReportOptions {
        source_path: estimate_path.display().to_string(),
        benchmark: config.report.benchmark.clone(),
        bands: (&config.accuracy).into(),
        tolerances,
        filter,
        section: args.section.clone(),
        top_lines: config.report.top_lines,
        include_findings: config.report.include_findings,
    };

    if estimate.benchmark(&options.benchmark).is_none() {
        warn!(
            "Benchmark '{}' not found in estimate; accuracy will be reported as n/a",
            options.benchmark
        );
    }

    let report = report::build_report(&estimate, &options)?;

    // Step 3: Render and save the report
    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let to_stdout = config.general.output == STDOUT_PATH;
    if to_stdout {
        println!("{}", output);
    } else {
        std::fs::write(&config.general.output, &output)
            .with_context(|| format!("Failed to write report to {}", config.general.output))?;
    }

    let duration = start_time.elapsed().as_secs_f64();

    if !to_stdout && !args.quiet {
        print_summary(&report, duration);
        println!("\n✅ Report saved to: {}", config.general.output);
    }

    // Check --fail-on condition
    let exit_code = match args.fail_on {
        Some(FailOn::OffTarget) => fail_on_accuracy(&report),
        other => fail_on_findings(other, &report.findings),
    };

    Ok(exit_code)
}

/// Print headline figures after writing a report file.
fn print_summary(report: &EstimateReport, duration: f64) {
    let overview = &report.overview;

    println!("\n📊 Estimate Summary:");
    println!("   Project: {}", overview.project.name);
    println!("   Total cost: {}", format_money(overview.total_cost));
    println!("   Line items: {}", overview.line_count);
    match (overview.accuracy_pct, overview.accuracy_tier) {
        (Some(pct), Some(tier)) => println!(
            "   Accuracy vs {}: {:.1}% {} {}",
            report.metadata.benchmark,
            pct,
            tier.emoji(),
            tier
        ),
        _ => println!("   Accuracy vs {}: n/a", report.metadata.benchmark),
    }
    if let Some(ref summary) = report.check_summary {
        println!(
            "   Findings: {} (❌ {} | ⚠️ {} | ℹ️ {})",
            summary.total, summary.errors, summary.warnings, summary.info
        );
    }
    println!("   Duration: {:.2}s", duration);
}

/// Print integrity findings for --check-only.
fn print_findings(findings: &[Finding]) {
    if findings.is_empty() {
        println!("✅ All stated figures agree with the line items.");
        return;
    }

    println!("🔍 {} finding(s):\n", findings.len());
    for finding in findings {
        println!(
            "   {} [{}] {}",
            finding.severity.emoji(),
            finding.check,
            finding.message
        );
    }
}

/// Exit code for a severity-based --fail-on.
fn fail_on_findings(fail_on: Option<FailOn>, findings: &[Finding]) -> i32 {
    let threshold = match fail_on {
        Some(FailOn::Warning) => FindingSeverity::Warning,
        Some(FailOn::Error) => FindingSeverity::Error,
        _ => return 0,
    };

    if findings.iter().any(|f| f.severity >= threshold) {
        eprintln!(
            "\n⛔ Findings at or above {} severity. Failing (exit code 2).",
            threshold
        );
        return 2;
    }

    0
}

/// Exit code for --fail-on off-target.
fn fail_on_accuracy(report: &EstimateReport) -> i32 {
    match report.overview.accuracy_tier {
        Some(AccuracyTier::OffTarget) => {
            eprintln!(
                "\n⛔ Estimate is off target against '{}'. Failing (exit code 2).",
                report.metadata.benchmark
            );
            2
        }
        Some(_) => 0,
        None => {
            warn!("Accuracy is undefined; --fail-on off-target not applied");
            0
        }
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
/// Returns the config and the file it came from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, Some(PathBuf::from(DEFAULT_CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            eprintln!("⚠️  Failed to load config: {:#}. Using defaults.", e);
            Ok((Config::default(), None))
        }
    }
}
