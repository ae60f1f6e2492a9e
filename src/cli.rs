//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Costview - summarize and check construction cost estimates
///
/// Loads a priced estimate document (JSON), validates it, and reports
/// division, pricing-source, confidence and benchmark views as Markdown
/// or JSON.
///
/// Examples:
///   costview estimate.json
///   costview estimate.json --format json -o summary.json
///   costview estimate.json --division 09 --search "gypsum"
///   costview estimate.json --section Structure --top 50
///   costview estimate.json --check-only --fail-on error
///   costview --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Estimate document to analyze (JSON)
    #[arg(value_name = "FILE", required_unless_present = "init_config")]
    pub estimate: Option<PathBuf>,

    /// Output file path for the report (`-` for stdout)
    ///
    /// Defaults to the config file setting or costview_report.md
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .costview.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Benchmark used for overall accuracy and the TOTAL row
    #[arg(short, long, value_name = "NAME", env = "COSTVIEW_BENCHMARK")]
    pub benchmark: Option<String>,

    /// Only list line items whose description contains this text
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Only list line items in this CSI division ("all" for every division)
    #[arg(long, value_name = "CODE")]
    pub division: Option<String>,

    /// Only list line items priced by this source ("all" for every source)
    ///
    /// Values: cost_db, cost_db_assembly, system_breakout_db,
    /// system_breakout_fallback, rate_library_fallback, parametric_gap_fill
    #[arg(long, value_name = "SOURCE")]
    pub source: Option<String>,

    /// Only list line items belonging to this section
    #[arg(long, value_name = "NAME")]
    pub section: Option<String>,

    /// Number of line items to list
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Exit with code 2 when this condition is met
    ///
    /// warning/error: an integrity finding at or above that severity.
    /// off-target: overall accuracy outside the acceptable band.
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOn>,

    /// Run integrity checks only and print the findings
    #[arg(long)]
    pub check_only: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .costview.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Condition for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FailOn {
    Warning,
    Error,
    OffTarget,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate estimate path
        if let Some(ref path) = self.estimate {
            if !path.exists() {
                return Err(format!("Estimate file does not exist: {}", path.display()));
            }
            if !path.is_file() {
                return Err(format!("Estimate path is not a file: {}", path.display()));
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.top == Some(0) {
            return Err("--top must be at least 1".to_string());
        }

        if self.check_only && self.fail_on == Some(FailOn::OffTarget) {
            return Err("--fail-on off-target needs a report; drop --check-only".to_string());
        }

        if let Some(ref benchmark) = self.benchmark {
            if benchmark.trim().is_empty() {
                return Err("Benchmark name must not be empty".to_string());
            }
        }

        Ok(())
    }
}
