//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.costview.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".costview.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Comparison tolerances.
    #[serde(default)]
    pub tolerance: ToleranceConfig,

    /// Accuracy band thresholds.
    #[serde(default)]
    pub accuracy: AccuracyConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path. `-` writes to stdout.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Default report format.
    #[serde(default)]
    pub format: crate::cli::OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            format: crate::cli::OutputFormat::default(),
        }
    }
}

fn default_output() -> String {
    "costview_report.md".to_string()
}

/// Tolerances for comparing stated and recomputed figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToleranceConfig {
    /// Relative tolerance for line arithmetic (0.005 = 0.5%).
    #[serde(default = "default_relative")]
    pub line_relative: f64,

    /// Relative tolerance for summed totals.
    #[serde(default = "default_relative")]
    pub total_relative: f64,

    /// Percentage points allowed between stated and recomputed shares.
    #[serde(default = "default_share_points")]
    pub share_points: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            line_relative: default_relative(),
            total_relative: default_relative(),
            share_points: default_share_points(),
        }
    }
}

fn default_relative() -> f64 {
    0.005
}

fn default_share_points() -> f64 {
    1.0
}

/// Accuracy band thresholds, in percent of the benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyConfig {
    #[serde(default = "default_on_target_low")]
    pub on_target_low: f64,

    #[serde(default = "default_on_target_high")]
    pub on_target_high: f64,

    #[serde(default = "default_acceptable_low")]
    pub acceptable_low: f64,

    #[serde(default = "default_acceptable_high")]
    pub acceptable_high: f64,
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self {
            on_target_low: default_on_target_low(),
            on_target_high: default_on_target_high(),
            acceptable_low: default_acceptable_low(),
            acceptable_high: default_acceptable_high(),
        }
    }
}

fn default_on_target_low() -> f64 {
    90.0
}

fn default_on_target_high() -> f64 {
    110.0
}

fn default_acceptable_low() -> f64 {
    80.0
}

fn default_acceptable_high() -> f64 {
    130.0
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Benchmark used for the overall accuracy and the TOTAL row.
    #[serde(default = "default_benchmark")]
    pub benchmark: String,

    /// Number of line items listed in the report.
    #[serde(default = "default_top_lines")]
    pub top_lines: usize,

    /// Include integrity findings in the report.
    #[serde(default = "default_true")]
    pub include_findings: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            benchmark: default_benchmark(),
            top_lines: default_top_lines(),
            include_findings: true,
        }
    }
}

fn default_benchmark() -> String {
    "pla".to_string()
}

fn default_top_lines() -> usize {
    25
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref benchmark) = args.benchmark {
            self.report.benchmark = benchmark.clone();
        }
        if let Some(top) = args.top {
            self.report.top_lines = top;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level for this run: `quiet` wins, then `general.verbose`.
    ///
    /// Call after [`Config::merge_with_args`] so `--verbose` is reflected.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Check that thresholds and tolerances are usable.
    pub fn validate(&self) -> Result<()> {
        let a = &self.accuracy;
        let ordered = a.acceptable_low <= a.on_target_low
            && a.on_target_low <= a.on_target_high
            && a.on_target_high <= a.acceptable_high;
        if !ordered {
            bail!(
                "accuracy bands must satisfy acceptable_low <= on_target_low <= on_target_high <= acceptable_high (got {} / {} / {} / {})",
                a.acceptable_low,
                a.on_target_low,
                a.on_target_high,
                a.acceptable_high
            );
        }

        let t = &self.tolerance;
        for (name, value) in [
            ("tolerance.line_relative", t.line_relative),
            ("tolerance.total_relative", t.total_relative),
            ("tolerance.share_points", t.share_points),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{} must be a non-negative number (got {})", name, value);
            }
        }

        if self.report.benchmark.trim().is_empty() {
            bail!("report.benchmark must not be empty");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
