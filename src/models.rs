//! Data models for cost estimates.
//!
//! This module contains the validated estimate document and the closed
//! enumerations used throughout the aggregation views.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How a line item's cost was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingSource {
    /// Direct match against the cost database.
    CostDb,
    /// Expansion of a cost database assembly into components.
    CostDbAssembly,
    /// System breakout priced from the cost database.
    SystemBreakoutDb,
    /// System breakout priced from estimated fallback rates.
    SystemBreakoutFallback,
    /// Rate library used when no database match was found.
    RateLibraryFallback,
    /// Parametric allowance filling a scope gap.
    ParametricGapFill,
}

impl PricingSource {
    /// Every pricing source, in declaration order.
    pub const ALL: [PricingSource; 6] = [
        PricingSource::CostDb,
        PricingSource::CostDbAssembly,
        PricingSource::SystemBreakoutDb,
        PricingSource::SystemBreakoutFallback,
        PricingSource::RateLibraryFallback,
        PricingSource::ParametricGapFill,
    ];

    /// The identifier used in estimate documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingSource::CostDb => "cost_db",
            PricingSource::CostDbAssembly => "cost_db_assembly",
            PricingSource::SystemBreakoutDb => "system_breakout_db",
            PricingSource::SystemBreakoutFallback => "system_breakout_fallback",
            PricingSource::RateLibraryFallback => "rate_library_fallback",
            PricingSource::ParametricGapFill => "parametric_gap_fill",
        }
    }

    /// Human-readable label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            PricingSource::CostDb => "Cost DB match",
            PricingSource::CostDbAssembly => "Cost DB assembly",
            PricingSource::SystemBreakoutDb => "System breakout (DB)",
            PricingSource::SystemBreakoutFallback => "System breakout (fallback)",
            PricingSource::RateLibraryFallback => "Rate library fallback",
            PricingSource::ParametricGapFill => "Parametric gap-fill",
        }
    }
}

impl fmt::Display for PricingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PricingSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PricingSource::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = PricingSource::ALL.iter().map(|s| s.as_str()).collect();
                format!("unknown pricing source '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Confidence tier assigned to a priced line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub const ALL: [Confidence; 3] = [Confidence::High, Confidence::Medium, Confidence::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(format!(
                "unknown confidence tier '{}' (expected high, medium or low)",
                other
            )),
        }
    }
}

/// Classification of an engine/benchmark accuracy percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTier {
    OnTarget,
    Acceptable,
    OffTarget,
}

impl AccuracyTier {
    /// Returns an emoji badge for the tier.
    pub fn emoji(&self) -> &'static str {
        match self {
            AccuracyTier::OnTarget => "🟢",
            AccuracyTier::Acceptable => "🟡",
            AccuracyTier::OffTarget => "🔴",
        }
    }
}

impl fmt::Display for AccuracyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccuracyTier::OnTarget => write!(f, "on_target"),
            AccuracyTier::Acceptable => write!(f, "acceptable"),
            AccuracyTier::OffTarget => write!(f, "off_target"),
        }
    }
}

/// Descriptive project metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub location: Option<String>,
    pub building_type: Option<String>,
    /// Gross floor area in square feet. Zero means unknown.
    pub gross_floor_area_sf: f64,
    pub units: Option<u64>,
    pub estimate_class: Option<String>,
    pub accuracy_range: Option<String>,
}

/// Stated totals for the whole estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateSummary {
    pub total_cost: f64,
    pub cost_per_sf: Option<f64>,
    pub line_count: Option<u64>,
}

/// Externally supplied pricing statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingMethod {
    pub match_rate: Option<f64>,
    pub parametric_pct: Option<f64>,
    pub rate_library_pct: Option<f64>,
}

/// A single priced line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub total_cost: f64,
    /// Two-digit CSI MasterFormat division code.
    pub csi_division: String,
    pub source: PricingSource,
    pub confidence: Confidence,
}

impl LineItem {
    /// Difference between the stated total and `quantity * unit_cost`.
    pub fn arithmetic_error(&self) -> f64 {
        self.total_cost - self.quantity * self.unit_cost
    }

    /// Whether the stated total agrees with `quantity * unit_cost`.
    ///
    /// The tolerance is relative to `max(1, total_cost)`.
    pub fn arithmetic_holds(&self, tolerance: f64) -> bool {
        self.arithmetic_error().abs() <= tolerance * self.total_cost.max(1.0)
    }
}

/// A named grouping of CSI divisions used for benchmark comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub divisions: Vec<String>,
    /// Total computed by the estimating engine.
    pub engine: f64,
    /// External comparison total.
    pub pla: f64,
    /// Accuracy percentage as stated in the document, if any.
    pub stated_pct: Option<f64>,
}

impl Section {
    /// `engine / pla * 100`, undefined when `pla` is not positive.
    pub fn pct(&self) -> Option<f64> {
        ratio_pct(self.engine, self.pla)
    }

    pub fn claims(&self, division: &str) -> bool {
        self.divisions.iter().any(|d| d == division)
    }
}

/// An external comparison estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Benchmark {
    pub total: f64,
    pub area: Option<f64>,
    pub note: Option<String>,
}

/// The complete, validated estimate document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    pub project: ProjectInfo,
    pub summary: EstimateSummary,
    pub pricing_method: Option<PricingMethod>,
    pub lines: Vec<LineItem>,
    pub sections: Vec<Section>,
    pub division_totals: BTreeMap<String, f64>,
    pub benchmarks: BTreeMap<String, Benchmark>,
}

impl Estimate {
    /// Sum of every line item's total cost.
    pub fn line_total(&self) -> f64 {
        self.lines.iter().map(|l| l.total_cost).sum()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn benchmark(&self, key: &str) -> Option<&Benchmark> {
        self.benchmarks.get(key)
    }
}

/// `numerator / denominator * 100`, undefined for a non-positive denominator
/// or a result too large to represent.
pub fn ratio_pct(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        Some(numerator / denominator * 100.0).filter(|pct| pct.is_finite())
    } else {
        None
    }
}
