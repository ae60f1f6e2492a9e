//! Integrity checks over a loaded estimate.
//!
//! The document carries several figures that should be derivable from its
//! line items (summary total, division totals, pricing shares). These
//! checks recompute them and report disagreements as findings. They never
//! fail: a finding is information for the reader, not an error.

use super::aggregator::{recompute_division_totals, source_breakdown, unassigned_divisions};
use crate::models::{Estimate, PricingSource};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    /// Informational - stated figures that differ cosmetically
    Info,
    /// Warning - line-level disagreements, unassigned divisions
    Warning,
    /// Error - the estimate's headline figure does not add up
    Error,
}

impl FindingSeverity {
    pub fn emoji(&self) -> &'static str {
        match self {
            FindingSeverity::Info => "🔵",
            FindingSeverity::Warning => "🟡",
            FindingSeverity::Error => "🔴",
        }
    }
}

impl fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingSeverity::Info => write!(f, "Info"),
            FindingSeverity::Warning => write!(f, "Warning"),
            FindingSeverity::Error => write!(f, "Error"),
        }
    }
}

/// Which invariant a finding concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    LineArithmetic,
    SummaryTotal,
    DivisionTotals,
    UnassignedDivision,
    OverlappingSections,
    SectionPct,
    PricingShare,
    LineCount,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::LineArithmetic => write!(f, "Line arithmetic"),
            CheckKind::SummaryTotal => write!(f, "Summary total"),
            CheckKind::DivisionTotals => write!(f, "Division totals"),
            CheckKind::UnassignedDivision => write!(f, "Unassigned division"),
            CheckKind::OverlappingSections => write!(f, "Overlapping sections"),
            CheckKind::SectionPct => write!(f, "Section accuracy"),
            CheckKind::PricingShare => write!(f, "Pricing share"),
            CheckKind::LineCount => write!(f, "Line count"),
        }
    }
}

/// A single integrity finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: FindingSeverity,
    pub check: CheckKind,
    pub message: String,
}

impl Finding {
    fn new(severity: FindingSeverity, check: CheckKind, message: String) -> Self {
        Self {
            severity,
            check,
            message,
        }
    }
}

/// Counts of findings by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

impl CheckSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        summary.total = findings.len();

        for finding in findings {
            match finding.severity {
                FindingSeverity::Error => summary.errors += 1,
                FindingSeverity::Warning => summary.warnings += 1,
                FindingSeverity::Info => summary.info += 1,
            }
        }

        summary
    }
}

/// Tolerances used when comparing stated and recomputed figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tolerances {
    /// Relative tolerance for `total ≈ quantity * unit_cost`.
    pub line_relative: f64,
    /// Relative tolerance for summed totals.
    pub total_relative: f64,
    /// Absolute tolerance in percentage points for shares and accuracy.
    pub share_points: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            line_relative: 0.005,
            total_relative: 0.005,
            share_points: 1.0,
        }
    }
}

impl From<&crate::config::ToleranceConfig> for Tolerances {
    fn from(config: &crate::config::ToleranceConfig) -> Self {
        Self {
            line_relative: config.line_relative,
            total_relative: config.total_relative,
            share_points: config.share_points,
        }
    }
}

/// Run every integrity check. Findings are ordered by check, then by
/// position in the document.
///
/// Error-severity findings are also logged at `warn` level.
pub fn run_checks(estimate: &Estimate, tolerances: &Tolerances) -> Vec<Finding> {
    let mut findings = Vec::new();

    check_line_arithmetic(estimate, tolerances, &mut findings);
    check_summary_total(estimate, tolerances, &mut findings);
    check_line_count(estimate, &mut findings);
    check_division_totals(estimate, tolerances, &mut findings);
    check_unassigned(estimate, &mut findings);
    check_overlapping_sections(estimate, &mut findings);
    check_section_pct(estimate, tolerances, &mut findings);
    check_pricing_shares(estimate, tolerances, &mut findings);

    for finding in findings
        .iter()
        .filter(|f| f.severity == FindingSeverity::Error)
    {
        warn!("{}: {}", finding.check, finding.message);
    }

    debug!("Integrity checks produced {} findings", findings.len());
    findings
}

/// Whether `a` and `b` agree within `relative * max(1, |a|, |b|)`.
pub fn within_relative(a: f64, b: f64, relative: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= relative * scale
}

fn check_line_arithmetic(estimate: &Estimate, tolerances: &Tolerances, out: &mut Vec<Finding>) {
    for (i, line) in estimate.lines.iter().enumerate() {
        if !line.arithmetic_holds(tolerances.line_relative) {
            out.push(Finding::new(
                FindingSeverity::Warning,
                CheckKind::LineArithmetic,
                format!(
                    "lines[{}] '{}': total {:.2} differs from {} {} × {:.2} = {:.2}",
                    i,
                    line.description,
                    line.total_cost,
                    line.quantity,
                    line.unit,
                    line.unit_cost,
                    line.quantity * line.unit_cost
                ),
            ));
        }
    }
}

fn check_summary_total(estimate: &Estimate, tolerances: &Tolerances, out: &mut Vec<Finding>) {
    let line_total = estimate.line_total();
    let stated = estimate.summary.total_cost;

    if !within_relative(line_total, stated, tolerances.total_relative) {
        out.push(Finding::new(
            FindingSeverity::Error,
            CheckKind::SummaryTotal,
            format!(
                "summary total {:.2} differs from line item sum {:.2} by {:.2}",
                stated,
                line_total,
                stated - line_total
            ),
        ));
    }
}

fn check_line_count(estimate: &Estimate, out: &mut Vec<Finding>) {
    if let Some(stated) = estimate.summary.line_count {
        let actual = estimate.lines.len() as u64;
        if stated != actual {
            out.push(Finding::new(
                FindingSeverity::Warning,
                CheckKind::LineCount,
                format!("summary states {} line items, document has {}", stated, actual),
            ));
        }
    }
}

fn check_division_totals(estimate: &Estimate, tolerances: &Tolerances, out: &mut Vec<Finding>) {
    if estimate.division_totals.is_empty() {
        return;
    }

    let recomputed = recompute_division_totals(&estimate.lines);
    let divisions: BTreeSet<&String> = recomputed
        .keys()
        .chain(estimate.division_totals.keys())
        .collect();

    for division in divisions {
        let stated = estimate.division_totals.get(division).copied();
        let actual = recomputed.get(division).copied().unwrap_or(0.0);

        let message = match stated {
            None if actual != 0.0 => Some(format!(
                "division {} has line items totalling {:.2} but no stated total",
                division, actual
            )),
            Some(stated) if !within_relative(stated, actual, tolerances.total_relative) => {
                Some(format!(
                    "division {} stated total {:.2} differs from line item sum {:.2}",
                    division, stated, actual
                ))
            }
            _ => None,
        };

        if let Some(message) = message {
            out.push(Finding::new(
                FindingSeverity::Warning,
                CheckKind::DivisionTotals,
                message,
            ));
        }
    }
}

fn check_unassigned(estimate: &Estimate, out: &mut Vec<Finding>) {
    for unassigned in unassigned_divisions(estimate) {
        out.push(Finding::new(
            FindingSeverity::Warning,
            CheckKind::UnassignedDivision,
            format!(
                "division {} ({}) with {} line items totalling {:.2} is not claimed by any section",
                unassigned.division, unassigned.name, unassigned.line_count, unassigned.total
            ),
        ));
    }
}

fn check_overlapping_sections(estimate: &Estimate, out: &mut Vec<Finding>) {
    let mut claims: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for section in &estimate.sections {
        let unique: BTreeSet<&str> = section.divisions.iter().map(String::as_str).collect();
        for division in unique {
            claims.entry(division).or_default().push(&section.name);
        }
    }

    for (division, sections) in claims {
        if sections.len() > 1 {
            out.push(Finding::new(
                FindingSeverity::Info,
                CheckKind::OverlappingSections,
                format!(
                    "division {} is claimed by {}; line items count toward '{}'",
                    division,
                    sections.join(", "),
                    sections[0]
                ),
            ));
        }
    }
}

fn check_section_pct(estimate: &Estimate, tolerances: &Tolerances, out: &mut Vec<Finding>) {
    for section in &estimate.sections {
        let Some(stated) = section.stated_pct else {
            continue;
        };

        let message = match section.pct() {
            Some(actual) if (stated - actual).abs() > tolerances.share_points => Some(format!(
                "section '{}' states {:.1}% accuracy, engine/benchmark gives {:.1}%",
                section.name, stated, actual
            )),
            None => Some(format!(
                "section '{}' states {:.1}% accuracy but its benchmark total is zero",
                section.name, stated
            )),
            _ => None,
        };

        if let Some(message) = message {
            out.push(Finding::new(
                FindingSeverity::Info,
                CheckKind::SectionPct,
                message,
            ));
        }
    }
}

fn check_pricing_shares(estimate: &Estimate, tolerances: &Tolerances, out: &mut Vec<Finding>) {
    let Some(ref method) = estimate.pricing_method else {
        return;
    };

    let shares = source_breakdown(&estimate.lines);
    let share_of = |source: PricingSource| -> f64 {
        shares
            .iter()
            .find(|s| s.source == source)
            .and_then(|s| s.share_pct)
            .unwrap_or(0.0)
    };

    let stated_shares = [
        ("parametric_pct", method.parametric_pct, PricingSource::ParametricGapFill),
        ("rate_library_pct", method.rate_library_pct, PricingSource::RateLibraryFallback),
    ];

    for (field, stated, source) in stated_shares {
        let Some(stated) = stated else {
            continue;
        };
        let actual = share_of(source);
        if (stated - actual).abs() > tolerances.share_points {
            out.push(Finding::new(
                FindingSeverity::Info,
                CheckKind::PricingShare,
                format!(
                    "pricing_method.{} states {:.1}%, line items give {:.1}% of cost from {}",
                    field, stated, actual, source
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Confidence, EstimateSummary, LineItem, PricingMethod, ProjectInfo, Section,
    };

    fn create_test_line(total_cost: f64, division: &str, source: PricingSource) -> LineItem {
        LineItem {
            description: format!("Item {}", division),
            quantity: 2.0,
            unit: "SF".to_string(),
            unit_cost: total_cost / 2.0,
            total_cost,
            csi_division: division.to_string(),
            source,
            confidence: Confidence::High,
        }
    }

    fn create_test_estimate() -> Estimate {
        Estimate {
            project: ProjectInfo {
                name: "Checks".to_string(),
                location: None,
                building_type: None,
                gross_floor_area_sf: 1000.0,
                units: None,
                estimate_class: None,
                accuracy_range: None,
            },
            summary: EstimateSummary {
                total_cost: 1000.0,
                cost_per_sf: None,
                line_count: Some(3),
            },
            pricing_method: Some(PricingMethod {
                match_rate: None,
                parametric_pct: Some(20.0),
                rate_library_pct: None,
            }),
            lines: vec![
                create_test_line(500.0, "03", PricingSource::CostDb),
                create_test_line(300.0, "09", PricingSource::CostDb),
                create_test_line(200.0, "26", PricingSource::ParametricGapFill),
            ],
            sections: vec![
                Section {
                    name: "Structure".to_string(),
                    divisions: vec!["03".to_string()],
                    engine: 500.0,
                    pla: 500.0,
                    stated_pct: Some(100.0),
                },
                Section {
                    name: "Fit-out".to_string(),
                    divisions: vec!["09".to_string(), "26".to_string()],
                    engine: 500.0,
                    pla: 520.0,
                    stated_pct: None,
                },
            ],
            division_totals: [
                ("03".to_string(), 500.0),
                ("09".to_string(), 300.0),
                ("26".to_string(), 200.0),
            ]
            .into_iter()
            .collect(),
            benchmarks: BTreeMap::new(),
        }
    }

    fn kinds(findings: &[Finding]) -> Vec<CheckKind> {
        findings.iter().map(|f| f.check).collect()
    }

    #[test]
    fn test_consistent_estimate_has_no_findings() {
        let findings = run_checks(&create_test_estimate(), &Tolerances::default());
        assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    #[test]
    fn test_line_arithmetic_finding() {
        let mut estimate = create_test_estimate();
        estimate.lines[1].unit_cost = 100.0;

        let findings = run_checks(&estimate, &Tolerances::default());

        assert_eq!(kinds(&findings), vec![CheckKind::LineArithmetic]);
        assert!(findings[0].message.starts_with("lines[1]"));
    }

    #[test]
    fn test_summary_total_is_error() {
        let mut estimate = create_test_estimate();
        estimate.summary.total_cost = 1100.0;

        let findings = run_checks(&estimate, &Tolerances::default());

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, FindingSeverity::Error);
        assert_eq!(findings[0].check, CheckKind::SummaryTotal);
    }

    #[test]
    fn test_summary_total_within_tolerance() {
        let mut estimate = create_test_estimate();
        estimate.summary.total_cost = 1004.0;

        let findings = run_checks(&estimate, &Tolerances::default());
        assert!(findings.is_empty());
    }

    #[test]
    fn test_division_totals_disagreement() {
        let mut estimate = create_test_estimate();
        estimate.division_totals.insert("09".to_string(), 350.0);
        estimate.division_totals.remove("26");

        let findings = run_checks(&estimate, &Tolerances::default());

        assert_eq!(
            kinds(&findings),
            vec![CheckKind::DivisionTotals, CheckKind::DivisionTotals]
        );
        assert!(findings[0].message.contains("division 09"));
        assert!(findings[1].message.contains("division 26"));
    }

    #[test]
    fn test_unassigned_and_overlap() {
        let mut estimate = create_test_estimate();
        estimate.sections[1].divisions = vec!["09".to_string(), "03".to_string()];

        let findings = run_checks(&estimate, &Tolerances::default());

        assert_eq!(
            kinds(&findings),
            vec![CheckKind::UnassignedDivision, CheckKind::OverlappingSections]
        );
        assert!(findings[0].message.contains("division 26"));
        assert!(findings[1].message.contains("'Structure'"));
    }

    #[test]
    fn test_section_pct_and_pricing_share() {
        let mut estimate = create_test_estimate();
        estimate.sections[0].stated_pct = Some(90.0);
        estimate.pricing_method = Some(PricingMethod {
            match_rate: Some(80.0),
            parametric_pct: Some(35.0),
            rate_library_pct: Some(0.0),
        });

        let findings = run_checks(&estimate, &Tolerances::default());

        assert_eq!(
            kinds(&findings),
            vec![CheckKind::SectionPct, CheckKind::PricingShare]
        );
        assert!(findings[1].message.contains("parametric_pct"));
    }

    #[test]
    fn test_line_count_mismatch() {
        let mut estimate = create_test_estimate();
        estimate.summary.line_count = Some(4);

        let findings = run_checks(&estimate, &Tolerances::default());
        assert_eq!(kinds(&findings), vec![CheckKind::LineCount]);
    }

    #[test]
    fn test_check_summary() {
        let findings = vec![
            Finding::new(FindingSeverity::Error, CheckKind::SummaryTotal, String::new()),
            Finding::new(FindingSeverity::Info, CheckKind::SectionPct, String::new()),
            Finding::new(FindingSeverity::Info, CheckKind::PricingShare, String::new()),
        ];

        let summary = CheckSummary::from_findings(&findings);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.warnings, 0);
        assert_eq!(summary.info, 2);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(FindingSeverity::Info < FindingSeverity::Warning);
        assert!(FindingSeverity::Warning < FindingSeverity::Error);
    }
}
