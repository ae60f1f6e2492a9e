//! Estimate report assembly and rendering.
//!
//! [`build_report`] gathers every derived view into one serializable
//! [`EstimateReport`]; the generator turns it into Markdown or JSON.

pub mod generator;

pub use generator::{format_money, generate_json_report, generate_markdown_report};

use crate::analysis::{
    accuracy_overall, benchmark_comparison, confidence_breakdown, cost_per_area,
    division_breakdown, filter_lines, line_items_for_section, run_checks, section_comparison,
    sort_lines, source_breakdown, unassigned_divisions, AccuracyBands, BenchmarkRow,
    CheckSummary, DivisionTotal, Finding, LineFilter, LineOrder, SectionRow, SourceTotal,
    Tolerances, UnassignedDivision,
};
use crate::error::ValidationError;
use crate::models::{AccuracyTier, Confidence, Estimate, LineItem, ProjectInfo};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Everything that shapes a report besides the estimate itself.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Where the estimate was loaded from, for the metadata block.
    pub source_path: String,
    pub benchmark: String,
    pub bands: AccuracyBands,
    pub tolerances: Tolerances,
    pub filter: LineFilter,
    /// Restrict the line listing to one section.
    pub section: Option<String>,
    pub top_lines: usize,
    pub include_findings: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            source_path: String::new(),
            benchmark: "pla".to_string(),
            bands: AccuracyBands::default(),
            tolerances: Tolerances::default(),
            filter: LineFilter::default(),
            section: None,
            top_lines: 25,
            include_findings: true,
        }
    }
}

/// Metadata about the report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub source_path: String,
    pub generated_at: DateTime<Utc>,
    pub benchmark: String,
    pub filter: String,
    pub section: Option<String>,
}

/// Headline figures for the whole estimate.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub project: ProjectInfo,
    pub total_cost: f64,
    pub line_total: f64,
    pub line_count: usize,
    pub cost_per_area: Option<f64>,
    pub accuracy_pct: Option<f64>,
    pub accuracy_tier: Option<AccuracyTier>,
}

/// Line items selected by the section and filter options.
#[derive(Debug, Clone, Serialize)]
pub struct LineListing {
    /// Number of lines matching before truncation.
    pub matched: usize,
    pub matched_total: f64,
    pub sources: Vec<SourceTotal>,
    pub confidence: BTreeMap<Confidence, usize>,
    /// The largest matching lines, by descending total.
    pub lines: Vec<LineItem>,
}

/// The complete estimate report.
#[derive(Debug, Clone, Serialize)]
pub struct EstimateReport {
    pub metadata: ReportMetadata,
    pub overview: Overview,
    pub sections: Vec<SectionRow>,
    pub benchmarks: Vec<BenchmarkRow>,
    pub divisions: Vec<DivisionTotal>,
    pub unassigned: Vec<UnassignedDivision>,
    pub listing: LineListing,
    pub check_summary: Option<CheckSummary>,
    pub findings: Vec<Finding>,
}

/// Assemble a report from an estimate.
///
/// Fails only when `options.section` names a section the estimate lacks.
pub fn build_report(
    estimate: &Estimate,
    options: &ReportOptions,
) -> Result<EstimateReport, ValidationError> {
    let accuracy_pct = accuracy_overall(estimate, &options.benchmark);

    let overview = Overview {
        project: estimate.project.clone(),
        total_cost: estimate.summary.total_cost,
        line_total: estimate.line_total(),
        line_count: estimate.lines.len(),
        cost_per_area: cost_per_area(estimate),
        accuracy_pct,
        accuracy_tier: accuracy_pct.map(|pct| options.bands.classify(pct)),
    };

    let listing = build_listing(estimate, options)?;

    let findings = if options.include_findings {
        run_checks(estimate, &options.tolerances)
    } else {
        Vec::new()
    };
    let check_summary = options
        .include_findings
        .then(|| CheckSummary::from_findings(&findings));

    debug!(
        "Report built: {} of {} lines listed, {} findings",
        listing.lines.len(),
        listing.matched,
        findings.len()
    );

    Ok(EstimateReport {
        metadata: ReportMetadata {
            source_path: options.source_path.clone(),
            generated_at: Utc::now(),
            benchmark: options.benchmark.clone(),
            filter: options.filter.describe(),
            section: options.section.clone(),
        },
        overview,
        sections: section_comparison(estimate, &options.benchmark, &options.bands),
        benchmarks: benchmark_comparison(estimate, &options.bands),
        divisions: division_breakdown(estimate),
        unassigned: unassigned_divisions(estimate),
        listing,
        check_summary,
        findings,
    })
}

fn build_listing(
    estimate: &Estimate,
    options: &ReportOptions,
) -> Result<LineListing, ValidationError> {
    let scoped: Vec<&LineItem> = match options.section {
        Some(ref name) => line_items_for_section(estimate, name, LineOrder::Original)
            .ok_or_else(|| {
                let known: Vec<&str> = estimate.sections.iter().map(|s| s.name.as_str()).collect();
                ValidationError::new(
                    "section",
                    format!("no section named '{}' (known: {})", name, known.join(", ")),
                )
            })?,
        None => estimate.lines.iter().collect(),
    };

    let mut matched = filter_lines(scoped, &options.filter);

    let sources = source_breakdown(matched.iter().copied());
    let confidence = confidence_breakdown(matched.iter().copied());
    let matched_total: f64 = matched.iter().map(|l| l.total_cost).sum();
    let matched_count = matched.len();

    sort_lines(&mut matched, LineOrder::TotalDesc);
    matched.truncate(options.top_lines);

    Ok(LineListing {
        matched: matched_count,
        matched_total,
        sources,
        confidence,
        lines: matched.into_iter().cloned().collect(),
    })
}
