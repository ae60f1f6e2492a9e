//! Markdown and JSON report generation.
//!
//! This module renders an [`EstimateReport`] as a Markdown document of
//! tables, or as pretty-printed JSON.

use super::{EstimateReport, LineListing, Overview, ReportMetadata};
use crate::analysis::{
    confidence_pct, BenchmarkRow, CheckSummary, DivisionTotal, Finding, SectionRow,
    UnassignedDivision,
};
use crate::models::{AccuracyTier, Confidence};
use anyhow::Result;

const PLACEHOLDER: &str = "n/a";

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &EstimateReport) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!(
        "# Cost Estimate Report: {}\n\n",
        report.overview.project.name
    ));

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_overview_section(&report.overview));
    output.push_str(&generate_sections_section(&report.sections));
    output.push_str(&generate_benchmarks_section(&report.benchmarks));
    output.push_str(&generate_divisions_section(
        &report.divisions,
        &report.unassigned,
    ));
    output.push_str(&generate_listing_section(&report.listing));

    if let Some(ref summary) = report.check_summary {
        output.push_str(&generate_findings_section(summary, &report.findings));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate a JSON report.
pub fn generate_json_report(report: &EstimateReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    if !metadata.source_path.is_empty() {
        section.push_str(&format!("- **Estimate:** `{}`\n", metadata.source_path));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Benchmark:** `{}`\n", metadata.benchmark));
    section.push_str(&format!("- **Filter:** {}\n", metadata.filter));
    if let Some(ref name) = metadata.section {
        section.push_str(&format!("- **Section:** {}\n", name));
    }
    section.push('\n');

    section
}

/// Generate the overview section.
fn generate_overview_section(overview: &Overview) -> String {
    let mut section = String::new();
    let project = &overview.project;

    section.push_str("## Overview\n\n");

    let optional = [
        ("Location", project.location.as_deref()),
        ("Building Type", project.building_type.as_deref()),
        ("Estimate Class", project.estimate_class.as_deref()),
        ("Stated Accuracy Range", project.accuracy_range.as_deref()),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            section.push_str(&format!("- **{}:** {}\n", label, value));
        }
    }
    if let Some(units) = project.units {
        section.push_str(&format!("- **Units:** {}\n", units));
    }

    section.push_str(&format!(
        "- **Gross Floor Area:** {} SF\n",
        format_quantity(project.gross_floor_area_sf)
    ));
    section.push_str(&format!(
        "- **Total Cost:** {}\n",
        format_money(overview.total_cost)
    ));
    section.push_str(&format!(
        "- **Cost per SF:** {}\n",
        format_optional_money(overview.cost_per_area)
    ));
    section.push_str(&format!(
        "- **Line Items:** {} (sum {})\n",
        overview.line_count,
        format_money(overview.line_total)
    ));
    section.push_str(&format!(
        "- **Accuracy vs Benchmark:** {} {}\n\n",
        format_pct(overview.accuracy_pct),
        format_tier(overview.accuracy_tier)
    ));

    section
}

/// Generate the section comparison table.
fn generate_sections_section(rows: &[SectionRow]) -> String {
    let mut section = String::new();

    section.push_str("## Section Comparison\n\n");
    section.push_str("| Section | Engine | Benchmark | Variance | Accuracy | Tier |\n");
    section.push_str("|:---|---:|---:|---:|---:|:---:|\n");

    for row in rows {
        let name = if row.is_total {
            format!("**{}**", row.section)
        } else {
            row.section.clone()
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            name,
            format_money(row.engine_total),
            format_optional_money(row.benchmark_total),
            format_optional_money(row.variance),
            format_pct(row.accuracy_pct),
            format_tier(row.tier)
        ));
    }
    section.push('\n');

    section
}

/// Generate the benchmark comparison table.
fn generate_benchmarks_section(rows: &[BenchmarkRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Benchmarks\n\n");
    section.push_str("| Benchmark | Total | Cost/SF | Variance | Accuracy | Tier | Note |\n");
    section.push_str("|:---|---:|---:|---:|---:|:---:|:---|\n");

    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            row.name,
            format_money(row.total),
            format_optional_money(row.cost_per_area),
            format_money(row.variance),
            format_pct(row.accuracy_pct),
            format_tier(row.tier),
            row.note.as_deref().unwrap_or("")
        ));
    }
    section.push('\n');

    section
}

/// Generate the division breakdown and the unassigned divisions.
fn generate_divisions_section(
    divisions: &[DivisionTotal],
    unassigned: &[UnassignedDivision],
) -> String {
    let mut section = String::new();

    section.push_str("## Divisions\n\n");

    if divisions.is_empty() {
        section.push_str("No priced divisions.\n\n");
    } else {
        section.push_str("| Division | Name | Total | Cost/SF | Share |\n");
        section.push_str("|:---:|:---|---:|---:|---:|\n");

        for division in divisions {
            section.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                division.division,
                division.name,
                format_money(division.total),
                format_optional_money(division.cost_per_area),
                format_pct(division.share_pct)
            ));
        }
        section.push('\n');
    }

    if !unassigned.is_empty() {
        section.push_str("### Unassigned Divisions\n\n");
        section.push_str("Divisions with line items that no section claims:\n\n");
        section.push_str("| Division | Name | Lines | Total |\n");
        section.push_str("|:---:|:---|:---:|---:|\n");

        for division in unassigned {
            section.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                division.division,
                division.name,
                division.line_count,
                format_money(division.total)
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the pricing, confidence and line item tables.
fn generate_listing_section(listing: &LineListing) -> String {
    let mut section = String::new();

    section.push_str("## Line Items\n\n");
    section.push_str(&format!(
        "*Matching lines: {} | Total: {}*\n\n",
        listing.matched,
        format_money(listing.matched_total)
    ));

    if listing.matched == 0 {
        section.push_str("No line items match the current filter.\n\n");
        return section;
    }

    section.push_str("### Pricing Sources\n\n");
    section.push_str("| Source | Total | Share |\n");
    section.push_str("|:---|---:|---:|\n");
    for source in &listing.sources {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            source.source.label(),
            format_money(source.total),
            format_pct(source.share_pct)
        ));
    }
    section.push('\n');

    section.push_str("### Confidence\n\n");
    section.push_str("| Tier | Lines | Share |\n");
    section.push_str("|:---|:---:|---:|\n");
    for tier in Confidence::ALL {
        let count = listing.confidence.get(&tier).copied().unwrap_or(0);
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            tier,
            count,
            format_pct(confidence_pct(&listing.confidence, tier))
        ));
    }
    section.push('\n');

    section.push_str(&format!("### Top {} Line Items\n\n", listing.lines.len()));
    section.push_str("| Description | Qty | Unit | Unit Cost | Total | Div | Source | Confidence |\n");
    section.push_str("|:---|---:|:---:|---:|---:|:---:|:---|:---:|\n");
    for line in &listing.lines {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
            escape_cell(&line.description),
            format_quantity(line.quantity),
            line.unit,
            format_money(line.unit_cost),
            format_money(line.total_cost),
            line.csi_division,
            line.source,
            line.confidence
        ));
    }
    section.push('\n');

    section
}

/// Generate the integrity findings section.
fn generate_findings_section(summary: &CheckSummary, findings: &[Finding]) -> String {
    let mut section = String::new();

    section.push_str("## Integrity Checks\n\n");

    if findings.is_empty() {
        section.push_str("All stated figures agree with the line items. ✅\n\n");
        return section;
    }

    section.push_str(&format!(
        "*Findings: {} | Errors: {} | Warnings: {} | Info: {}*\n\n",
        summary.total, summary.errors, summary.warnings, summary.info
    ));

    let mut sorted: Vec<&Finding> = findings.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity));

    for finding in sorted {
        section.push_str(&format!(
            "- {} **{}** ({}): {}\n",
            finding.severity.emoji(),
            finding.severity,
            finding.check,
            finding.message
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by costview*\n".to_string()
}

/// Format a dollar amount with thousands separators, e.g. `$1,234,568`.
pub fn format_money(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}${}", sign, group_thousands(rounded.abs() as u64))
}

fn format_optional_money(amount: Option<f64>) -> String {
    amount.map_or_else(|| PLACEHOLDER.to_string(), format_money)
}

fn format_pct(pct: Option<f64>) -> String {
    pct.map_or_else(|| PLACEHOLDER.to_string(), |p| format!("{:.1}%", p))
}

fn format_tier(tier: Option<AccuracyTier>) -> String {
    tier.map_or_else(String::new, |t| format!("{} {}", t.emoji(), t))
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        group_thousands(quantity.abs() as u64)
    } else {
        format!("{:.2}", quantity)
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
