use costview::analysis::{
    accuracy_overall, benchmark_comparison, confidence_breakdown, division_breakdown,
    filter_lines, line_items_for_section, run_checks, section_comparison, source_breakdown,
    unassigned_divisions, AccuracyBands, CheckKind, FindingSeverity, LineFilter, LineOrder,
    Tolerances, TOTAL_ROW_LABEL,
};
use costview::error::LoadError;
use costview::loader::load_estimate;
use costview::models::{AccuracyTier, Confidence, Estimate, PricingSource};
use costview::report::{build_report, generate_markdown_report, ReportOptions};
use std::path::PathBuf;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample_estimate.json")
}

fn load_fixture() -> Estimate {
    load_estimate(fixture_path()).unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_fixture_loads() {
    let estimate = load_fixture();

    assert_eq!(estimate.project.name, "Riverside Commons");
    assert_eq!(estimate.lines.len(), 8);
    assert_eq!(estimate.sections.len(), 3);
    assert_eq!(estimate.division_totals.len(), 6);
    assert_eq!(estimate.benchmarks.len(), 2);
    assert_close(estimate.line_total(), estimate.summary.total_cost);
}

#[test]
fn test_source_breakdown_order_and_shares() {
    let estimate = load_fixture();
    let sources = source_breakdown(&estimate.lines);

    let order: Vec<PricingSource> = sources.iter().map(|s| s.source).collect();
    assert_eq!(
        order,
        vec![
            PricingSource::SystemBreakoutDb,
            PricingSource::SystemBreakoutFallback,
            PricingSource::CostDb,
            PricingSource::ParametricGapFill,
            // 300,000 tie: first appearance wins
            PricingSource::CostDbAssembly,
            PricingSource::RateLibraryFallback,
        ]
    );

    let share_sum: f64 = sources.iter().filter_map(|s| s.share_pct).sum();
    assert_close(share_sum, 100.0);
}

#[test]
fn test_confidence_breakdown_counts() {
    let estimate = load_fixture();
    let counts = confidence_breakdown(&estimate.lines);

    assert_eq!(counts.get(&Confidence::High), Some(&3));
    assert_eq!(counts.get(&Confidence::Medium), Some(&3));
    assert_eq!(counts.get(&Confidence::Low), Some(&2));
}

#[test]
fn test_division_breakdown() {
    let estimate = load_fixture();
    let divisions = division_breakdown(&estimate);

    let codes: Vec<&str> = divisions.iter().map(|d| d.division.as_str()).collect();
    assert_eq!(codes, vec!["05", "26", "03", "09", "22", "33"]);

    let concrete = &divisions[2];
    assert_eq!(concrete.name, "Concrete");
    assert_close(concrete.total, 550_000.0);
    assert_close(concrete.cost_per_area.unwrap(), 11.0);
}

#[test]
fn test_section_comparison_tiers() {
    let estimate = load_fixture();
    let rows = section_comparison(&estimate, "pla", &AccuracyBands::default());

    let tiers: Vec<(&str, Option<AccuracyTier>)> =
        rows.iter().map(|r| (r.section.as_str(), r.tier)).collect();
    assert_eq!(
        tiers,
        vec![
            ("Structure", Some(AccuracyTier::OnTarget)),
            ("Interiors", Some(AccuracyTier::Acceptable)),
            // exactly 90% sits on the band edge
            ("MEP", Some(AccuracyTier::OnTarget)),
            (TOTAL_ROW_LABEL, Some(AccuracyTier::OnTarget)),
        ]
    );

    let total = rows.last().unwrap();
    assert!(total.is_total);
    assert_close(total.accuracy_pct.unwrap(), 93.75);
    assert_close(total.variance.unwrap(), -200_000.0);
}

#[test]
fn test_benchmarks_and_overall_accuracy() {
    let estimate = load_fixture();

    assert_close(accuracy_overall(&estimate, "pla").unwrap(), 93.75);
    assert_eq!(accuracy_overall(&estimate, "hanscomb"), None);

    let rows = benchmark_comparison(&estimate, &AccuracyBands::default());
    assert_eq!(rows[0].name, "pla");
    assert_eq!(rows[1].name, "rsmeans");
    assert_eq!(rows[1].tier, Some(AccuracyTier::Acceptable));
    assert_close(rows[1].cost_per_area.unwrap(), 54.0);
}

#[test]
fn test_section_lines_and_filtering() {
    let estimate = load_fixture();

    let mep = line_items_for_section(&estimate, "MEP", LineOrder::TotalDesc).unwrap();
    let descriptions: Vec<&str> = mep.iter().map(|l| l.description.as_str()).collect();
    assert_eq!(
        descriptions,
        vec!["Lighting and branch power", "Plumbing fixtures allowance"]
    );
    assert!(line_items_for_section(&estimate, "Sitework", LineOrder::Original).is_none());

    let filter = LineFilter::from_params(Some("TILE"), Some("09"), Some("all")).unwrap();
    let matched = filter_lines(&estimate.lines, &filter);
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].description, "Acoustic ceiling tile");
}

#[test]
fn test_integrity_checks_flag_unassigned_division() {
    let estimate = load_fixture();

    let unassigned = unassigned_divisions(&estimate);
    assert_eq!(unassigned.len(), 1);
    assert_eq!(unassigned[0].division, "33");

    let findings = run_checks(&estimate, &Tolerances::default());
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].check, CheckKind::UnassignedDivision);
    assert_eq!(findings[0].severity, FindingSeverity::Warning);
}

#[test]
fn test_markdown_report_from_fixture() {
    let estimate = load_fixture();
    let report = build_report(&estimate, &ReportOptions::default()).unwrap();
    let markdown = generate_markdown_report(&report);

    assert!(markdown.contains("# Cost Estimate Report: Riverside Commons"));
    assert!(markdown.contains("- **Cost per SF:** $60"));
    assert!(markdown.contains("### Unassigned Divisions"));
    assert!(markdown.contains("Lighting and branch power"));
}

#[test]
fn test_invalid_document_names_field() {
    let content = std::fs::read_to_string(fixture_path()).unwrap();
    let broken = content.replacen("\"unit_cost\": 750", "\"unit_cost\": -750", 1);

    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.json");
    std::fs::write(&path, broken).unwrap();

    match load_estimate(&path) {
        Err(LoadError::Validation(err)) => assert_eq!(err.field, "lines[1].unit_cost"),
        other => panic!("expected a validation error, got {:?}", other),
    }
}
