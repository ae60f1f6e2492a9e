//! Cost aggregation and benchmark comparison.
//!
//! Every function here is pure: it borrows the estimate (or a sequence of
//! its line items) and returns a freshly built view. Ratios whose
//! denominator is zero come back as `None` rather than NaN or infinity.

use crate::csi::division_name;
use crate::models::{
    ratio_pct, AccuracyTier, Confidence, Estimate, LineItem, PricingSource, Section,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Label of the synthetic row that closes a section comparison.
pub const TOTAL_ROW_LABEL: &str = "TOTAL";

/// Percentage bands used to classify engine/benchmark accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccuracyBands {
    pub on_target_low: f64,
    pub on_target_high: f64,
    pub acceptable_low: f64,
    pub acceptable_high: f64,
}

impl Default for AccuracyBands {
    fn default() -> Self {
        Self {
            on_target_low: 90.0,
            on_target_high: 110.0,
            acceptable_low: 80.0,
            acceptable_high: 130.0,
        }
    }
}

impl From<&crate::config::AccuracyConfig> for AccuracyBands {
    fn from(config: &crate::config::AccuracyConfig) -> Self {
        Self {
            on_target_low: config.on_target_low,
            on_target_high: config.on_target_high,
            acceptable_low: config.acceptable_low,
            acceptable_high: config.acceptable_high,
        }
    }
}

impl AccuracyBands {
    /// Classify an accuracy percentage. Band edges are inclusive.
    pub fn classify(&self, pct: f64) -> AccuracyTier {
        if (self.on_target_low..=self.on_target_high).contains(&pct) {
            AccuracyTier::OnTarget
        } else if (self.acceptable_low..=self.acceptable_high).contains(&pct) {
            AccuracyTier::Acceptable
        } else {
            AccuracyTier::OffTarget
        }
    }
}

/// Total cost attributed to one pricing source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceTotal {
    pub source: PricingSource,
    pub total: f64,
    /// Share of the summed line cost, undefined when that sum is zero.
    pub share_pct: Option<f64>,
}

/// Line-item totals rolled up by CSI division.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivisionTotal {
    pub division: String,
    pub name: String,
    pub total: f64,
    pub cost_per_area: Option<f64>,
    pub share_pct: Option<f64>,
}

/// One row of the section-vs-benchmark comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionRow {
    pub section: String,
    pub engine_total: f64,
    pub benchmark_total: Option<f64>,
    pub variance: Option<f64>,
    pub accuracy_pct: Option<f64>,
    pub tier: Option<AccuracyTier>,
    pub is_total: bool,
}

/// Estimate total compared against one external benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkRow {
    pub name: String,
    pub total: f64,
    pub area: Option<f64>,
    pub note: Option<String>,
    pub cost_per_area: Option<f64>,
    pub variance: f64,
    pub accuracy_pct: Option<f64>,
    pub tier: Option<AccuracyTier>,
}

/// A division that appears in line items but belongs to no section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnassignedDivision {
    pub division: String,
    pub name: String,
    pub total: f64,
    pub line_count: usize,
}

/// Ordering applied to line-item listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineOrder {
    /// Document order.
    Original,
    /// Descending total cost; ties keep document order.
    #[default]
    TotalDesc,
}

/// Sum line-item cost per pricing source.
///
/// Sources whose total is not positive are dropped. The result is sorted by
/// descending total; ties keep the order in which sources first appear.
pub fn source_breakdown<'a, I>(lines: I) -> Vec<SourceTotal>
where
    I: IntoIterator<Item = &'a LineItem>,
{
    let mut totals: Vec<(PricingSource, f64)> = Vec::new();
    let mut grand_total = 0.0;

    for line in lines {
        grand_total += line.total_cost;
        match totals.iter_mut().find(|(source, _)| *source == line.source) {
            Some((_, total)) => *total += line.total_cost,
            None => totals.push((line.source, line.total_cost)),
        }
    }

    let mut breakdown: Vec<SourceTotal> = totals
        .into_iter()
        .filter(|(_, total)| *total > 0.0)
        .map(|(source, total)| SourceTotal {
            source,
            total,
            share_pct: ratio_pct(total, grand_total),
        })
        .collect();

    breakdown.sort_by(|a, b| b.total.total_cmp(&a.total));
    breakdown
}

/// Count line items per confidence tier.
///
/// Tiers with no line items are absent from the map.
pub fn confidence_breakdown<'a, I>(lines: I) -> BTreeMap<Confidence, usize>
where
    I: IntoIterator<Item = &'a LineItem>,
{
    let mut counts: BTreeMap<Confidence, usize> = BTreeMap::new();

    for line in lines {
        *counts.entry(line.confidence).or_default() += 1;
    }

    counts
}

/// Percentage of line items in `tier`, treating an absent tier as zero.
pub fn confidence_pct(counts: &BTreeMap<Confidence, usize>, tier: Confidence) -> Option<f64> {
    let total: usize = counts.values().sum();
    let count = counts.get(&tier).copied().unwrap_or(0);
    ratio_pct(count as f64, total as f64)
}

/// Roll line items up by CSI division.
///
/// Only divisions with a positive total are returned, sorted by descending
/// total. `cost_per_area` is undefined when the floor area is not positive.
pub fn division_breakdown(estimate: &Estimate) -> Vec<DivisionTotal> {
    let area = estimate.project.gross_floor_area_sf;

    let mut divisions: Vec<DivisionTotal> = group_by_division(&estimate.lines)
        .into_iter()
        .filter(|(_, total, _)| *total > 0.0)
        .map(|(division, total, _)| DivisionTotal {
            name: division_name(division),
            division: division.to_string(),
            total,
            cost_per_area: per_area(total, area),
            share_pct: ratio_pct(total, estimate.summary.total_cost),
        })
        .collect();

    divisions.sort_by(|a, b| b.total.total_cmp(&a.total));
    divisions
}

/// Recompute the division -> total mapping from line items.
///
/// Unlike [`division_breakdown`] this keeps zero-total divisions so it can
/// be compared key for key with the totals stated in the document.
pub fn recompute_division_totals<'a, I>(lines: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a LineItem>,
{
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();

    for line in lines {
        *totals.entry(line.csi_division.clone()).or_default() += line.total_cost;
    }

    totals
}

/// Compare every section against its own benchmark figure, then append a
/// `TOTAL` row comparing the summary total with `benchmark_key`.
///
/// Rows keep the document's section order.
pub fn section_comparison(
    estimate: &Estimate,
    benchmark_key: &str,
    bands: &AccuracyBands,
) -> Vec<SectionRow> {
    let mut rows: Vec<SectionRow> = estimate
        .sections
        .iter()
        .map(|section| compare_row(&section.name, section.engine, Some(section.pla), bands, false))
        .collect();

    let benchmark_total = estimate.benchmark(benchmark_key).map(|b| b.total);
    rows.push(compare_row(
        TOTAL_ROW_LABEL,
        estimate.summary.total_cost,
        benchmark_total,
        bands,
        true,
    ));

    rows
}

/// Compare the summary total against every benchmark, ordered by name.
pub fn benchmark_comparison(estimate: &Estimate, bands: &AccuracyBands) -> Vec<BenchmarkRow> {
    let engine_total = estimate.summary.total_cost;

    estimate
        .benchmarks
        .iter()
        .map(|(name, benchmark)| {
            let accuracy_pct = ratio_pct(engine_total, benchmark.total);
            BenchmarkRow {
                name: name.clone(),
                total: benchmark.total,
                area: benchmark.area,
                note: benchmark.note.clone(),
                cost_per_area: benchmark.area.and_then(|area| per_area(benchmark.total, area)),
                variance: engine_total - benchmark.total,
                accuracy_pct,
                tier: accuracy_pct.map(|pct| bands.classify(pct)),
            }
        })
        .collect()
}

/// Overall accuracy of the estimate against a named benchmark.
///
/// Undefined when the benchmark is absent or its total is zero.
pub fn accuracy_overall(estimate: &Estimate, benchmark_key: &str) -> Option<f64> {
    estimate
        .benchmark(benchmark_key)
        .and_then(|b| ratio_pct(estimate.summary.total_cost, b.total))
}

/// Summary total divided by gross floor area.
pub fn cost_per_area(estimate: &Estimate) -> Option<f64> {
    per_area(
        estimate.summary.total_cost,
        estimate.project.gross_floor_area_sf,
    )
}

/// Index of the first section whose division set contains `division`.
pub fn section_assignment(sections: &[Section], division: &str) -> Option<usize> {
    sections.iter().position(|s| s.claims(division))
}

/// Line items belonging to the named section.
///
/// A line belongs to the first section that claims its division, so
/// overlapping sections never list the same line twice. Returns `None` when
/// no section has that name.
pub fn line_items_for_section<'a>(
    estimate: &'a Estimate,
    section_name: &str,
    order: LineOrder,
) -> Option<Vec<&'a LineItem>> {
    let index = estimate
        .sections
        .iter()
        .position(|s| s.name == section_name)?;

    let mut lines: Vec<&LineItem> = estimate
        .lines
        .iter()
        .filter(|l| section_assignment(&estimate.sections, &l.csi_division) == Some(index))
        .collect();

    sort_lines(&mut lines, order);
    Some(lines)
}

/// Line items whose division is claimed by no section, in document order.
pub fn unassigned_lines(estimate: &Estimate) -> Vec<&LineItem> {
    estimate
        .lines
        .iter()
        .filter(|l| section_assignment(&estimate.sections, &l.csi_division).is_none())
        .collect()
}

/// Divisions present in line items but claimed by no section.
pub fn unassigned_divisions(estimate: &Estimate) -> Vec<UnassignedDivision> {
    group_by_division(unassigned_lines(estimate))
        .into_iter()
        .map(|(division, total, line_count)| UnassignedDivision {
            division: division.to_string(),
            name: division_name(division),
            total,
            line_count,
        })
        .collect()
}

/// Sort a line-item listing in place. The sort is stable.
pub fn sort_lines(lines: &mut [&LineItem], order: LineOrder) {
    match order {
        LineOrder::Original => {}
        LineOrder::TotalDesc => lines.sort_by(|a, b| b.total_cost.total_cmp(&a.total_cost)),
    }
}

/// Group by division in first-appearance order: (division, total, count).
fn group_by_division<'a, I>(lines: I) -> Vec<(&'a str, f64, usize)>
where
    I: IntoIterator<Item = &'a LineItem>,
{
    let mut grouped: Vec<(&str, f64, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for line in lines {
        let division = line.csi_division.as_str();
        match index.get(division) {
            Some(&i) => {
                grouped[i].1 += line.total_cost;
                grouped[i].2 += 1;
            }
            None => {
                index.insert(division, grouped.len());
                grouped.push((division, line.total_cost, 1));
            }
        }
    }

    grouped
}

fn compare_row(
    label: &str,
    engine_total: f64,
    benchmark_total: Option<f64>,
    bands: &AccuracyBands,
    is_total: bool,
) -> SectionRow {
    let accuracy_pct = benchmark_total.and_then(|b| ratio_pct(engine_total, b));
    SectionRow {
        section: label.to_string(),
        engine_total,
        benchmark_total,
        variance: benchmark_total.map(|b| engine_total - b),
        accuracy_pct,
        tier: accuracy_pct.map(|pct| bands.classify(pct)),
        is_total,
    }
}

fn per_area(total: f64, area: f64) -> Option<f64> {
    if area > 0.0 {
        Some(total / area).filter(|v| v.is_finite())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Benchmark, EstimateSummary, ProjectInfo};

    fn create_test_line(total_cost: f64, division: &str, source: PricingSource) -> LineItem {
        LineItem {
            description: format!("Item in {}", division),
            quantity: 1.0,
            unit: "LS".to_string(),
            unit_cost: total_cost,
            total_cost,
            csi_division: division.to_string(),
            source,
            confidence: Confidence::Medium,
        }
    }

    fn create_test_section(name: &str, divisions: &[&str], engine: f64, pla: f64) -> Section {
        Section {
            name: name.to_string(),
            divisions: divisions.iter().map(|d| d.to_string()).collect(),
            engine,
            pla,
            stated_pct: None,
        }
    }

    fn create_test_estimate() -> Estimate {
        let lines = vec![
            create_test_line(400.0, "03", PricingSource::CostDb),
            create_test_line(250.0, "09", PricingSource::ParametricGapFill),
            create_test_line(600.0, "03", PricingSource::CostDbAssembly),
            create_test_line(150.0, "26", PricingSource::RateLibraryFallback),
            create_test_line(100.0, "31", PricingSource::CostDb),
            create_test_line(0.0, "09", PricingSource::SystemBreakoutFallback),
        ];

        Estimate {
            project: ProjectInfo {
                name: "Test Project".to_string(),
                location: None,
                building_type: None,
                gross_floor_area_sf: 100.0,
                units: None,
                estimate_class: None,
                accuracy_range: None,
            },
            summary: EstimateSummary {
                total_cost: 1500.0,
                cost_per_sf: None,
                line_count: None,
            },
            pricing_method: None,
            lines,
            sections: vec![
                create_test_section("Structure", &["03", "05"], 1000.0, 1100.0),
                create_test_section("Interiors", &["09"], 250.0, 200.0),
                // overlaps with Structure on 03
                create_test_section("MEP", &["26", "03"], 150.0, 0.0),
            ],
            division_totals: BTreeMap::new(),
            benchmarks: [(
                "pla".to_string(),
                Benchmark {
                    total: 1600.0,
                    area: Some(100.0),
                    note: None,
                },
            )]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_source_breakdown_drops_zero_and_sorts() {
        let lines = vec![
            create_test_line(100.0, "03", PricingSource::CostDb),
            create_test_line(50.0, "09", PricingSource::ParametricGapFill),
            create_test_line(0.0, "26", PricingSource::RateLibraryFallback),
        ];

        let breakdown = source_breakdown(&lines);

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].source, PricingSource::CostDb);
        assert_eq!(breakdown[0].total, 100.0);
        assert_eq!(breakdown[1].source, PricingSource::ParametricGapFill);
        assert_eq!(breakdown[1].total, 50.0);
    }

    #[test]
    fn test_source_breakdown_sums_to_line_total() {
        let estimate = create_test_estimate();
        let breakdown = source_breakdown(&estimate.lines);

        let sum: f64 = breakdown.iter().map(|s| s.total).sum();
        assert!((sum - estimate.line_total()).abs() < 1e-9);

        let share_sum: f64 = breakdown.iter().filter_map(|s| s.share_pct).sum();
        assert!((share_sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_source_breakdown_empty() {
        let breakdown = source_breakdown(&Vec::<LineItem>::new());
        assert!(breakdown.is_empty());
    }

    #[test]
    fn test_confidence_breakdown_counts_every_line() {
        let mut lines = create_test_estimate().lines;
        lines[0].confidence = Confidence::High;
        lines[1].confidence = Confidence::High;

        let counts = confidence_breakdown(&lines);

        assert_eq!(counts.values().sum::<usize>(), lines.len());
        assert_eq!(counts.get(&Confidence::High), Some(&2));
        assert_eq!(counts.get(&Confidence::Medium), Some(&4));
        // absent, not zero-filled
        assert_eq!(counts.get(&Confidence::Low), None);
        assert_eq!(confidence_pct(&counts, Confidence::Low), Some(0.0));
    }

    #[test]
    fn test_confidence_pct_empty() {
        let counts = BTreeMap::new();
        assert_eq!(confidence_pct(&counts, Confidence::High), None);
    }

    #[test]
    fn test_division_breakdown() {
        let estimate = create_test_estimate();
        let divisions = division_breakdown(&estimate);

        let codes: Vec<&str> = divisions.iter().map(|d| d.division.as_str()).collect();
        assert_eq!(codes, vec!["03", "09", "26", "31"]);

        assert_eq!(divisions[0].name, "Concrete");
        assert_eq!(divisions[0].total, 1000.0);
        assert_eq!(divisions[0].cost_per_area, Some(10.0));
        assert_eq!(divisions[1].share_pct, Some(250.0 / 1500.0 * 100.0));
    }

    #[test]
    fn test_division_breakdown_zero_area() {
        let mut estimate = create_test_estimate();
        estimate.project.gross_floor_area_sf = 0.0;

        let divisions = division_breakdown(&estimate);

        assert!(!divisions.is_empty());
        assert!(divisions.iter().all(|d| d.cost_per_area.is_none()));
        assert_eq!(cost_per_area(&estimate), None);
    }

    #[test]
    fn test_division_breakdown_never_yields_infinite_ratios() {
        let mut estimate = create_test_estimate();
        estimate.project.gross_floor_area_sf = 1e-310;
        estimate.summary.total_cost = 1e-310;

        let divisions = division_breakdown(&estimate);

        assert!(!divisions.is_empty());
        for division in &divisions {
            assert!(division.total.is_finite());
            assert_eq!(division.cost_per_area, None);
            assert_eq!(division.share_pct, None);
        }
        assert_eq!(cost_per_area(&estimate), Some(1.0));
    }

    #[test]
    fn test_division_breakdown_zero_summary_total() {
        let mut estimate = create_test_estimate();
        estimate.summary.total_cost = 0.0;

        let divisions = division_breakdown(&estimate);
        assert!(divisions.iter().all(|d| d.share_pct.is_none()));
    }

    #[test]
    fn test_recompute_division_totals_keeps_zero() {
        let lines = vec![create_test_line(0.0, "14", PricingSource::CostDb)];
        let totals = recompute_division_totals(&lines);
        assert_eq!(totals.get("14"), Some(&0.0));
    }

    #[test]
    fn test_section_comparison_scenario() {
        let mut estimate = create_test_estimate();
        estimate.sections = vec![create_test_section("Shell", &["07"], 950_000.0, 1_000_000.0)];

        let rows = section_comparison(&estimate, "pla", &AccuracyBands::default());

        assert_eq!(rows[0].accuracy_pct, Some(95.0));
        assert_eq!(rows[0].tier, Some(AccuracyTier::OnTarget));
        assert_eq!(rows[0].variance, Some(-50_000.0));
    }

    #[test]
    fn test_section_comparison_order_and_total_row() {
        let estimate = create_test_estimate();
        let rows = section_comparison(&estimate, "pla", &AccuracyBands::default());

        let names: Vec<&str> = rows.iter().map(|r| r.section.as_str()).collect();
        assert_eq!(names, vec!["Structure", "Interiors", "MEP", "TOTAL"]);

        // 250 / 200 = 125%
        assert_eq!(rows[1].tier, Some(AccuracyTier::Acceptable));
        // zero benchmark
        assert_eq!(rows[2].accuracy_pct, None);
        assert_eq!(rows[2].tier, None);

        let total = rows.last().unwrap();
        assert!(total.is_total);
        assert_eq!(total.engine_total, 1500.0);
        assert_eq!(total.benchmark_total, Some(1600.0));
        assert_eq!(total.accuracy_pct, Some(93.75));
    }

    #[test]
    fn test_section_comparison_missing_benchmark() {
        let estimate = create_test_estimate();
        let rows = section_comparison(&estimate, "hanscomb", &AccuracyBands::default());

        let total = rows.last().unwrap();
        assert_eq!(total.benchmark_total, None);
        assert_eq!(total.variance, None);
        assert_eq!(total.tier, None);
    }

    #[test]
    fn test_accuracy_bands_edges() {
        let bands = AccuracyBands::default();
        assert_eq!(bands.classify(90.0), AccuracyTier::OnTarget);
        assert_eq!(bands.classify(110.0), AccuracyTier::OnTarget);
        assert_eq!(bands.classify(89.99), AccuracyTier::Acceptable);
        assert_eq!(bands.classify(80.0), AccuracyTier::Acceptable);
        assert_eq!(bands.classify(110.01), AccuracyTier::Acceptable);
        assert_eq!(bands.classify(130.0), AccuracyTier::Acceptable);
        assert_eq!(bands.classify(79.9), AccuracyTier::OffTarget);
        assert_eq!(bands.classify(130.1), AccuracyTier::OffTarget);
    }

    #[test]
    fn test_line_items_for_section_first_claim_wins() {
        let estimate = create_test_estimate();

        let structure =
            line_items_for_section(&estimate, "Structure", LineOrder::TotalDesc).unwrap();
        let totals: Vec<f64> = structure.iter().map(|l| l.total_cost).collect();
        assert_eq!(totals, vec![600.0, 400.0]);

        let mep = line_items_for_section(&estimate, "MEP", LineOrder::Original).unwrap();
        assert_eq!(mep.len(), 1);
        assert_eq!(mep[0].csi_division, "26");

        assert!(line_items_for_section(&estimate, "Sitework", LineOrder::Original).is_none());
    }

    #[test]
    fn test_sections_partition_lines() {
        let estimate = create_test_estimate();

        let mut seen: Vec<*const LineItem> = Vec::new();
        for section in &estimate.sections {
            let lines = line_items_for_section(&estimate, &section.name, LineOrder::Original)
                .unwrap();
            seen.extend(lines.into_iter().map(|l| l as *const LineItem));
        }
        seen.extend(
            unassigned_lines(&estimate)
                .into_iter()
                .map(|l| l as *const LineItem),
        );

        assert_eq!(seen.len(), estimate.lines.len());
        for line in &estimate.lines {
            let count = seen.iter().filter(|&&p| p == line as *const LineItem).count();
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn test_unassigned_divisions() {
        let estimate = create_test_estimate();
        let unassigned = unassigned_divisions(&estimate);

        assert_eq!(unassigned.len(), 1);
        assert_eq!(unassigned[0].division, "31");
        assert_eq!(unassigned[0].name, "Earthwork");
        assert_eq!(unassigned[0].total, 100.0);
        assert_eq!(unassigned[0].line_count, 1);
    }

    #[test]
    fn test_accuracy_overall() {
        let estimate = create_test_estimate();
        assert_eq!(accuracy_overall(&estimate, "pla"), Some(93.75));
        assert_eq!(accuracy_overall(&estimate, "engine"), None);

        let mut estimate = estimate;
        estimate.benchmarks.get_mut("pla").unwrap().total = 0.0;
        assert_eq!(accuracy_overall(&estimate, "pla"), None);
    }

    #[test]
    fn test_benchmark_comparison() {
        let estimate = create_test_estimate();
        let rows = benchmark_comparison(&estimate, &AccuracyBands::default());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "pla");
        assert_eq!(rows[0].variance, -100.0);
        assert_eq!(rows[0].cost_per_area, Some(16.0));
        assert_eq!(rows[0].tier, Some(AccuracyTier::OnTarget));
    }

    #[test]
    fn test_sort_lines_is_stable() {
        let lines = vec![
            create_test_line(10.0, "03", PricingSource::CostDb),
            create_test_line(20.0, "05", PricingSource::CostDb),
            create_test_line(10.0, "09", PricingSource::CostDb),
        ];
        let mut refs: Vec<&LineItem> = lines.iter().collect();

        sort_lines(&mut refs, LineOrder::TotalDesc);

        let divisions: Vec<&str> = refs.iter().map(|l| l.csi_division.as_str()).collect();
        assert_eq!(divisions, vec!["05", "03", "09"]);
    }
}
