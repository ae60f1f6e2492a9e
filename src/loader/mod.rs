//! Loading and validating estimate documents.
//!
//! The document is read as untyped JSON and checked field by field, so a
//! malformed document is rejected as a whole with a [`ValidationError`]
//! naming the first offending field. Nothing downstream ever sees a
//! partially valid estimate.

mod fields;

use crate::csi::is_division_code;
use crate::error::{LoadError, ValidationError};
use crate::models::{
    Benchmark, Estimate, EstimateSummary, LineItem, PricingMethod, ProjectInfo, Section,
};
use fields::{index_path, key_path, number_value, string_value, Fields};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Read and validate an estimate document from disk.
pub fn load_estimate<P: AsRef<Path>>(path: P) -> Result<Estimate, LoadError> {
    let path_ref = path.as_ref();
    let content = std::fs::read_to_string(path_ref).map_err(|source| LoadError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;

    debug!("Read {} bytes from {}", content.len(), path_ref.display());
    parse_estimate(&content)
}

/// Parse and validate an estimate document from a JSON string.
pub fn parse_estimate(content: &str) -> Result<Estimate, LoadError> {
    let value: Value = serde_json::from_str(content)?;
    Ok(estimate_from_value(&value)?)
}

/// Validate an already-parsed JSON value into an [`Estimate`].
pub fn estimate_from_value(value: &Value) -> Result<Estimate, ValidationError> {
    let root = Fields::new(value, "")?;

    let project = parse_project(&root.object("project")?)?;
    let summary = parse_summary(&root.object("summary")?)?;
    let pricing_method = root
        .opt_object("pricing_method")?
        .map(|f| parse_pricing_method(&f))
        .transpose()?;

    let (line_values, lines_path) = root.array("lines")?;
    let lines = line_values
        .iter()
        .enumerate()
        .map(|(i, v)| parse_line(&Fields::new(v, index_path(&lines_path, i))?))
        .collect::<Result<Vec<_>, _>>()?;

    let (section_values, sections_path) = root.array("sections")?;
    let sections = section_values
        .iter()
        .enumerate()
        .map(|(i, v)| parse_section(&Fields::new(v, index_path(&sections_path, i))?))
        .collect::<Result<Vec<_>, _>>()?;

    check_line_sum(&lines, &lines_path)?;
    check_unique_section_names(&sections, &sections_path)?;

    let mut division_totals = BTreeMap::new();
    if let Some((map, path)) = root.opt_map_any(&["division_totals", "divisionTotals"])? {
        for (code, total) in map {
            let entry_path = key_path(&path, code);
            if !is_division_code(code) {
                return Err(ValidationError::new(
                    entry_path,
                    "division code must be two digits",
                ));
            }
            let total = number_value(total, &entry_path)?;
            division_totals.insert(code.clone(), total);
        }
    }

    let mut benchmarks = BTreeMap::new();
    if let Some((map, path)) = root.opt_map_any(&["benchmarks"])? {
        for (name, entry) in map {
            let fields = Fields::new(entry, key_path(&path, name))?;
            benchmarks.insert(name.clone(), parse_benchmark(&fields)?);
        }
    }

    debug!(
        "Validated estimate: {} lines, {} sections, {} benchmarks",
        lines.len(),
        sections.len(),
        benchmarks.len()
    );

    Ok(Estimate {
        project,
        summary,
        pricing_method,
        lines,
        sections,
        division_totals,
        benchmarks,
    })
}

fn parse_project(fields: &Fields<'_>) -> Result<ProjectInfo, ValidationError> {
    Ok(ProjectInfo {
        name: fields.str("name")?,
        location: fields.opt_str("location")?,
        building_type: fields.opt_str("building_type")?,
        gross_floor_area_sf: fields.non_negative("gross_floor_area_sf")?,
        units: fields.opt_count("units")?,
        estimate_class: fields.opt_str("estimate_class")?,
        accuracy_range: fields.opt_str("accuracy_range")?,
    })
}

fn parse_summary(fields: &Fields<'_>) -> Result<EstimateSummary, ValidationError> {
    Ok(EstimateSummary {
        total_cost: fields.non_negative("total_cost")?,
        cost_per_sf: fields.opt_non_negative("cost_per_sf")?,
        line_count: fields.opt_count("line_count")?,
    })
}

fn parse_pricing_method(fields: &Fields<'_>) -> Result<PricingMethod, ValidationError> {
    Ok(PricingMethod {
        match_rate: fields.opt_non_negative("match_rate")?,
        parametric_pct: fields.opt_non_negative("parametric_pct")?,
        rate_library_pct: fields.opt_non_negative("rate_library_pct")?,
    })
}

fn parse_line(fields: &Fields<'_>) -> Result<LineItem, ValidationError> {
    Ok(LineItem {
        description: fields.str("description")?,
        quantity: fields.non_negative("quantity")?,
        unit: fields.str("unit")?,
        unit_cost: fields.non_negative("unit_cost")?,
        total_cost: fields.non_negative("total_cost")?,
        csi_division: division_code(fields, "csi_division")?,
        source: fields.parse("source")?,
        confidence: fields.parse("confidence")?,
    })
}

fn parse_section(fields: &Fields<'_>) -> Result<Section, ValidationError> {
    let (values, path) = fields.array("divisions")?;
    let divisions = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let item_path = index_path(&path, i);
            let code = string_value(v, &item_path)?;
            if is_division_code(&code) {
                Ok(code)
            } else {
                Err(ValidationError::new(item_path, "division code must be two digits"))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Section {
        name: fields.str("name")?,
        divisions,
        engine: fields.non_negative("engine")?,
        pla: fields.non_negative("pla")?,
        stated_pct: fields.opt_number("pct")?,
    })
}

fn parse_benchmark(fields: &Fields<'_>) -> Result<Benchmark, ValidationError> {
    Ok(Benchmark {
        total: fields.non_negative("total")?,
        area: fields.opt_non_negative("area")?,
        note: fields.opt_str("note")?,
    })
}

/// Line totals are non-negative, so a finite grand total bounds every
/// per-division and per-source sum as well.
fn check_line_sum(lines: &[LineItem], path: &str) -> Result<(), ValidationError> {
    let total: f64 = lines.iter().map(|l| l.total_cost).sum();
    if total.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new(
            path,
            "sum of total_cost exceeds the representable range",
        ))
    }
}

fn check_unique_section_names(sections: &[Section], path: &str) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for (i, section) in sections.iter().enumerate() {
        if !seen.insert(section.name.as_str()) {
            return Err(ValidationError::new(
                format!("{}.name", index_path(path, i)),
                format!("duplicate section name '{}'", section.name),
            ));
        }
    }
    Ok(())
}

fn division_code(fields: &Fields<'_>, key: &str) -> Result<String, ValidationError> {
    let code = fields.str(key)?;
    if is_division_code(&code) {
        Ok(code)
    } else {
        Err(ValidationError::new(
            fields.child(key),
            format!("division code must be two digits, got '{}'", code),
        ))
    }
}
