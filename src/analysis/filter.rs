//! Search and filter over line items.

use crate::csi::is_division_code;
use crate::error::ValidationError;
use crate::models::{LineItem, PricingSource};

/// Value that disables a division or source constraint.
pub const MATCH_ALL: &str = "all";

/// Conjunctive predicate over line items.
///
/// The search text is stored lowercased so matching does not re-normalize
/// the needle for every line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineFilter {
    search: Option<String>,
    division: Option<String>,
    source: Option<PricingSource>,
}

impl LineFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from raw parameters as a caller would supply them.
    ///
    /// Empty values and `"all"` mean "no constraint".
    pub fn from_params(
        search: Option<&str>,
        division: Option<&str>,
        source: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let mut filter = Self::new();

        if let Some(text) = search {
            filter = filter.with_search(text);
        }

        if let Some(code) = division.map(str::trim).filter(|d| is_constraint(d)) {
            if !is_division_code(code) {
                return Err(ValidationError::new(
                    "filter.division",
                    format!("division code must be two digits, got '{}'", code),
                ));
            }
            filter = filter.with_division(code);
        }

        if let Some(name) = source.map(str::trim).filter(|s| is_constraint(s)) {
            let parsed = name
                .parse::<PricingSource>()
                .map_err(|reason| ValidationError::new("filter.source", reason))?;
            filter = filter.with_source(parsed);
        }

        Ok(filter)
    }

    /// Blank text clears the search; otherwise the text is matched as given.
    pub fn with_search(mut self, text: &str) -> Self {
        self.search = if text.trim().is_empty() {
            None
        } else {
            Some(text.to_lowercase())
        };
        self
    }

    /// An empty code or `"all"` clears the division constraint.
    pub fn with_division(mut self, division: &str) -> Self {
        let division = division.trim();
        self.division = is_constraint(division).then(|| division.to_string());
        self
    }

    pub fn with_source(mut self, source: PricingSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn division(&self) -> Option<&str> {
        self.division.as_deref()
    }

    pub fn source(&self) -> Option<PricingSource> {
        self.source
    }

    /// Whether the filter accepts every line.
    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.division.is_none() && self.source.is_none()
    }

    pub fn matches(&self, line: &LineItem) -> bool {
        if let Some(ref division) = self.division {
            if line.csi_division != *division {
                return false;
            }
        }

        if let Some(source) = self.source {
            if line.source != source {
                return false;
            }
        }

        match self.search {
            Some(ref needle) => contains_ignore_case(&line.description, needle),
            None => true,
        }
    }

    /// Short human-readable form, e.g. `search="slab", division=03`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();

        if let Some(ref search) = self.search {
            parts.push(format!("search=\"{}\"", search));
        }
        if let Some(ref division) = self.division {
            parts.push(format!("division={}", division));
        }
        if let Some(source) = self.source {
            parts.push(format!("source={}", source));
        }

        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Keep the lines matching `filter`, preserving their order.
///
/// Accepts any borrowed sequence of lines, so a filtered result can be
/// filtered again.
pub fn filter_lines<'a, I>(lines: I, filter: &LineFilter) -> Vec<&'a LineItem>
where
    I: IntoIterator<Item = &'a LineItem>,
{
    lines.into_iter().filter(|l| filter.matches(l)).collect()
}

fn is_constraint(value: &str) -> bool {
    !value.is_empty() && !value.eq_ignore_ascii_case(MATCH_ALL)
}

/// Case-insensitive substring test; `needle` must already be lowercase.
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }

    if haystack.is_ascii() && needle.is_ascii() {
        let needle = needle.as_bytes();
        haystack
            .as_bytes()
            .windows(needle.len())
            .any(|window| window.eq_ignore_ascii_case(needle))
    } else {
        haystack.to_lowercase().contains(needle)
    }
}
