//! Analysis over a validated estimate.
//!
//! `aggregator` derives the summary views, `filter` narrows line-item
//! listings, and `checks` recomputes the document's stated figures.

pub mod aggregator;
pub mod checks;
pub mod filter;

pub use aggregator::*;
pub use checks::{run_checks, CheckKind, CheckSummary, Finding, FindingSeverity, Tolerances};
pub use filter::{filter_lines, LineFilter};
