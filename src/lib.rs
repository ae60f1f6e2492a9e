//! Costview - aggregation and benchmark comparison for construction cost
//! estimates.
//!
//! An estimate document (project, summary, priced line items, sections and
//! benchmarks) is loaded and validated by [`loader`], summarized by
//! [`analysis`] and rendered by [`report`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod csi;
pub mod error;
pub mod loader;
pub mod models;
pub mod report;
