//! Canonical coverage model shared by every report format.
//!
//! Preprocessed reports are turned into [`Assembly`] / [`Class`] /
//! [`CodeFile`] records; records describing the same code are merged into
//! one aggregate. All counters are derived from line and branch data, so
//! they are correct after any sequence of merges.

mod class;
mod codefile;
mod metric;

use serde::Serialize;

pub use class::{merge_assemblies, Assembly, Class, CoverageType};
pub use codefile::{
    Branch, CodeFile, CoverageByTestMethod, LineVisitStatus, TestMethod, NOT_COVERABLE,
};
pub use metric::{
    CodeElement, CodeElementType, MethodMetric, Metric, MetricMergeOrder, MetricType,
    CRAP_SCORE, CYCLOMATIC_COMPLEXITY, NPATH_COMPLEXITY,
};

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// Percentage truncated (not rounded) to one decimal place, `None` when
/// there is nothing to cover.
#[must_use]
pub fn quota(covered: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some((1000.0 * covered as f64 / total as f64).trunc() / 10.0)
    }
}

/// Totals across a set of merged assemblies.
#[derive(Debug, Default, Serialize)]
pub struct CoverageSummary {
    pub assemblies: u64,
    pub classes: u64,
    pub files: u64,
    pub coverable_lines: u64,
    pub covered_lines: u64,
    pub total_branches: u64,
    pub covered_branches: u64,
    pub total_code_elements: u64,
    pub covered_code_elements: u64,
}

impl CoverageSummary {
    pub fn of(assemblies: &[Assembly]) -> Self {
        let mut summary = Self {
            assemblies: assemblies.len() as u64,
            ..Default::default()
        };
        for assembly in assemblies {
            summary.coverable_lines += assembly.coverable_lines() as u64;
            summary.covered_lines += assembly.covered_lines() as u64;
            summary.total_branches += assembly.total_branches().unwrap_or(0) as u64;
            summary.covered_branches += assembly.covered_branches().unwrap_or(0) as u64;
            summary.total_code_elements += assembly.total_code_elements() as u64;
            summary.covered_code_elements += assembly.covered_code_elements() as u64;
            for class in assembly.classes() {
                summary.classes += 1;
                summary.files += class.files().len() as u64;
            }
        }
        summary
    }

    #[must_use]
    pub fn line_rate(&self) -> f64 {
        rate(self.covered_lines, self.coverable_lines)
    }

    #[must_use]
    pub fn branch_rate(&self) -> f64 {
        rate(self.covered_branches, self.total_branches)
    }

    #[must_use]
    pub fn code_element_rate(&self) -> f64 {
        rate(self.covered_code_elements, self.total_code_elements)
    }
}
