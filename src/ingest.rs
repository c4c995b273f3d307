use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::detect::{detect_format, Format};
use crate::document::CoverageDocument;
use crate::error::{CovnormError, Result};
use crate::preprocess::{preprocessor_for, PreprocessStats, SourceContext};

/// One report after preprocessing.
#[derive(Debug)]
pub struct PreprocessedReport {
    pub path: PathBuf,
    pub format: Format,
    pub document: CoverageDocument,
    pub stats: PreprocessStats,
}

/// Read a report, detect its schema (or use the override), parse it and
/// run the schema's preprocessor on it.
pub fn preprocess_report(
    file_path: &Path,
    format_override: Option<&str>,
    context: &SourceContext,
) -> Result<PreprocessedReport> {
    let content = std::fs::read(file_path)?;

    let format = if let Some(fmt_str) = format_override {
        fmt_str.parse::<Format>()?
    } else {
        detect_format(file_path, &content).ok_or(CovnormError::UnknownFormat)?
    };

    let mut document = CoverageDocument::parse(&content)?;
    let stats = preprocessor_for(format, context).preprocess(&mut document);
    info!(
        "Preprocessed {} as {}: {} of {} members synthesized, {} startup classes reattached, {} paths resolved",
        file_path.display(),
        format,
        stats.synthesized,
        stats.synthesis_candidates,
        stats.reattached,
        stats.resolved_paths
    );

    Ok(PreprocessedReport {
        path: file_path.to_path_buf(),
        format,
        document,
        stats,
    })
}

/// Outcome of preprocessing several reports.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub reports: Vec<PreprocessedReport>,
    /// Reports that could not be processed, with the reason.
    pub failures: Vec<(PathBuf, CovnormError)>,
}

impl BatchResult {
    pub fn stats(&self) -> PreprocessStats {
        let mut total = PreprocessStats::default();
        for report in &self.reports {
            total.add(report.stats);
        }
        total
    }
}

/// Preprocess every report in order. A report that fails is logged and
/// skipped; the others are still processed.
pub fn preprocess_files(
    files: &[PathBuf],
    format_override: Option<&str>,
    context: &SourceContext,
) -> BatchResult {
    let mut result = BatchResult::default();
    for file in files {
        match preprocess_report(file, format_override, context) {
            Ok(report) => result.reports.push(report),
            Err(e) => {
                warn!("Skipping {}: {}", file.display(), e);
                result.failures.push((file.clone(), e));
            }
        }
    }
    result
}
