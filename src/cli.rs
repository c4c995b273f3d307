//! Command handler functions for the covnorm CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::collections::HashSet;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::detect::detect_format;
use crate::hotspots::{analyze, validate_maximums, RiskHotspotThresholds};
use crate::index::ClassLookup;
use crate::ingest::preprocess_files;
use crate::model::{merge_assemblies, Assembly, CoverageSummary};
use crate::preprocess::SourceContext;

pub fn cmd_detect(file: &Path) -> Result<String> {
    let content =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    Ok(match detect_format(file, &content) {
        Some(format) => format!("{}\n", format),
        None => "unknown\n".to_string(),
    })
}

/// Preprocess reports and write the repaired documents, under their file
/// names, into `output_dir`.
pub fn cmd_preprocess(
    files: &[PathBuf],
    format: Option<&str>,
    output_dir: &Path,
    context: &SourceContext,
) -> Result<String> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let batch = preprocess_files(files, format, context);
    let mut out = String::new();
    let mut used_names = HashSet::new();
    for report in &batch.reports {
        let file_name = report
            .path
            .file_name()
            .with_context(|| format!("{} has no file name", report.path.display()))?;
        let target = output_dir.join(unique_file_name(Path::new(file_name), &mut used_names));
        let xml = report.document.to_xml()?;
        std::fs::write(&target, xml)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        writeln!(
            out,
            "{} ({}) → {}: {}/{} synthesized, {} reattached, {} resolved",
            report.path.display(),
            report.format,
            target.display(),
            report.stats.synthesized,
            report.stats.synthesis_candidates,
            report.stats.reattached,
            report.stats.resolved_paths
        )
        .unwrap();
    }
    for (path, error) in &batch.failures {
        writeln!(out, "{}: skipped ({})", path.display(), error).unwrap();
    }
    Ok(out)
}

/// `file_name`, or `stem-N.ext` with the smallest free `N >= 2` when an
/// earlier report of the same run already took the name.
fn unique_file_name(file_name: &Path, used: &mut HashSet<String>) -> String {
    let plain = file_name.to_string_lossy().into_owned();
    if used.insert(plain.to_lowercase()) {
        return plain;
    }

    let stem = file_name.file_stem().unwrap_or_default().to_string_lossy();
    let extension = file_name
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}{}", stem, n, extension);
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

/// Source files declaring `class_name` below the source directories.
pub fn cmd_find_class(class_name: &str, context: &SourceContext) -> Result<String> {
    if context.source_dirs().is_empty() {
        anyhow::bail!("No source directories given (use --source-dir)");
    }
    let files = context.global_index().files_of_class(class_name);
    if files.is_empty() {
        return Ok(format!("No source file declares '{}'\n", class_name));
    }
    let mut out = String::new();
    for file in &files {
        writeln!(out, "{}", file.display()).unwrap();
    }
    Ok(out)
}

fn read_assemblies(path: &Path) -> Result<Vec<Assembly>> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&content)
        .with_context(|| format!("Invalid coverage data in {}", path.display()))
}

/// Merge the assemblies of several JSON coverage files, optionally writing
/// the result, and summarize it.
pub fn cmd_merge(inputs: &[PathBuf], output: Option<&Path>) -> Result<String> {
    let mut all = Vec::new();
    for input in inputs {
        all.extend(read_assemblies(input)?);
    }
    let merged = merge_assemblies(all);

    if let Some(output) = output {
        let json = serde_json::to_vec_pretty(&merged)?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    let summary = CoverageSummary::of(&merged);
    let mut out = String::new();
    writeln!(out, "Assemblies: {}", summary.assemblies).unwrap();
    writeln!(out, "Classes:    {}", summary.classes).unwrap();
    writeln!(out, "Files:      {}", summary.files).unwrap();
    writeln!(
        out,
        "Lines:      {}/{} ({:.1}%)",
        summary.covered_lines,
        summary.coverable_lines,
        summary.line_rate() * 100.0
    )
    .unwrap();
    if summary.total_branches > 0 {
        writeln!(
            out,
            "Branches:   {}/{} ({:.1}%)",
            summary.covered_branches,
            summary.total_branches,
            summary.branch_rate() * 100.0
        )
        .unwrap();
    }
    if summary.total_code_elements > 0 {
        writeln!(
            out,
            "Methods:    {}/{} ({:.1}%)",
            summary.covered_code_elements,
            summary.total_code_elements,
            summary.code_element_rate() * 100.0
        )
        .unwrap();
    }
    Ok(out)
}

/// List risk hotspots of a JSON coverage file. Fails when a maximum
/// threshold is exceeded.
pub fn cmd_hotspots(input: &Path, thresholds: &RiskHotspotThresholds) -> Result<String> {
    let assemblies = read_assemblies(input)?;
    let analysis = analyze(&assemblies, thresholds);

    let mut out = String::new();
    if !analysis.code_quality_metrics_available {
        writeln!(out, "No code quality metrics available.").unwrap();
        return Ok(out);
    }
    if analysis.hotspots.is_empty() {
        writeln!(out, "No risk hotspots found.").unwrap();
    } else {
        writeln!(out, "{:<20} {:<30} {:<40} METRICS", "ASSEMBLY", "CLASS", "METHOD").unwrap();
        writeln!(out, "{}", "-".repeat(110)).unwrap();
        for hotspot in &analysis.hotspots {
            let metrics: Vec<String> = hotspot
                .status_metrics
                .iter()
                .filter_map(|s| {
                    let value = s.metric.value?;
                    let marker = if s.exceeded { "!" } else { "" };
                    Some(format!("{}={}{}", s.metric.name, value, marker))
                })
                .collect();
            writeln!(
                out,
                "{:<20} {:<30} {:<40} {}",
                hotspot.assembly.short_name(),
                hotspot.class.name,
                hotspot.method_metric.short_name,
                metrics.join(", ")
            )
            .unwrap();
        }
    }

    validate_maximums(&analysis, thresholds)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_file_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_file_name(Path::new("coverage.xml"), &mut used), "coverage.xml");
        assert_eq!(unique_file_name(Path::new("coverage.xml"), &mut used), "coverage-2.xml");
        assert_eq!(unique_file_name(Path::new("Coverage.XML"), &mut used), "Coverage-3.XML");
        assert_eq!(unique_file_name(Path::new("report"), &mut used), "report");
        assert_eq!(unique_file_name(Path::new("report"), &mut used), "report-2");
    }
}
