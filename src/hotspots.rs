//! Risk hotspots: methods whose code quality metrics exceed a threshold.
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::{CovnormError, Result};
use crate::model::{
    Assembly, Class, MethodMetric, Metric, MetricType, CRAP_SCORE, CYCLOMATIC_COMPLEXITY,
    NPATH_COMPLEXITY,
};

/// Thresholds above which a metric value marks a hotspot, and optional
/// maximums that fail the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskHotspotThresholds {
    pub cyclomatic_complexity: f64,
    pub crap_score: f64,
    pub npath_complexity: f64,
    pub maximum_cyclomatic_complexity: Option<f64>,
    pub maximum_crap_score: Option<f64>,
    pub maximum_npath_complexity: Option<f64>,
}

impl Default for RiskHotspotThresholds {
    fn default() -> Self {
        Self {
            cyclomatic_complexity: 15.0,
            crap_score: 30.0,
            npath_complexity: 200.0,
            maximum_cyclomatic_complexity: None,
            maximum_crap_score: None,
            maximum_npath_complexity: None,
        }
    }
}

impl RiskHotspotThresholds {
    fn threshold(&self, metric_name: &str) -> Option<f64> {
        match metric_name {
            CYCLOMATIC_COMPLEXITY => Some(self.cyclomatic_complexity),
            CRAP_SCORE => Some(self.crap_score),
            NPATH_COMPLEXITY => Some(self.npath_complexity),
            _ => None,
        }
    }

    fn maximum(&self, metric_name: &str) -> Option<f64> {
        match metric_name {
            CYCLOMATIC_COMPLEXITY => self.maximum_cyclomatic_complexity,
            CRAP_SCORE => self.maximum_crap_score,
            NPATH_COMPLEXITY => self.maximum_npath_complexity,
            _ => None,
        }
    }

    fn has_maximums(&self) -> bool {
        self.maximum_cyclomatic_complexity.is_some()
            || self.maximum_crap_score.is_some()
            || self.maximum_npath_complexity.is_some()
    }
}

/// A code quality metric and whether it exceeds its threshold.
#[derive(Debug, Clone, Copy)]
pub struct MetricStatus<'a> {
    pub metric: &'a Metric,
    pub exceeded: bool,
}

#[derive(Debug, Clone)]
pub struct RiskHotspot<'a> {
    pub assembly: &'a Assembly,
    pub class: &'a Class,
    pub method_metric: &'a MethodMetric,
    pub status_metrics: Vec<MetricStatus<'a>>,
    /// Index of the file in the class's path-sorted file list.
    pub file_index: usize,
}

impl RiskHotspot<'_> {
    /// Highest value among the exceeded metrics.
    pub fn max_exceeded_value(&self) -> f64 {
        self.status_metrics
            .iter()
            .filter(|s| s.exceeded)
            .filter_map(|s| s.metric.value)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[derive(Debug, Clone)]
pub struct RiskHotspotAnalysis<'a> {
    /// Hotspots, highest exceeded value first.
    pub hotspots: Vec<RiskHotspot<'a>>,
    /// Whether any method carried a code quality metric at all.
    pub code_quality_metrics_available: bool,
}

pub fn analyze<'a>(
    assemblies: &'a [Assembly],
    thresholds: &RiskHotspotThresholds,
) -> RiskHotspotAnalysis<'a> {
    let mut hotspots = Vec::new();
    let mut code_quality_metrics_available = false;

    for assembly in assemblies {
        for class in assembly.classes() {
            for (file_index, file) in class.files().into_iter().enumerate() {
                for method_metric in file.method_metrics() {
                    let status_metrics: Vec<MetricStatus> = method_metric
                        .metrics()
                        .iter()
                        .filter(|m| m.metric_type == MetricType::CodeQuality)
                        .map(|metric| MetricStatus {
                            metric,
                            exceeded: match (thresholds.threshold(&metric.name), metric.value) {
                                (Some(threshold), Some(value)) => value > threshold,
                                _ => false,
                            },
                        })
                        .collect();

                    code_quality_metrics_available |= !status_metrics.is_empty();
                    if status_metrics.iter().any(|s| s.exceeded) {
                        hotspots.push(RiskHotspot {
                            assembly,
                            class,
                            method_metric,
                            status_metrics,
                            file_index,
                        });
                    }
                }
            }
        }
    }

    hotspots.sort_by(|a, b| b.max_exceeded_value().total_cmp(&a.max_exceeded_value()));
    RiskHotspotAnalysis {
        hotspots,
        code_quality_metrics_available,
    }
}

/// Fail with one line per hotspot metric above its configured maximum.
pub fn validate_maximums(
    analysis: &RiskHotspotAnalysis,
    thresholds: &RiskHotspotThresholds,
) -> Result<()> {
    if !thresholds.has_maximums() {
        return Ok(());
    }

    let mut errors = String::new();
    for hotspot in &analysis.hotspots {
        for status in &hotspot.status_metrics {
            let (Some(maximum), Some(value)) =
                (thresholds.maximum(&status.metric.name), status.metric.value)
            else {
                continue;
            };
            if value > maximum {
                if !errors.is_empty() {
                    errors.push('\n');
                }
                write!(
                    errors,
                    "{} of {}/{}/{}: {} exceeds the maximum of {}",
                    status.metric.name,
                    hotspot.assembly.name,
                    hotspot.class.name,
                    hotspot.method_metric.full_name,
                    value,
                    maximum
                )
                .unwrap();
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CovnormError::RiskHotspotThreshold(errors))
    }
}
