use serde::{Deserialize, Serialize};

/// Name of the cyclomatic complexity metric.
pub const CYCLOMATIC_COMPLEXITY: &str = "Cyclomatic complexity";
/// Name of the NPath complexity metric.
pub const NPATH_COMPLEXITY: &str = "NPath complexity";
/// Name of the CRAP score metric.
pub const CRAP_SCORE: &str = "CRAP Score";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    CoverageAbsolute,
    CoveragePercentual,
    CodeQuality,
}

/// How two values of the same metric combine when reports are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricMergeOrder {
    #[default]
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_url: Option<String>,
    pub metric_type: MetricType,
    #[serde(default)]
    pub merge_order: MetricMergeOrder,
    pub value: Option<f64>,
}

impl Metric {
    pub fn new(
        name: &str,
        metric_type: MetricType,
        merge_order: MetricMergeOrder,
        value: Option<f64>,
    ) -> Self {
        Self {
            name: name.to_string(),
            explanation_url: None,
            metric_type,
            merge_order,
            value,
        }
    }

    /// A code quality metric where lower values are better.
    pub fn code_quality(name: &str, value: Option<f64>) -> Self {
        Self::new(name, MetricType::CodeQuality, MetricMergeOrder::LowerIsBetter, value)
    }

    /// A missing value takes the other one, two values combine by merge order.
    fn merge(&mut self, other: &Metric) {
        self.value = match (self.value, other.value) {
            (Some(a), Some(b)) => Some(match other.merge_order {
                MetricMergeOrder::HigherIsBetter => a.max(b),
                MetricMergeOrder::LowerIsBetter => a.min(b),
            }),
            (None, b) => b,
            (a, None) => a,
        };
    }
}

/// Metrics of a single method, identified by full name and line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodMetric {
    pub full_name: String,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    metrics: Vec<Metric>,
}

impl MethodMetric {
    /// Metric names must be unique; for duplicates the first one is kept.
    pub fn new(full_name: &str, short_name: &str, line: Option<u32>, metrics: Vec<Metric>) -> Self {
        let mut method_metric = Self {
            full_name: full_name.to_string(),
            short_name: short_name.to_string(),
            line,
            metrics: Vec::with_capacity(metrics.len()),
        };
        for metric in metrics {
            if method_metric.metric(&metric.name).is_none() {
                method_metric.metrics.push(metric);
            }
        }
        method_metric
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn is_same_method(&self, other: &MethodMetric) -> bool {
        self.full_name == other.full_name && self.line == other.line
    }

    pub fn merge(&mut self, other: &MethodMetric) {
        for metric in &other.metrics {
            match self.metrics.iter_mut().find(|m| m.name == metric.name) {
                Some(existing) => existing.merge(metric),
                None => self.metrics.push(metric.clone()),
            }
        }
    }

    pub(crate) fn dedup_metrics(&mut self) {
        let metrics = std::mem::take(&mut self.metrics);
        for metric in metrics {
            if self.metric(&metric.name).is_none() {
                self.metrics.push(metric);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeElementType {
    Property,
    Method,
}

/// A method or property with its line range, used for per-member coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeElement {
    pub full_name: String,
    pub name: String,
    pub element_type: CodeElementType,
    pub first_line: u32,
    pub last_line: u32,
    pub coverage_quota: Option<f64>,
}

impl CodeElement {
    pub fn new(
        full_name: &str,
        name: &str,
        element_type: CodeElementType,
        first_line: u32,
        last_line: u32,
        coverage_quota: Option<f64>,
    ) -> Self {
        Self {
            full_name: full_name.to_string(),
            name: name.to_string(),
            element_type,
            first_line,
            last_line,
            coverage_quota: coverage_quota.map(|q| q.clamp(0.0, 100.0)),
        }
    }

    pub fn is_same_element(&self, other: &CodeElement) -> bool {
        self.full_name == other.full_name && self.first_line == other.first_line
    }

    /// Keep the larger of the current and the given quota.
    pub fn apply_maximum_coverage_quota(&mut self, quota: Option<f64>) {
        if let Some(quota) = quota {
            self.coverage_quota = Some(self.coverage_quota.map_or(quota, |q| q.max(quota)));
        }
    }
}
