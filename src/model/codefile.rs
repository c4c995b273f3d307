use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::metric::{CodeElement, MethodMetric};
use super::quota;
use crate::error::CovnormError;

/// Visit count of a line that cannot be covered (comments, blank lines, ...).
pub const NOT_COVERABLE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineVisitStatus {
    NotCoverable,
    NotCovered,
    PartiallyCovered,
    Covered,
}

impl LineVisitStatus {
    /// Status of a line from its visit count and, if known, its branches.
    pub fn derive(visits: i64, branches: Option<&[Branch]>) -> Self {
        if visits < 0 {
            return LineVisitStatus::NotCoverable;
        }
        match branches {
            Some(branches) if !branches.is_empty() => {
                let covered = branches.iter().filter(|b| b.visits > 0).count();
                if covered == branches.len() {
                    LineVisitStatus::Covered
                } else if covered > 0 || visits > 0 {
                    LineVisitStatus::PartiallyCovered
                } else {
                    LineVisitStatus::NotCovered
                }
            }
            _ if visits > 0 => LineVisitStatus::Covered,
            _ => LineVisitStatus::NotCovered,
        }
    }
}

/// One branch target on a line. Branches of the same line are matched by
/// `identifier` when reports are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub visits: u64,
    pub identifier: String,
}

impl Branch {
    pub fn new(visits: u64, identifier: &str) -> Self {
        Self {
            visits,
            identifier: identifier.to_string(),
        }
    }
}

/// A test whose coverage is tracked separately.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestMethod {
    pub name: String,
    pub short_name: String,
}

impl TestMethod {
    pub fn new(name: &str, short_name: &str) -> Self {
        Self {
            name: name.to_string(),
            short_name: short_name.to_string(),
        }
    }
}

/// Per-line coverage caused by one test method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageByTestMethod {
    pub coverage: Vec<i64>,
    pub line_visit_status: Vec<LineVisitStatus>,
}

impl CoverageByTestMethod {
    pub fn new(
        coverage: Vec<i64>,
        line_visit_status: Vec<LineVisitStatus>,
    ) -> crate::error::Result<Self> {
        check_lengths(&coverage, &line_visit_status)?;
        Ok(Self {
            coverage,
            line_visit_status,
        })
    }

    fn merge(&mut self, other: &CoverageByTestMethod) {
        merge_line_coverage(&mut self.coverage, &other.coverage);
        self.line_visit_status = self
            .coverage
            .iter()
            .map(|&visits| LineVisitStatus::derive(visits, None))
            .collect();
    }
}

/// Coverage of one source file as seen by one class.
///
/// `line_coverage` and `line_visit_status` are indexed by line number, so
/// index 0 is unused and normally holds [`NOT_COVERABLE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CodeFileRecord")]
pub struct CodeFile {
    path: String,
    line_coverage: Vec<i64>,
    line_visit_status: Vec<LineVisitStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branches: Option<BTreeMap<u32, Vec<Branch>>>,
    #[serde(with = "map_entries", skip_serializing_if = "BTreeMap::is_empty")]
    coverage_by_test_method: BTreeMap<TestMethod, CoverageByTestMethod>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    method_metrics: Vec<MethodMetric>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    code_elements: Vec<CodeElement>,
    covered_lines: usize,
    coverable_lines: usize,
}

impl CodeFile {
    /// Fails when the visit and status arrays differ in length.
    pub fn new(
        path: &str,
        line_coverage: Vec<i64>,
        line_visit_status: Vec<LineVisitStatus>,
    ) -> crate::error::Result<Self> {
        check_lengths(&line_coverage, &line_visit_status)?;
        let mut file = Self {
            path: path.to_string(),
            line_coverage,
            line_visit_status,
            branches: None,
            coverage_by_test_method: BTreeMap::new(),
            method_metrics: Vec::new(),
            code_elements: Vec::new(),
            covered_lines: 0,
            coverable_lines: 0,
        };
        file.recount();
        Ok(file)
    }

    #[must_use]
    pub fn with_branches(mut self, branches: BTreeMap<u32, Vec<Branch>>) -> Self {
        self.branches = Some(branches);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn line_coverage(&self) -> &[i64] {
        &self.line_coverage
    }

    pub fn line_visit_status(&self) -> &[LineVisitStatus] {
        &self.line_visit_status
    }

    /// Branches per line. Empty when the report carried no branch data.
    pub fn branches_by_line(&self) -> BTreeMap<u32, Vec<Branch>> {
        self.branches.clone().unwrap_or_default()
    }

    pub fn branches_of_line(&self, line: u32) -> Option<&[Branch]> {
        self.branches.as_ref()?.get(&line).map(Vec::as_slice)
    }

    pub fn test_methods(&self) -> impl Iterator<Item = &TestMethod> {
        self.coverage_by_test_method.keys()
    }

    pub fn coverage_by_test_method(
        &self,
        test_method: &TestMethod,
    ) -> Option<&CoverageByTestMethod> {
        self.coverage_by_test_method.get(test_method)
    }

    pub fn method_metrics(&self) -> &[MethodMetric] {
        &self.method_metrics
    }

    pub fn code_elements(&self) -> &[CodeElement] {
        &self.code_elements
    }

    pub fn covered_lines(&self) -> usize {
        self.covered_lines
    }

    pub fn coverable_lines(&self) -> usize {
        self.coverable_lines
    }

    /// `None` when the report carried no branch data.
    pub fn covered_branches(&self) -> Option<usize> {
        self.branches
            .as_ref()
            .map(|b| b.values().flatten().filter(|b| b.visits > 0).count())
    }

    pub fn total_branches(&self) -> Option<usize> {
        self.branches.as_ref().map(|b| b.values().map(Vec::len).sum())
    }

    pub fn coverage_quota(&self) -> Option<f64> {
        quota(self.covered_lines, self.coverable_lines)
    }

    /// Code elements with at least one visited line.
    pub fn covered_code_elements(&self) -> usize {
        self.code_elements
            .iter()
            .filter(|e| self.lines_of(e).iter().any(|&v| v > 0))
            .count()
    }

    /// Code elements whose lines were all visited.
    pub fn full_covered_code_elements(&self) -> usize {
        self.code_elements
            .iter()
            .filter(|e| self.lines_of(e).iter().all(|&v| v > 0))
            .count()
    }

    pub fn total_code_elements(&self) -> usize {
        self.code_elements.len()
    }

    fn lines_of(&self, element: &CodeElement) -> &[i64] {
        let first = (element.first_line as usize).min(self.line_coverage.len());
        let last = (element.last_line as usize + 1).clamp(first, self.line_coverage.len());
        &self.line_coverage[first..last]
    }

    /// Coverage quota of the inclusive line range, `None` if the range is
    /// invalid or contains no coverable line.
    pub fn coverage_quota_in_range(&self, first_line: u32, last_line: u32) -> Option<f64> {
        let (first, last) = (first_line as usize, last_line as usize);
        if first > last || last >= self.line_visit_status.len() {
            return None;
        }
        let statuses = &self.line_visit_status[first..=last];
        let coverable = statuses
            .iter()
            .filter(|s| **s != LineVisitStatus::NotCoverable)
            .count();
        let covered = statuses
            .iter()
            .filter(|s| **s > LineVisitStatus::NotCovered)
            .count();
        quota(covered, coverable)
    }

    /// Record coverage of a test method, merging with coverage already
    /// recorded for the same test.
    pub fn add_coverage_by_test_method(
        &mut self,
        test_method: TestMethod,
        coverage: CoverageByTestMethod,
    ) {
        match self.coverage_by_test_method.get_mut(&test_method) {
            Some(existing) => existing.merge(&coverage),
            None => {
                self.coverage_by_test_method.insert(test_method, coverage);
            }
        }
    }

    /// A method metric for a method that already has one is ignored.
    pub fn add_method_metric(&mut self, method_metric: MethodMetric) {
        if !self.method_metrics.iter().any(|m| m.is_same_method(&method_metric)) {
            self.method_metrics.push(method_metric);
        }
    }

    pub fn add_code_element(&mut self, code_element: CodeElement) {
        if !self.code_elements.iter().any(|e| e.is_same_element(&code_element)) {
            self.code_elements.push(code_element);
        }
    }

    /// Merge another record of the same file into this one.
    ///
    /// Visit counts are summed per line, branches are matched per line by
    /// identifier and line statuses are derived again from the result. A
    /// line stays not coverable only if it is not coverable on both sides.
    pub fn merge(&mut self, other: CodeFile) {
        merge_line_coverage(&mut self.line_coverage, &other.line_coverage);

        if let Some(other_branches) = other.branches {
            let branches = self.branches.get_or_insert_with(BTreeMap::new);
            for (line, other_line_branches) in other_branches {
                let existing = branches.entry(line).or_default();
                for branch in other_line_branches {
                    match existing.iter_mut().find(|b| b.identifier == branch.identifier) {
                        Some(b) => b.visits = b.visits.saturating_add(branch.visits),
                        None => existing.push(branch),
                    }
                }
            }
        }

        self.line_visit_status = self
            .line_coverage
            .iter()
            .enumerate()
            .map(|(line, &visits)| {
                LineVisitStatus::derive(visits, self.branches_of_line(line as u32))
            })
            .collect();

        for (test_method, coverage) in other.coverage_by_test_method {
            self.add_coverage_by_test_method(test_method, coverage);
        }

        for method_metric in other.method_metrics {
            match self
                .method_metrics
                .iter_mut()
                .find(|m| m.is_same_method(&method_metric))
            {
                Some(existing) => existing.merge(&method_metric),
                None => self.method_metrics.push(method_metric),
            }
        }

        for code_element in other.code_elements {
            self.add_code_element(code_element);
        }

        self.recount();

        let quotas: Vec<Option<f64>> = self
            .code_elements
            .iter()
            .map(|e| self.coverage_quota_in_range(e.first_line, e.last_line))
            .collect();
        for (element, quota) in self.code_elements.iter_mut().zip(quotas) {
            element.apply_maximum_coverage_quota(quota);
        }
    }

    fn recount(&mut self) {
        self.covered_lines = self.line_coverage.iter().filter(|&&v| v > 0).count();
        self.coverable_lines = self.line_coverage.iter().filter(|&&v| v >= 0).count();
    }
}

fn check_lengths(coverage: &[i64], status: &[LineVisitStatus]) -> crate::error::Result<()> {
    if coverage.len() != status.len() {
        return Err(CovnormError::InvalidInput(format!(
            "line coverage has {} entries but line visit status has {}",
            coverage.len(),
            status.len()
        )));
    }
    Ok(())
}

/// Elementwise sum of visit counts, growing `target` to the longer length.
/// Not coverable entries (`-1`) never contribute to a sum.
fn merge_line_coverage(target: &mut Vec<i64>, other: &[i64]) {
    if other.len() > target.len() {
        target.resize(other.len(), NOT_COVERABLE);
    }
    for (current, &visits) in target.iter_mut().zip(other) {
        if *current < 0 {
            *current = visits;
        } else if visits > 0 {
            *current = current.saturating_add(visits);
        }
    }
}

/// Serialized form of [`CodeFile`]; deserialization goes through
/// [`CodeFile::new`] so the array length check always applies.
#[derive(Deserialize)]
struct CodeFileRecord {
    path: String,
    line_coverage: Vec<i64>,
    line_visit_status: Vec<LineVisitStatus>,
    #[serde(default)]
    branches: Option<BTreeMap<u32, Vec<Branch>>>,
    #[serde(default, with = "map_entries")]
    coverage_by_test_method: BTreeMap<TestMethod, CoverageByTestMethod>,
    #[serde(default)]
    method_metrics: Vec<MethodMetric>,
    #[serde(default)]
    code_elements: Vec<CodeElement>,
}

impl TryFrom<CodeFileRecord> for CodeFile {
    type Error = CovnormError;

    fn try_from(record: CodeFileRecord) -> Result<Self, Self::Error> {
        let mut file = CodeFile::new(&record.path, record.line_coverage, record.line_visit_status)?;
        file.branches = record.branches;
        for (test_method, coverage) in record.coverage_by_test_method {
            check_lengths(&coverage.coverage, &coverage.line_visit_status)?;
            file.add_coverage_by_test_method(test_method, coverage);
        }
        for mut method_metric in record.method_metrics {
            method_metric.dedup_metrics();
            file.add_method_metric(method_metric);
        }
        for code_element in record.code_elements {
            file.add_code_element(code_element);
        }
        Ok(file)
    }
}

/// (De)serializes a map with non-string keys as a list of `[key, value]` pairs.
mod map_entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let entries = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
