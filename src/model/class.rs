use serde::{Deserialize, Serialize};

use super::codefile::CodeFile;
use super::quota;

/// Whether a class carries line data or only a method-level quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageType {
    LineCoverage,
    MethodCoverage,
}

/// A class and the files it is declared in. Partial classes may span
/// several files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    #[serde(default)]
    files: Vec<CodeFile>,
    /// Quota reported by tools that only know method coverage. Ignored as
    /// soon as the class has files.
    #[serde(default, rename = "coverage_quota", skip_serializing_if = "Option::is_none")]
    fallback_coverage_quota: Option<f64>,
}

impl Class {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            files: Vec::new(),
            fallback_coverage_quota: None,
        }
    }

    /// Files ordered by path.
    pub fn files(&self) -> Vec<&CodeFile> {
        let mut files: Vec<&CodeFile> = self.files.iter().collect();
        files.sort_by(|a, b| a.path().cmp(b.path()));
        files
    }

    /// Add a file, merging it into an existing file with the same path.
    pub fn add_file(&mut self, file: CodeFile) {
        match self.files.iter_mut().find(|f| f.path() == file.path()) {
            Some(existing) => existing.merge(file),
            None => self.files.push(file),
        }
    }

    pub fn set_coverage_quota(&mut self, quota: Option<f64>) {
        self.fallback_coverage_quota = quota;
    }

    pub fn coverage_type(&self) -> CoverageType {
        if self.files.is_empty() {
            CoverageType::MethodCoverage
        } else {
            CoverageType::LineCoverage
        }
    }

    pub fn covered_lines(&self) -> usize {
        self.files.iter().map(CodeFile::covered_lines).sum()
    }

    pub fn coverable_lines(&self) -> usize {
        self.files.iter().map(CodeFile::coverable_lines).sum()
    }

    /// `None` when no file carries branch data.
    pub fn covered_branches(&self) -> Option<usize> {
        sum_options(self.files.iter().map(CodeFile::covered_branches))
    }

    pub fn total_branches(&self) -> Option<usize> {
        sum_options(self.files.iter().map(CodeFile::total_branches))
    }

    pub fn coverage_quota(&self) -> Option<f64> {
        if self.files.is_empty() {
            self.fallback_coverage_quota
        } else {
            quota(self.covered_lines(), self.coverable_lines())
        }
    }

    pub fn branch_coverage_quota(&self) -> Option<f64> {
        quota(self.covered_branches()?, self.total_branches()?)
    }

    pub fn covered_code_elements(&self) -> usize {
        self.files.iter().map(CodeFile::covered_code_elements).sum()
    }

    pub fn full_covered_code_elements(&self) -> usize {
        self.files.iter().map(CodeFile::full_covered_code_elements).sum()
    }

    pub fn total_code_elements(&self) -> usize {
        self.files.iter().map(CodeFile::total_code_elements).sum()
    }

    /// Merge another record of the same class. Files with the same path are
    /// merged, others are added.
    pub fn merge(&mut self, other: Class) {
        self.fallback_coverage_quota =
            match (self.fallback_coverage_quota, other.fallback_coverage_quota) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };

        for file in other.files {
            self.add_file(file);
        }
    }
}

pub(crate) fn sum_options<I>(values: I) -> Option<usize>
where
    I: Iterator<Item = Option<usize>>,
{
    values.fold(None, |sum, value| match (sum, value) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    })
}

/// A named collection of classes, typically one binary or package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assembly {
    pub name: String,
    #[serde(default)]
    classes: Vec<Class>,
}

impl Assembly {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            classes: Vec::new(),
        }
    }

    /// Last path segment of the name, so `C:\bin\App.dll` becomes `App.dll`.
    pub fn short_name(&self) -> &str {
        self.name.rsplit(['/', '\\']).next().unwrap_or(&self.name)
    }

    /// Classes ordered by name.
    pub fn classes(&self) -> Vec<&Class> {
        let mut classes: Vec<&Class> = self.classes.iter().collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        classes
    }

    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Add a class, merging it into an existing class of the same name.
    pub fn add_class(&mut self, class: Class) {
        match self.classes.iter_mut().find(|c| c.name == class.name) {
            Some(existing) => existing.merge(class),
            None => self.classes.push(class),
        }
    }

    pub fn covered_lines(&self) -> usize {
        self.classes.iter().map(Class::covered_lines).sum()
    }

    pub fn coverable_lines(&self) -> usize {
        self.classes.iter().map(Class::coverable_lines).sum()
    }

    pub fn covered_branches(&self) -> Option<usize> {
        sum_options(self.classes.iter().map(Class::covered_branches))
    }

    pub fn total_branches(&self) -> Option<usize> {
        sum_options(self.classes.iter().map(Class::total_branches))
    }

    pub fn coverage_quota(&self) -> Option<f64> {
        quota(self.covered_lines(), self.coverable_lines())
    }

    pub fn branch_coverage_quota(&self) -> Option<f64> {
        quota(self.covered_branches()?, self.total_branches()?)
    }

    pub fn covered_code_elements(&self) -> usize {
        self.classes.iter().map(Class::covered_code_elements).sum()
    }

    pub fn full_covered_code_elements(&self) -> usize {
        self.classes.iter().map(Class::full_covered_code_elements).sum()
    }

    pub fn total_code_elements(&self) -> usize {
        self.classes.iter().map(Class::total_code_elements).sum()
    }

    pub fn code_element_coverage_quota(&self) -> Option<f64> {
        quota(self.covered_code_elements(), self.total_code_elements())
    }

    pub fn full_code_element_coverage_quota(&self) -> Option<f64> {
        quota(self.full_covered_code_elements(), self.total_code_elements())
    }

    /// Deep-merge another assembly of the same name, class by class.
    pub fn merge(&mut self, other: Assembly) {
        for class in other.classes {
            self.add_class(class);
        }
    }
}

/// Combine the assemblies of several reports; assemblies with equal names
/// are merged. The result is ordered by name.
pub fn merge_assemblies<I>(assemblies: I) -> Vec<Assembly>
where
    I: IntoIterator<Item = Assembly>,
{
    let mut merged: Vec<Assembly> = Vec::new();
    for assembly in assemblies {
        match merged.iter_mut().find(|a| a.name == assembly.name) {
            Some(existing) => existing.merge(assembly),
            None => merged.push(assembly),
        }
    }
    merged.sort_by(|a, b| a.name.cmp(&b.name));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineVisitStatus::*;

    fn file(path: &str, coverage: Vec<i64>) -> CodeFile {
        let status = coverage
            .iter()
            .map(|&v| crate::model::LineVisitStatus::derive(v, None))
            .collect();
        CodeFile::new(path, coverage, status).unwrap()
    }

    #[test]
    fn test_class_counters_are_sums_over_files() {
        let mut class = Class::new("Ns.Foo");
        class.add_file(file("b/Foo.Part.cs", vec![-1, 1, 0]));
        class.add_file(file("a/Foo.cs", vec![-1, 0, 0, 3]));
        assert_eq!(class.coverable_lines(), 5);
        assert_eq!(class.covered_lines(), 2);
        assert_eq!(class.coverage_quota(), Some(40.0));
        assert_eq!(class.files()[0].path(), "a/Foo.cs");
        assert_eq!(class.coverage_type(), CoverageType::LineCoverage);
        assert_eq!(class.branch_coverage_quota(), None);
    }

    #[test]
    fn test_fallback_quota_takes_maximum() {
        let mut a = Class::new("Ns.Foo");
        a.set_coverage_quota(Some(30.0));
        let mut b = Class::new("Ns.Foo");
        b.set_coverage_quota(Some(70.0));
        a.merge(b);
        assert_eq!(a.coverage_type(), CoverageType::MethodCoverage);
        assert_eq!(a.coverage_quota(), Some(70.0));

        let mut c = Class::new("Ns.Foo");
        c.merge(a);
        assert_eq!(c.coverage_quota(), Some(70.0));
    }

    #[test]
    fn test_class_merge_matches_files_by_path() {
        let mut a = Class::new("Ns.Foo");
        a.add_file(file("Foo.cs", vec![-1, 1, 0]));
        let mut b = Class::new("Ns.Foo");
        b.add_file(file("Foo.cs", vec![-1, 0, 1]));
        b.add_file(file("Foo.Designer.cs", vec![-1, 1]));
        a.merge(b);

        assert_eq!(a.files().len(), 2);
        assert_eq!(a.covered_lines(), 3);
        assert_eq!(a.coverable_lines(), 3);
    }

    #[test]
    fn test_add_file_merges_same_path() {
        let mut class = Class::new("Ns.Foo");
        class.add_file(file("Foo.cs", vec![-1, 1, 0, 0]));
        class.add_file(file("Foo.cs", vec![-1, 0, 2, -1]));

        assert_eq!(class.files().len(), 1);
        assert_eq!(class.files()[0].line_coverage(), &[-1, 1, 2, 0]);
        assert_eq!(class.coverable_lines(), 3);
        assert_eq!(class.covered_lines(), 2);
    }

    #[test]
    fn test_merge_assemblies() {
        let mut first = Assembly::new("/bin/Zeta.dll");
        let mut foo = Class::new("Ns.Foo");
        foo.add_file(file("Foo.cs", vec![-1, 1, 0]));
        first.add_class(foo);

        let mut second = Assembly::new("/bin/Zeta.dll");
        let mut foo = Class::new("Ns.Foo");
        foo.add_file(file("Foo.cs", vec![-1, 0, 2]));
        second.add_class(foo);
        let mut bar = Class::new("Ns.Bar");
        bar.add_file(file("Bar.cs", vec![-1, 0]));
        second.add_class(bar);

        let alpha = Assembly::new("Alpha");

        let merged = merge_assemblies(vec![first, alpha, second]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "/bin/Zeta.dll");
        assert_eq!(merged[1].short_name(), "Alpha");
        assert_eq!(merged[0].short_name(), "Zeta.dll");

        let zeta = &merged[0];
        assert_eq!(zeta.classes().len(), 2);
        assert_eq!(zeta.classes()[0].name, "Ns.Bar");
        assert_eq!(zeta.covered_lines(), 2);
        assert_eq!(zeta.coverable_lines(), 3);
        assert_eq!(
            zeta.class("Ns.Foo").unwrap().files()[0].line_visit_status(),
            &[NotCoverable, Covered, Covered]
        );
    }
}
