use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use tracing::{debug, warn};

use super::{PreprocessStats, Preprocessor};
use crate::document::{CoverageDocument, Element};

/// Turns the relative source file names of JaCoCo reports into paths below
/// one of the configured source directories.
pub struct JaCoCoPreprocessor {
    source_dirs: Vec<PathBuf>,
}

impl JaCoCoPreprocessor {
    pub fn new(source_dirs: Vec<PathBuf>) -> Self {
        Self { source_dirs }
    }

    /// Full path for `file` of `package`, and whether it was found in a
    /// source directory. URLs are returned unchanged.
    fn full_file_path(&self, package: &str, file: &str) -> (String, bool) {
        if file.starts_with("http://") || file.starts_with("https://") {
            return (file.to_string(), false);
        }

        let file = normalize_separators(file);
        if Path::new(&file).is_absolute() {
            return (file, false);
        }

        let package = normalize_separators(package);
        let found = self
            .source_dirs
            .iter()
            .flat_map(|dir| [dir.join(&file), dir.join(&package).join(&file)])
            .find(|candidate| candidate.is_file());

        match found {
            Some(path) => (path.to_string_lossy().into_owned(), true),
            None => (file, false),
        }
    }

    fn resolve_attr(&self, element: &mut Element, key: &str, package: &str) -> bool {
        let Some(file) = element.attr(key) else {
            return false;
        };
        let (path, found) = self.full_file_path(package, file);
        element.set_attr(key, path);
        found
    }
}

fn normalize_separators(path: &str) -> String {
    path.chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect()
}

impl Preprocessor for JaCoCoPreprocessor {
    fn preprocess(&mut self, document: &mut CoverageDocument) -> PreprocessStats {
        if self.source_dirs.is_empty() {
            if !document.root.descendants("package").is_empty() {
                warn!("No source directories given, JaCoCo file names stay relative");
            }
            return PreprocessStats::default();
        }

        let mut resolved = 0;
        document.root.for_each_named_mut("package", &mut |package| {
            let name = package.attr("name").unwrap_or_default().to_string();
            for child in &mut package.children {
                let key = match child.name.as_str() {
                    "class" => "sourcefilename",
                    "sourcefile" => "name",
                    _ => continue,
                };
                if self.resolve_attr(child, key, &name) {
                    resolved += 1;
                }
            }
        });

        debug!("Resolved {} JaCoCo source file names", resolved);
        PreprocessStats {
            resolved_paths: resolved,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<report name="app">
  <package name="com/example">
    <class name="com/example/Main" sourcefilename="Main.java" />
    <class name="com/example/Util" />
    <sourcefile name="Main.java" />
    <sourcefile name="Remote.java" />
    <sourcefile name="https://example.com/src/Web.java" />
  </package>
</report>"#;

    #[test]
    fn test_relative_names_resolve_below_package_dir() {
        let dir = tempfile::tempdir().unwrap();
        let package_dir = dir.path().join("com").join("example");
        std::fs::create_dir_all(&package_dir).unwrap();
        std::fs::write(package_dir.join("Main.java"), "class Main {}").unwrap();

        let mut doc = CoverageDocument::parse(REPORT.as_bytes()).unwrap();
        let stats = JaCoCoPreprocessor::new(vec![dir.path().to_path_buf()]).preprocess(&mut doc);
        assert_eq!(stats.resolved_paths, 2);

        let expected = package_dir.join("Main.java").to_string_lossy().into_owned();
        let classes = doc.root.descendants("class");
        assert_eq!(classes[0].attr("sourcefilename"), Some(expected.as_str()));
        assert_eq!(classes[1].attr("sourcefilename"), None);

        let files = doc.root.descendants("sourcefile");
        assert_eq!(files[0].attr("name"), Some(expected.as_str()));
        assert_eq!(files[1].attr("name"), Some("Remote.java"));
        assert_eq!(files[2].attr("name"), Some("https://example.com/src/Web.java"));
    }

    #[test]
    fn test_file_directly_in_source_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Main.java"), "class Main {}").unwrap();
        let preprocessor = JaCoCoPreprocessor::new(vec![dir.path().to_path_buf()]);

        let (path, found) = preprocessor.full_file_path("com/example", "Main.java");
        assert!(found);
        assert_eq!(PathBuf::from(path), dir.path().join("Main.java"));
    }

    #[test]
    fn test_without_source_dirs_nothing_changes() {
        let mut doc = CoverageDocument::parse(REPORT.as_bytes()).unwrap();
        let before = doc.clone();
        let stats = JaCoCoPreprocessor::new(Vec::new()).preprocess(&mut doc);
        assert_eq!(stats, PreprocessStats::default());
        assert_eq!(doc, before);
    }
}
