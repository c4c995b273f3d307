//! Mapping from fully-qualified class names to the source files declaring them.
//!
//! An index is bound to one root directory and is built lazily, on the first
//! lookup. Building walks the tree with [`crate::scanner`] and scans every
//! source file in parallel; afterwards the index is read-only.

mod factory;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use rayon::prelude::*;
use tracing::debug;

use crate::scanner::enumerate_files;
use crate::source::{normalize_class_name, SourceAnalyzer};

pub use factory::ClassIndexFactory;

/// File name patterns of the source languages the declaration scanner understands.
pub const SOURCE_FILE_PATTERNS: &[&str] = &["*.cs", "*.java", "*.kt", "*.scala", "*.ts"];

/// Anything that can answer "which files declare this class".
pub trait ClassLookup: Send + Sync {
    /// Files declaring `class_name`. Unknown classes yield an empty list.
    fn files_of_class(&self, class_name: &str) -> Vec<PathBuf>;
}

/// Class index over a single root directory.
#[derive(Debug)]
pub struct ClassIndex {
    root: Option<PathBuf>,
    files_by_class: OnceLock<HashMap<String, BTreeSet<PathBuf>>>,
    builds: AtomicUsize,
}

impl ClassIndex {
    /// Index over `root`. Nothing is read from disk until the first lookup.
    /// `None` produces an index that is always empty.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            files_by_class: OnceLock::new(),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Number of times the directory tree has been scanned. Never exceeds one.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn is_built(&self) -> bool {
        self.files_by_class.get().is_some()
    }

    fn files_by_class(&self) -> &HashMap<String, BTreeSet<PathBuf>> {
        self.files_by_class.get_or_init(|| match &self.root {
            Some(root) if root.is_dir() => {
                self.builds.fetch_add(1, Ordering::Relaxed);
                build(root)
            }
            _ => HashMap::new(),
        })
    }
}

impl ClassLookup for ClassIndex {
    fn files_of_class(&self, class_name: &str) -> Vec<PathBuf> {
        self.files_by_class()
            .get(&normalize_class_name(class_name))
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn build(root: &Path) -> HashMap<String, BTreeSet<PathBuf>> {
    debug!("Indexing classes in directory {}", root.display());

    let files: Vec<PathBuf> = SOURCE_FILE_PATTERNS
        .iter()
        .flat_map(|pattern| enumerate_files(root, pattern, true))
        .collect();

    let classes_per_file: Vec<(PathBuf, Vec<String>)> = files
        .into_par_iter()
        .map(|file| {
            let classes = SourceAnalyzer::classes_in_file(&file);
            (file, classes)
        })
        .collect();

    let mut files_by_class: HashMap<String, BTreeSet<PathBuf>> = HashMap::new();
    for (file, classes) in classes_per_file {
        for class in classes {
            files_by_class.entry(class).or_default().insert(file.clone());
        }
    }

    debug!(
        "Indexed {} classes in directory {}",
        files_by_class.len(),
        root.display()
    );
    files_by_class
}

/// Union of several indexes, one per root directory.
#[derive(Debug, Clone, Default)]
pub struct MultiRootIndex {
    indexes: Vec<Arc<ClassIndex>>,
}

impl MultiRootIndex {
    pub fn new(indexes: Vec<Arc<ClassIndex>>) -> Self {
        Self { indexes }
    }

    pub fn indexes(&self) -> &[Arc<ClassIndex>] {
        &self.indexes
    }
}

impl ClassLookup for MultiRootIndex {
    fn files_of_class(&self, class_name: &str) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for index in &self.indexes {
            for file in index.files_of_class(class_name) {
                if !files.contains(&file) {
                    files.push(file);
                }
            }
        }
        files
    }
}

/// Longest directory prefix shared by all `paths`, compared case-insensitively.
///
/// The result ends with a separator. Returns `None` for an empty input or
/// when the paths share no directory at all.
pub fn common_directory<'a, I>(paths: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut paths = paths.into_iter();
    let first = paths.next()?;
    let mut prefix_len = first.len();

    for path in paths {
        let shared = first
            .char_indices()
            .zip(path.chars())
            .take_while(|((_, a), b)| a.to_lowercase().eq(b.to_lowercase()))
            .last()
            .map_or(0, |((i, a), _)| i + a.len_utf8());
        prefix_len = prefix_len.min(shared);
    }

    let prefix = &first[..prefix_len];
    let dir_end = prefix.rfind(['/', '\\'])? + 1;
    Some(first[..dir_end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app").join("models")).unwrap();
        std::fs::write(
            dir.path().join("app").join("models").join("Foo.cs"),
            "namespace Ns { public class Foo { class Inner { } } }",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("app").join("Bar.java"),
            "package ns;\npublic class Bar { }\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_index_is_built_lazily_once() {
        let dir = source_tree();
        let index = ClassIndex::new(Some(dir.path().to_path_buf()));
        assert!(!index.is_built());
        assert_eq!(index.build_count(), 0);

        let files = index.files_of_class("Ns.Foo");
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("Foo.cs"));

        assert_eq!(index.files_of_class("ns.Bar").len(), 1);
        assert_eq!(index.files_of_class("Ns.Foo+Inner").len(), 1);
        assert_eq!(index.build_count(), 1);
    }

    #[test]
    fn test_unknown_class_and_missing_root() {
        let dir = source_tree();
        let index = ClassIndex::new(Some(dir.path().to_path_buf()));
        assert!(index.files_of_class("Does.Not.Exist").is_empty());

        let missing = ClassIndex::new(Some(dir.path().join("missing")));
        assert!(missing.files_of_class("Ns.Foo").is_empty());
        assert_eq!(missing.build_count(), 0);

        let empty = ClassIndex::new(None);
        assert!(empty.files_of_class("Ns.Foo").is_empty());
    }

    #[test]
    fn test_multi_root_union() {
        let dir = source_tree();
        let multi = MultiRootIndex::new(vec![
            Arc::new(ClassIndex::new(Some(dir.path().join("app").join("models")))),
            Arc::new(ClassIndex::new(Some(dir.path().to_path_buf()))),
        ]);
        // Found under both roots, reported once.
        assert_eq!(multi.files_of_class("Ns.Foo").len(), 1);
        assert_eq!(multi.files_of_class("ns.Bar").len(), 1);
    }

    #[test]
    fn test_common_directory() {
        assert_eq!(
            common_directory(["/src/app/Foo.cs", "/src/app/models/Bar.cs"]),
            Some("/src/app/".to_string())
        );
        assert_eq!(
            common_directory(["C:\\Src\\App\\Foo.cs", "c:\\src\\app\\Bar.cs"]),
            Some("C:\\Src\\App\\".to_string())
        );
        assert_eq!(
            common_directory(["/src/app/Foo.cs"]),
            Some("/src/app/".to_string())
        );
        assert_eq!(common_directory(["Foo.cs", "Bar.cs"]), None);
        assert_eq!(common_directory(Vec::<&str>::new()), None);
    }
}
