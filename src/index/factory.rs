use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::{ClassIndex, MultiRootIndex};

/// Hands out class indexes, reusing an existing one whenever the requested
/// root lies inside a root that has already been requested.
///
/// Reuse means a caller may get an index covering more than it asked for.
/// Each distinct root is therefore scanned at most once per process.
#[derive(Debug, Default)]
pub struct ClassIndexFactory {
    cache: Mutex<Vec<Arc<ClassIndex>>>,
}

impl ClassIndexFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index for `root`. An empty root yields a fresh, permanently empty index
    /// that is not cached.
    pub fn index_for(&self, root: &Path) -> Arc<ClassIndex> {
        if root.as_os_str().is_empty() {
            return Arc::new(ClassIndex::new(None));
        }

        let requested = root_key(root);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());

        let cached = cache.iter().find(|index| {
            index
                .root()
                .is_some_and(|existing| requested.starts_with(&root_key(existing)))
        });
        if let Some(index) = cached {
            debug!("Reusing class index of {:?} for {}", index.root(), root.display());
            return Arc::clone(index);
        }

        let index = Arc::new(ClassIndex::new(Some(root.to_path_buf())));
        cache.push(Arc::clone(&index));
        index
    }

    /// Combined index over several roots, each one built or reused individually.
    pub fn index_for_roots(&self, roots: &[PathBuf]) -> MultiRootIndex {
        MultiRootIndex::new(roots.iter().map(|root| self.index_for(root)).collect())
    }

    /// Number of distinct roots indexed so far.
    pub fn cached_roots(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn root_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ClassLookup;

    #[test]
    fn test_nested_root_reuses_existing_index() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("src").join("app");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Foo.cs"), "namespace Ns { class Foo { } }").unwrap();

        let factory = ClassIndexFactory::new();
        let outer = factory.index_for(dir.path());
        assert_eq!(outer.files_of_class("Ns.Foo").len(), 1);

        let inner = factory.index_for(&nested);
        assert!(Arc::ptr_eq(&outer, &inner));
        assert_eq!(inner.files_of_class("Ns.Foo").len(), 1);
        assert_eq!(outer.build_count(), 1);
        assert_eq!(factory.cached_roots(), 1);
    }

    #[test]
    fn test_prefix_match_ignores_case() {
        let factory = ClassIndexFactory::new();
        let a = factory.index_for(Path::new("/Work/Project"));
        let b = factory.index_for(Path::new("/work/project/src"));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_outer_root_after_inner_gets_its_own_index() {
        let factory = ClassIndexFactory::new();
        let inner = factory.index_for(Path::new("/work/project/src"));
        let outer = factory.index_for(Path::new("/work/project"));
        assert!(!Arc::ptr_eq(&inner, &outer));
        assert_eq!(factory.cached_roots(), 2);
    }

    #[test]
    fn test_empty_root_is_not_cached() {
        let factory = ClassIndexFactory::new();
        let empty = factory.index_for(Path::new(""));
        assert!(empty.files_of_class("Anything").is_empty());
        assert_eq!(factory.cached_roots(), 0);
    }

    #[test]
    fn test_multiple_roots() {
        let factory = ClassIndexFactory::new();
        let multi = factory.index_for_roots(&[
            PathBuf::from("/a"),
            PathBuf::from("/a/b"),
            PathBuf::from("/c"),
        ]);
        assert_eq!(multi.indexes().len(), 3);
        assert_eq!(factory.cached_roots(), 2);
    }
}
