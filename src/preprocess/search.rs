use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::document::Element;
use crate::index::{common_directory, ClassIndex, ClassIndexFactory, ClassLookup};
use crate::source::{SourceAnalyzer, SourceElement, SourceElementPosition};

/// Source files registered in a report, by the report's file id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRegistry {
    paths_by_id: BTreeMap<String, String>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self, id: &str) -> Option<&str> {
        self.paths_by_id.get(id).map(String::as_str)
    }

    pub fn id_of(&self, path: &str) -> Option<&str> {
        self.paths_by_id
            .iter()
            .find(|(_, p)| *p == path)
            .map(|(id, _)| id.as_str())
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.paths_by_id.contains_key(id)
    }

    /// Register a file. An id that is already taken keeps its first path.
    pub fn insert(&mut self, id: String, path: String) {
        self.paths_by_id.entry(id).or_insert(path);
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths_by_id.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths_by_id.is_empty()
    }
}

impl FromIterator<(String, String)> for FileRegistry {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut registry = FileRegistry::new();
        for (id, path) in iter {
            registry.insert(id, path);
        }
        registry
    }
}

/// Schema specific edits performed once a declaration has been found.
pub trait ElementSink {
    /// Register a source file that was not yet part of the report.
    fn add_file(&mut self, file_id: &str, path: &str);

    /// Add execution records with zero visits for the found declaration.
    fn inject(&mut self, position: SourceElementPosition, file_id: &str);
}

/// [`ElementSink`] editing a report subtree. The target element and the
/// files container are addressed by child index paths from `root`.
pub struct TreeSink<'a> {
    pub root: &'a mut Element,
    pub target: &'a [usize],
    pub files_container: &'a [usize],
    pub update: fn(&mut Element, SourceElementPosition, &str),
    pub register: fn(&mut Element, &str, &str),
}

impl ElementSink for TreeSink<'_> {
    fn add_file(&mut self, file_id: &str, path: &str) {
        if let Some(container) = self.root.at_path_mut(self.files_container) {
            (self.register)(container, file_id, path);
        }
    }

    fn inject(&mut self, position: SourceElementPosition, file_id: &str) {
        if let Some(target) = self.root.at_path_mut(self.target) {
            (self.update)(target, position, file_id);
        }
    }
}

/// Finds declarations of members that an instrumentation tool left without
/// execution records, so that records can be synthesized for them.
///
/// Lookups go through up to three stages: the files the report already
/// associates with the class, an index over the common directory of all
/// files of the report, and finally the index over the user supplied
/// source directories.
pub struct ElementSearcher {
    factory: Arc<ClassIndexFactory>,
    global: Arc<dyn ClassLookup>,
    common: Option<Arc<ClassIndex>>,
    next_file_id: i32,
    analyzer: SourceAnalyzer,
}

impl ElementSearcher {
    pub fn new(factory: Arc<ClassIndexFactory>, global: Arc<dyn ClassLookup>) -> Self {
        Self {
            factory,
            global,
            common: None,
            next_file_id: i32::MAX,
            analyzer: SourceAnalyzer::new(),
        }
    }

    /// Forget the common directory index, e.g. before the next module.
    pub fn reset_common_index(&mut self) {
        self.common = None;
    }

    /// Search `element` and let `sink` record it. Returns whether the
    /// declaration was found; nothing is changed otherwise.
    ///
    /// With `candidate_ids` only those registered files are searched.
    pub fn search(
        &mut self,
        element: &SourceElement,
        files: &mut FileRegistry,
        candidate_ids: &[String],
        sink: &mut dyn ElementSink,
    ) -> bool {
        if !candidate_ids.is_empty() {
            return self.search_registered(element, files, candidate_ids, sink);
        }

        let common = match &self.common {
            Some(index) => Arc::clone(index),
            None => {
                let root = common_directory(files.paths()).unwrap_or_default();
                let index = self.factory.index_for(Path::new(&root));
                self.common = Some(Arc::clone(&index));
                index
            }
        };
        if self.search_index(common.as_ref(), element, files, sink) {
            return true;
        }

        let global = Arc::clone(&self.global);
        self.search_index(global.as_ref(), element, files, sink)
    }

    fn search_registered(
        &mut self,
        element: &SourceElement,
        files: &FileRegistry,
        candidate_ids: &[String],
        sink: &mut dyn ElementSink,
    ) -> bool {
        for id in candidate_ids {
            let Some(path) = files.path(id) else {
                continue;
            };
            if let Some(position) = self.analyzer.find_element(Path::new(path), element) {
                sink.inject(position, id);
                return true;
            }
        }
        false
    }

    fn search_index(
        &mut self,
        index: &dyn ClassLookup,
        element: &SourceElement,
        files: &mut FileRegistry,
        sink: &mut dyn ElementSink,
    ) -> bool {
        for file in index.files_of_class(element.class_name()) {
            let Some(position) = self.analyzer.find_element(&file, element) else {
                continue;
            };

            let path = file.to_string_lossy().into_owned();
            let id = match files.id_of(&path) {
                Some(id) => id.to_string(),
                None => {
                    let id = self.mint_file_id(files);
                    debug!("Registering source file {} as id {}", path, id);
                    files.insert(id.clone(), path.clone());
                    sink.add_file(&id, &path);
                    id
                }
            };
            sink.inject(position, &id);
            return true;
        }
        false
    }

    /// New file ids count down from `i32::MAX`, skipping ids in use.
    fn mint_file_id(&mut self, files: &FileRegistry) -> String {
        loop {
            let id = self.next_file_id.to_string();
            self.next_file_id -= 1;
            if !files.contains_id(&id) {
                return id;
            }
        }
    }
}
