//! Schema specific preprocessing of coverage reports.
//!
//! Every supported schema gets a [`Preprocessor`] that repairs the parsed
//! [`CoverageDocument`] in place before records are extracted from it:
//! synthesizing execution records for members the instrumentation tool
//! skipped, re-parenting compiler generated startup code classes, or
//! resolving relative source paths.

mod dotcover;
mod jacoco;
mod opencover;
mod partcover;
pub mod reattach;
mod search;
mod visualstudio;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::detect::Format;
use crate::document::{CoverageDocument, Element};
use crate::index::{ClassIndexFactory, ClassLookup, MultiRootIndex};

pub use dotcover::DotCoverPreprocessor;
pub use jacoco::JaCoCoPreprocessor;
pub use opencover::OpenCoverPreprocessor;
pub use partcover::PartCoverPreprocessor;
pub use search::{ElementSearcher, ElementSink, FileRegistry, TreeSink};
pub use visualstudio::VisualStudioPreprocessor;

/// Every report schema implements this trait.
pub trait Preprocessor {
    /// Repair `document` in place.
    fn preprocess(&mut self, document: &mut CoverageDocument) -> PreprocessStats;
}

/// What a preprocessing pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreprocessStats {
    /// Members without execution records that were looked up in source.
    pub synthesis_candidates: usize,
    /// Members for which execution records were added.
    pub synthesized: usize,
    /// Startup code classes moved to their owning class.
    pub reattached: usize,
    /// Relative source paths resolved against the source directories.
    pub resolved_paths: usize,
}

impl PreprocessStats {
    pub fn add(&mut self, other: PreprocessStats) {
        self.synthesis_candidates += other.synthesis_candidates;
        self.synthesized += other.synthesized;
        self.reattached += other.reattached;
        self.resolved_paths += other.resolved_paths;
    }
}

/// Source directories and the class indexes built over them, shared by all
/// reports of one run.
#[derive(Clone)]
pub struct SourceContext {
    factory: Arc<ClassIndexFactory>,
    global: Arc<MultiRootIndex>,
    source_dirs: Vec<PathBuf>,
}

impl SourceContext {
    pub fn new(source_dirs: Vec<PathBuf>) -> Self {
        let factory = Arc::new(ClassIndexFactory::new());
        let global = Arc::new(factory.index_for_roots(&source_dirs));
        Self {
            factory,
            global,
            source_dirs,
        }
    }

    pub fn factory(&self) -> &Arc<ClassIndexFactory> {
        &self.factory
    }

    pub fn global_index(&self) -> &Arc<MultiRootIndex> {
        &self.global
    }

    pub fn source_dirs(&self) -> &[PathBuf] {
        &self.source_dirs
    }

    /// A searcher with its own file id counter and common directory index.
    pub fn searcher(&self) -> ElementSearcher {
        let global: Arc<dyn ClassLookup> = self.global.clone();
        ElementSearcher::new(Arc::clone(&self.factory), global)
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// The preprocessor for reports of `format`.
pub fn preprocessor_for(format: Format, context: &SourceContext) -> Box<dyn Preprocessor> {
    match format {
        Format::OpenCover => Box::new(OpenCoverPreprocessor::new(context.searcher())),
        Format::PartCover => Box::new(PartCoverPreprocessor::new(context.searcher())),
        Format::DotCover => Box::new(DotCoverPreprocessor),
        Format::VisualStudio => Box::new(VisualStudioPreprocessor),
        Format::JaCoCo => Box::new(JaCoCoPreprocessor::new(context.source_dirs().to_vec())),
    }
}

/// Child index paths, relative to `root`, of the elements reached by
/// descending through `names` one level at a time.
pub(crate) fn paths_of(root: &Element, names: &[&str]) -> Vec<Vec<usize>> {
    let mut paths = vec![Vec::new()];
    for name in names {
        let mut next = Vec::new();
        for path in &paths {
            let Some(parent) = root.at_path(path) else {
                continue;
            };
            for (index, child) in parent.children.iter().enumerate() {
                if child.name == *name {
                    let mut child_path = path.clone();
                    child_path.push(index);
                    next.push(child_path);
                }
            }
        }
        paths = next;
    }
    paths
}

/// Child index paths of every element named `name` below `root`, in
/// document order. Matches nested inside other matches are included.
pub(crate) fn descendant_paths(root: &Element, name: &str) -> Vec<Vec<usize>> {
    fn walk(element: &Element, name: &str, path: &mut Vec<usize>, found: &mut Vec<Vec<usize>>) {
        for (index, child) in element.children.iter().enumerate() {
            path.push(index);
            if child.name == name {
                found.push(path.clone());
            }
            walk(child, name, path, found);
            path.pop();
        }
    }

    let mut found = Vec::new();
    walk(root, name, &mut Vec::new(), &mut found);
    found
}

/// Distinct values in first-seen order.
pub(crate) fn distinct<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

/// Integer value of an attribute, `None` if absent or malformed.
pub(crate) fn attr_u32(element: &Element, key: &str) -> Option<u32> {
    element.attr(key)?.trim().parse().ok()
}
