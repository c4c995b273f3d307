use tracing::debug;

use super::search::{ElementSearcher, FileRegistry, TreeSink};
use super::{descendant_paths, distinct, PreprocessStats, Preprocessor};
use crate::document::{CoverageDocument, Element};
use crate::source::{SourceElement, SourceElementPosition};

/// Adds zero visit points for unexecuted methods and auto-properties in
/// PartCover 2.3 reports.
pub struct PartCoverPreprocessor {
    searcher: ElementSearcher,
}

impl PartCoverPreprocessor {
    pub fn new(searcher: ElementSearcher) -> Self {
        Self { searcher }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    Method,
    Property,
}

type Update = fn(&mut Element, SourceElementPosition, &str);

struct Pending {
    path: Vec<usize>,
    element: SourceElement,
    candidate_ids: Vec<String>,
}

impl Preprocessor for PartCoverPreprocessor {
    fn preprocess(&mut self, document: &mut CoverageDocument) -> PreprocessStats {
        let mut files: FileRegistry = document
            .root
            .descendants("File")
            .into_iter()
            .filter_map(|f| Some((f.attr("id")?.to_string(), f.attr("url")?.to_string())))
            .collect();

        let mut stats = PreprocessStats::default();
        let passes: [(MemberKind, Update); 2] = [
            (MemberKind::Method, update_method),
            (MemberKind::Property, update_property),
        ];
        for (kind, update) in passes {
            let pending = unexecuted_members(&document.root, kind);
            let mut synthesized = 0;
            for member in &pending {
                let mut sink = TreeSink {
                    root: &mut document.root,
                    target: &member.path,
                    files_container: &[],
                    update,
                    register: register_file,
                };
                if self
                    .searcher
                    .search(&member.element, &mut files, &member.candidate_ids, &mut sink)
                {
                    synthesized += 1;
                }
            }

            if !pending.is_empty() {
                debug!(
                    "Added coverage of {} of {} unexecuted {:?} members",
                    synthesized,
                    pending.len(),
                    kind
                );
            }
            stats.synthesis_candidates += pending.len();
            stats.synthesized += synthesized;
        }
        stats
    }
}

fn is_accessor(name: &str) -> bool {
    name.starts_with("get_") || name.starts_with("set_")
}

/// Methods without any `pt`, and accessors without a located `pt`, of
/// types that are not compiler generated.
fn unexecuted_members(root: &Element, kind: MemberKind) -> Vec<Pending> {
    let mut pending = Vec::new();
    for type_path in descendant_paths(root, "Type") {
        let Some(ty) = root.at_path(&type_path) else {
            continue;
        };
        let type_name = ty.attr("name").unwrap_or_default();
        if type_name.contains("__") {
            continue;
        }

        let candidate_ids = distinct(
            ty.descendants("pt")
                .into_iter()
                .filter_map(|pt| pt.attr("fid"))
                .map(str::to_string),
        );

        for (index, method) in ty.children.iter().enumerate() {
            if method.name != "Method" {
                continue;
            }
            let name = method.attr("name").unwrap_or_default();
            let element = match kind {
                MemberKind::Method if !is_accessor(name) && method.children.is_empty() => {
                    SourceElement::method_with_signature(
                        type_name,
                        name,
                        method.attr("sig").unwrap_or_default(),
                    )
                }
                MemberKind::Property
                    if is_accessor(name)
                        && !method.children.iter().any(|pt| pt.attr("sl").is_some()) =>
                {
                    SourceElement::property(type_name, name)
                }
                _ => continue,
            };

            let mut path = type_path.clone();
            path.push(index);
            pending.push(Pending {
                path,
                element,
                candidate_ids: candidate_ids.clone(),
            });
        }
    }
    pending
}

/// One zero visit point per line of the method.
fn update_method(method: &mut Element, position: SourceElementPosition, file_id: &str) {
    for line in position.start()..=position.end() {
        method.children.push(
            Element::new("pt")
                .with_attr("visit", 0)
                .with_attr("fid", file_id)
                .with_attr("sl", line),
        );
    }
}

fn update_property(property: &mut Element, position: SourceElementPosition, file_id: &str) {
    match property.children.first_mut() {
        Some(pt) => {
            pt.set_attr("sl", position.start());
            pt.set_attr("fid", file_id);
        }
        None => property.children.push(
            Element::new("pt")
                .with_attr("visit", 0)
                .with_attr("fid", file_id)
                .with_attr("sl", position.start()),
        ),
    }
}

fn register_file(root: &mut Element, file_id: &str, path: &str) {
    root.children
        .push(Element::new("File").with_attr("id", file_id).with_attr("url", path));
}
