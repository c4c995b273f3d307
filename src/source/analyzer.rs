use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::scan::{scan_declarations, Declaration, DeclarationKind};
use super::{SourceElement, SourceElementPosition};

/// Reads source files and looks up declarations in them.
///
/// The declarations of the most recently read file are kept, since the
/// same file is usually queried for several members in a row.
#[derive(Default)]
pub struct SourceAnalyzer {
    last: Option<(PathBuf, Arc<Vec<Declaration>>)>,
}

impl SourceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fully-qualified names of all classes declared in `path`.
    /// Unreadable files declare nothing.
    pub fn classes_in_file(path: &Path) -> Vec<String> {
        let Some(text) = read_source(path) else {
            return Vec::new();
        };
        classes_in_source(&text)
    }

    /// Position of `element` in the file at `path`, if it can be found.
    pub fn find_element(
        &mut self,
        path: &Path,
        element: &SourceElement,
    ) -> Option<SourceElementPosition> {
        let decls = self.declarations(path)?;
        find_in_declarations(&decls, element)
    }

    fn declarations(&mut self, path: &Path) -> Option<Arc<Vec<Declaration>>> {
        if let Some((last_path, decls)) = &self.last {
            if last_path == path {
                return Some(Arc::clone(decls));
            }
        }
        let text = read_source(path)?;
        let decls = Arc::new(scan_declarations(&text));
        self.last = Some((path.to_path_buf(), Arc::clone(&decls)));
        Some(decls)
    }
}

/// Fully-qualified names of the classes declared in `text`, without duplicates.
pub fn classes_in_source(text: &str) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    for decl in scan_declarations(text) {
        if decl.kind == DeclarationKind::Type && !classes.contains(&decl.class_name) {
            classes.push(decl.class_name);
        }
    }
    classes
}

/// Position of `element` in already scanned source text.
pub fn find_in_source(text: &str, element: &SourceElement) -> Option<SourceElementPosition> {
    find_in_declarations(&scan_declarations(text), element)
}

fn find_in_declarations(
    decls: &[Declaration],
    element: &SourceElement,
) -> Option<SourceElementPosition> {
    let class_name = element.class_name();
    let mut members = decls
        .iter()
        .filter(|d| d.kind != DeclarationKind::Type && d.class_name == class_name);

    let found = match element {
        SourceElement::Property { name, .. } => {
            members.find(|d| d.kind == DeclarationKind::Property && &d.name == name)
        }
        SourceElement::Method {
            name,
            parameter_count,
            ..
        } => {
            let simple_class_name = class_name.rsplit(['.', '/']).next().unwrap_or(class_name);
            let (wanted, wants_static) = match name.as_str() {
                ".ctor" => (simple_class_name, Some(false)),
                ".cctor" => (simple_class_name, Some(true)),
                other => (other, None),
            };

            let candidates: Vec<&Declaration> = members
                .filter(|d| match d.kind {
                    DeclarationKind::Method {
                        parameter_count: count,
                        is_static,
                    } => {
                        d.name == wanted
                            && wants_static.map_or(true, |s| s == is_static)
                            && parameter_count.map_or(true, |p| p == count)
                    }
                    _ => false,
                })
                .collect();

            // Without a parameter count, overloads are ambiguous.
            if parameter_count.is_none() && candidates.len() > 1 {
                debug!("Ambiguous overloads for {}::{}", class_name, name);
                None
            } else {
                candidates.first().copied()
            }
        }
    }?;

    SourceElementPosition::new(found.start_line, found.end_line)
}

fn read_source(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            debug!("Unable to read source file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOO: &str = "namespace Ns\n{\n    public class Foo\n    {\n        public Foo() { }\n\n        public Foo(int seed) { }\n\n        public void Run() { }\n\n        public void Run(int times) { }\n\n        public string Bar { get; set; }\n    }\n}\n";

    #[test]
    fn test_property_lookup() {
        let pos = find_in_source(FOO, &SourceElement::property("Ns.Foo", "get_Bar")).unwrap();
        assert_eq!((pos.start(), pos.end()), (13, 13));
        assert!(find_in_source(FOO, &SourceElement::property("Ns.Foo", "get_Missing")).is_none());
        assert!(find_in_source(FOO, &SourceElement::property("Other.Foo", "get_Bar")).is_none());
    }

    #[test]
    fn test_constructor_lookup() {
        let default_ctor = SourceElement::method_with_signature("Ns.Foo", ".ctor", "void  ()");
        assert_eq!(find_in_source(FOO, &default_ctor).unwrap().start(), 5);

        let seeded = SourceElement::method_with_signature("Ns.Foo", ".ctor", "void  (int)");
        assert_eq!(find_in_source(FOO, &seeded).unwrap().start(), 7);

        let static_ctor = SourceElement::method("Ns.Foo", ".cctor", None);
        assert!(find_in_source(FOO, &static_ctor).is_none());
    }

    #[test]
    fn test_overloads_need_parameter_count() {
        let ambiguous = SourceElement::method("Ns.Foo", "Run", None);
        assert!(find_in_source(FOO, &ambiguous).is_none());

        let one = SourceElement::method("Ns.Foo", "Run", Some(1));
        assert_eq!(find_in_source(FOO, &one).unwrap().start(), 11);
    }

    #[test]
    fn test_classes_in_source() {
        let classes =
            classes_in_source("namespace A { class B { class C { } } partial class B { } }");
        assert_eq!(classes, vec!["A.B".to_string(), "A.B/C".to_string()]);
    }

    #[test]
    fn test_analyzer_reads_files_and_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Foo.cs");
        std::fs::write(&path, FOO).unwrap();

        let mut analyzer = SourceAnalyzer::new();
        let element = SourceElement::property("Ns.Foo", "set_Bar");
        assert_eq!(analyzer.find_element(&path, &element).unwrap().start(), 13);
        // Served from the cached declarations.
        assert_eq!(analyzer.find_element(&path, &element).unwrap().start(), 13);

        assert!(analyzer.find_element(&dir.path().join("Nope.cs"), &element).is_none());
        assert_eq!(SourceAnalyzer::classes_in_file(&path), vec!["Ns.Foo".to_string()]);
    }
}
