use tracing::warn;

use super::reattach::{find_owners, is_startup_code};
use super::{attr_u32, PreprocessStats, Preprocessor};
use crate::document::{CoverageDocument, Element};

/// Moves startup code types of dotCover reports into the type that owns
/// them.
pub struct DotCoverPreprocessor;

impl Preprocessor for DotCoverPreprocessor {
    fn preprocess(&mut self, document: &mut CoverageDocument) -> PreprocessStats {
        if document.root.descendants("Statement").is_empty() {
            warn!(
                "dotCover report contains no statements, \
                 it was probably not created with ReportType=DetailedXml"
            );
        }

        let mut stats = PreprocessStats::default();
        document.root.for_each_named_mut("Assembly", &mut |assembly| {
            stats.reattached += move_startup_code(assembly);
        });
        stats
    }
}

fn is_startup_namespace(namespace: &Element) -> bool {
    namespace.name == "Namespace" && is_startup_code(namespace.attr("Name").unwrap_or_default())
}

fn is_module_placeholder(ty: &Element) -> bool {
    ty.name == "Type"
        && ty
            .attr("Name")
            .and_then(|name| name.get(..7))
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("$Module"))
}

fn file_ids(ty: &&Element) -> Vec<String> {
    ty.descendants("Statement")
        .into_iter()
        .filter_map(|s| s.attr("FileIndex"))
        .map(str::to_string)
        .collect()
}

fn lines(ty: &&Element) -> Vec<u32> {
    ty.descendants("Statement")
        .into_iter()
        .filter_map(|s| attr_u32(s, "Line"))
        .collect()
}

/// Move startup types out of their `$Module` placeholder into the owning
/// type, then drop placeholders and startup namespaces left empty. Returns
/// the number of moved types.
fn move_startup_code(assembly: &mut Element) -> usize {
    let mut startup_paths = Vec::new();
    let mut user_paths = Vec::new();
    for (ns_index, namespace) in assembly.children.iter().enumerate() {
        if namespace.name != "Namespace" {
            continue;
        }
        let startup = is_startup_namespace(namespace);
        for (type_index, ty) in namespace.children.iter().enumerate() {
            if ty.name != "Type" {
                continue;
            }
            if !startup {
                user_paths.push([ns_index, type_index]);
            } else if is_module_placeholder(ty) {
                for (index, child) in ty.children.iter().enumerate() {
                    if child.name == "Type" {
                        startup_paths.push([ns_index, type_index, index]);
                    }
                }
            }
        }
    }

    let moves: Vec<([usize; 3], [usize; 2])> = {
        let startup: Vec<&Element> = startup_paths
            .iter()
            .filter_map(|path| assembly.at_path(path))
            .collect();
        let user: Vec<&Element> = user_paths
            .iter()
            .filter_map(|path| assembly.at_path(path))
            .collect();
        find_owners(&startup, &user, file_ids, lines)
            .into_iter()
            .zip(&startup_paths)
            .filter_map(|(owner, path)| Some((*path, user_paths[owner?])))
            .collect()
    };

    for (from, to) in &moves {
        let Some(moved) = assembly.at_path(from).cloned() else {
            continue;
        };
        if let Some(owner) = assembly.at_path_mut(to) {
            owner.children.push(moved);
        }
    }

    // Later siblings first, so that earlier indexes stay valid.
    let mut removals: Vec<[usize; 3]> = moves.iter().map(|(from, _)| *from).collect();
    removals.sort_unstable_by(|a, b| b.cmp(a));
    for [ns, ty, index] in removals {
        if let Some(placeholder) = assembly.at_path_mut(&[ns, ty]) {
            placeholder.children.remove(index);
        }
    }

    for namespace in assembly.children.iter_mut().filter(|c| is_startup_namespace(c)) {
        namespace
            .children
            .retain(|ty| !(is_module_placeholder(ty) && ty.children.is_empty()));
    }
    assembly
        .children
        .retain(|c| !(is_startup_namespace(c) && c.children.is_empty()));

    moves.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_type(name: &str, file: &str, line: u32) -> String {
        format!(
            r#"<Type Name="{}"><Method Name="Run"><Statement FileIndex="{}" Line="{}" Covered="True" /></Method></Type>"#,
            name, file, line
        )
    }

    fn report(startup: &str) -> String {
        format!(
            r#"<Root ReportType="DetailedXml">
  <Assembly Name="App">
    <Namespace Name="Ns">{}{}</Namespace>
    <Namespace Name="&lt;StartupCode$App&gt;">
      <Type Name="$Module">{}</Type>
    </Namespace>
  </Assembly>
</Root>"#,
            user_type("First", "1", 10),
            user_type("Second", "1", 40),
            startup
        )
    }

    #[test]
    fn test_startup_type_moves_into_owner() {
        let xml = report(&user_type("Closure", "1", 50));
        let mut doc = CoverageDocument::parse(xml.as_bytes()).unwrap();
        let stats = DotCoverPreprocessor.preprocess(&mut doc);
        assert_eq!(stats.reattached, 1);

        let assembly = doc.root.child("Assembly").unwrap();
        assert_eq!(assembly.children.len(), 1, "empty startup namespace is removed");
        let second = &assembly.children[0].children[1];
        assert_eq!(second.attr("Name"), Some("Second"));
        assert_eq!(second.children[1].attr("Name"), Some("Closure"));

        let before = doc.clone();
        assert_eq!(DotCoverPreprocessor.preprocess(&mut doc).reattached, 0);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_unmatched_startup_type_keeps_placeholder() {
        let xml = report(&user_type("Closure", "2", 50));
        let mut doc = CoverageDocument::parse(xml.as_bytes()).unwrap();
        let before = doc.clone();
        assert_eq!(DotCoverPreprocessor.preprocess(&mut doc).reattached, 0);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_report_without_statements_still_drops_empty_placeholders() {
        let xml = r#"<Root><Assembly Name="App"><Namespace Name="&lt;StartupCode$App&gt;"><Type Name="$Module" /></Namespace></Assembly></Root>"#;
        let mut doc = CoverageDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(DotCoverPreprocessor.preprocess(&mut doc).reattached, 0);
        assert!(doc.root.child("Assembly").unwrap().children.is_empty());

        let xml = r#"<Root><Assembly Name="App"><Namespace Name="&lt;StartupCode$App&gt;"><Type Name="$Module"><Type Name="Closure" /></Type></Namespace></Assembly></Root>"#;
        let mut doc = CoverageDocument::parse(xml.as_bytes()).unwrap();
        let before = doc.clone();
        assert_eq!(DotCoverPreprocessor.preprocess(&mut doc).reattached, 0);
        assert_eq!(doc, before);
    }
}
