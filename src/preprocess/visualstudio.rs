use super::reattach::{find_owners, is_startup_code};
use super::{PreprocessStats, Preprocessor};
use crate::document::{CoverageDocument, Element};

/// Gives startup code classes of Visual Studio coverage exports the
/// namespace and class name of their owner.
pub struct VisualStudioPreprocessor;

impl Preprocessor for VisualStudioPreprocessor {
    fn preprocess(&mut self, document: &mut CoverageDocument) -> PreprocessStats {
        let mut stats = PreprocessStats::default();
        document.root.for_each_named_mut("Module", &mut |module| {
            stats.reattached += rename_startup_code(module);
        });
        stats
    }
}

fn lines_elements<'a>(class: &'a Element) -> impl Iterator<Item = &'a Element> + 'a {
    class
        .children_named("Method")
        .flat_map(|method| method.children_named("Lines"))
}

fn file_ids(class: &&Element) -> Vec<String> {
    lines_elements(class)
        .filter_map(|lines| lines.child_text("SourceFileID"))
        .map(|id| id.trim().to_string())
        .collect()
}

fn lines(class: &&Element) -> Vec<u32> {
    lines_elements(class)
        .flat_map(|lines| lines.children_named("LnStart"))
        .filter_map(|start| start.text.trim().parse().ok())
        .collect()
}

struct Rename {
    table: usize,
    class: usize,
    namespace_name: String,
    class_name: String,
}

fn rename_startup_code(module: &mut Element) -> usize {
    let renames: Vec<Rename> = {
        let mut startup = Vec::new();
        let mut user = Vec::new();
        for (table_index, table) in module.children.iter().enumerate() {
            if table.name != "NamespaceTable" {
                continue;
            }
            let namespace_name = table.child_text("NamespaceName").unwrap_or_default();
            let is_startup = is_startup_code(namespace_name);
            for (class_index, class) in table.children.iter().enumerate() {
                if class.name != "Class" {
                    continue;
                }
                if !is_startup {
                    user.push((namespace_name, class));
                } else if class.child_text("ClassName").is_some_and(|n| n.contains('.')) {
                    startup.push(((table_index, class_index), class));
                }
            }
        }

        let startup_classes: Vec<&Element> = startup.iter().map(|(_, class)| *class).collect();
        let user_classes: Vec<&Element> = user.iter().map(|(_, class)| *class).collect();
        find_owners(&startup_classes, &user_classes, file_ids, lines)
            .into_iter()
            .zip(&startup)
            .filter_map(|(owner, ((table, class), _))| {
                let (namespace_name, owner) = user[owner?];
                Some(Rename {
                    table: *table,
                    class: *class,
                    namespace_name: namespace_name.to_string(),
                    class_name: owner.child_text("ClassName").unwrap_or_default().to_string(),
                })
            })
            .collect()
    };

    for rename in &renames {
        let Some(table) = module.children.get_mut(rename.table) else {
            continue;
        };
        table.ensure_child("NamespaceName").text = rename.namespace_name.clone();
        if let Some(class) = table.children.get_mut(rename.class) {
            class.ensure_child("ClassName").text = rename.class_name.clone();
        }
    }
    renames.len()
}
