use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::reattach::{find_owners, is_startup_code};
use super::search::{ElementSearcher, FileRegistry, TreeSink};
use super::{distinct, paths_of, PreprocessStats, Preprocessor};
use crate::document::{CoverageDocument, Element};
use crate::source::{SourceElement, SourceElementPosition};

static METHOD_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*::(?<name>.+)\((?<arguments>.*)\)$").unwrap());

/// Adds sequence points for auto-properties and moves startup code classes
/// below their owning class in OpenCover reports.
pub struct OpenCoverPreprocessor {
    searcher: ElementSearcher,
}

impl OpenCoverPreprocessor {
    pub fn new(searcher: ElementSearcher) -> Self {
        Self { searcher }
    }
}

impl Preprocessor for OpenCoverPreprocessor {
    fn preprocess(&mut self, document: &mut CoverageDocument) -> PreprocessStats {
        let mut stats = PreprocessStats::default();
        let searcher = &mut self.searcher;
        document.root.for_each_named_mut("Module", &mut |module| {
            stats.add(add_auto_property_coverage(searcher, module));
            stats.reattached += reattach_startup_code(module);
            searcher.reset_common_index();
        });
        stats
    }
}

struct UnexecutedProperty {
    path: Vec<usize>,
    element: SourceElement,
    candidate_ids: Vec<String>,
}

fn add_auto_property_coverage(
    searcher: &mut ElementSearcher,
    module: &mut Element,
) -> PreprocessStats {
    module.ensure_child("Files");
    let Some(files_index) = module.children.iter().position(|c| c.name == "Files") else {
        return PreprocessStats::default();
    };

    let mut files: FileRegistry = module.children[files_index]
        .children_named("File")
        .filter_map(|f| Some((f.attr("uid")?.to_string(), f.attr("fullPath")?.to_string())))
        .collect();

    let properties = unexecuted_properties(module);
    let mut synthesized = 0;
    for property in &properties {
        let mut sink = TreeSink {
            root: &mut *module,
            target: &property.path,
            files_container: &[files_index],
            update: update_property,
            register: register_file,
        };
        if searcher.search(&property.element, &mut files, &property.candidate_ids, &mut sink) {
            synthesized += 1;
        }
    }

    if !properties.is_empty() {
        debug!(
            "Added coverage of {} of {} auto-properties in module {}",
            synthesized,
            properties.len(),
            module.child_text("ModuleName").unwrap_or_default()
        );
    }

    PreprocessStats {
        synthesis_candidates: properties.len(),
        synthesized,
        ..Default::default()
    }
}

/// Getters and setters with an empty `SequencePoints` list, in classes that
/// are neither compiler generated nor nested.
fn unexecuted_properties(module: &Element) -> Vec<UnexecutedProperty> {
    let mut properties = Vec::new();
    for class_path in paths_of(module, &["Classes", "Class"]) {
        let Some(class) = module.at_path(&class_path) else {
            continue;
        };
        let full_name = class.child_text("FullName").unwrap_or_default();
        if full_name.contains("__") || full_name.contains('<') || full_name.contains('/') {
            continue;
        }

        for methods_path in paths_of(class, &["Methods"]) {
            let Some(methods) = class.at_path(&methods_path) else {
                continue;
            };
            let candidate_ids = distinct(
                methods
                    .children_named("Method")
                    .filter_map(|m| m.child("FileRef")?.attr("uid"))
                    .map(str::to_string),
            );

            for (index, method) in methods.children.iter().enumerate() {
                if method.name != "Method" || !is_unexecuted_property(method) {
                    continue;
                }
                let Some(name) = method
                    .child_text("Name")
                    .and_then(|n| METHOD_NAME_RE.captures(n.trim()))
                    .and_then(|c| c.name("name"))
                else {
                    continue;
                };

                let mut path = class_path.clone();
                path.extend(&methods_path);
                path.push(index);
                properties.push(UnexecutedProperty {
                    path,
                    element: SourceElement::property(full_name, name.as_str()),
                    candidate_ids: candidate_ids.clone(),
                });
            }
        }
    }
    properties
}

fn is_unexecuted_property(method: &Element) -> bool {
    (method.attr_is("isGetter", "true") || method.attr_is("isSetter", "true"))
        && method.attr("skippedDueTo").is_none()
        && method
            .child("SequencePoints")
            .is_some_and(|points| points.children.is_empty())
}

fn update_property(method: &mut Element, position: SourceElementPosition, file_id: &str) {
    let visits = method
        .child("MethodPoint")
        .and_then(|p| p.attr("vc"))
        .unwrap_or("0")
        .to_string();

    method.children.push(Element::new("FileRef").with_attr("uid", file_id));
    method.ensure_child("SequencePoints").children.push(
        Element::new("SequencePoint")
            .with_attr("vc", visits)
            .with_attr("sl", position.start())
            .with_attr("fileid", file_id),
    );
}

fn register_file(files: &mut Element, file_id: &str, path: &str) {
    files.children.push(
        Element::new("File")
            .with_attr("uid", file_id)
            .with_attr("fullPath", path),
    );
}

/// Methods that reference a source file.
fn located_methods(class: &Element) -> impl Iterator<Item = &Element> {
    class
        .children_named("Methods")
        .flat_map(|methods| methods.children_named("Method"))
        .filter(|method| method.child("FileRef").is_some())
}

fn file_ids(class: &&Element) -> Vec<String> {
    located_methods(class)
        .filter_map(|m| m.child("FileRef")?.attr("uid"))
        .map(str::to_string)
        .collect()
}

fn lines(class: &&Element) -> Vec<u32> {
    located_methods(class)
        .flat_map(|m| m.children_named("SequencePoints"))
        .flat_map(|points| points.children_named("SequencePoint"))
        .filter_map(|point| super::attr_u32(point, "sl"))
        .collect()
}

/// Rename every startup code class to `Owner/StartupName`. Returns the number
/// of renamed classes.
fn reattach_startup_code(module: &mut Element) -> usize {
    let renames: Vec<(Vec<usize>, String)> = {
        let mut startup = Vec::new();
        let mut user = Vec::new();
        for path in paths_of(module, &["Classes", "Class"]) {
            let Some(class) = module.at_path(&path) else {
                continue;
            };
            let name = class.child_text("FullName").unwrap_or_default();
            if !is_startup_code(name) {
                user.push(class);
            } else if name.contains('/') {
                startup.push((path, class));
            }
        }

        let startup_classes: Vec<&Element> = startup.iter().map(|(_, class)| *class).collect();
        find_owners(&startup_classes, &user, file_ids, lines)
            .into_iter()
            .zip(startup)
            .filter_map(|(owner, (path, class))| {
                let owner_name = user[owner?].child_text("FullName").unwrap_or_default();
                let name = class.child_text("FullName").unwrap_or_default();
                Some((path, format!("{}/{}", owner_name, name)))
            })
            .collect()
    };

    for (path, name) in &renames {
        if let Some(class) = module.at_path_mut(path) {
            class.ensure_child("FullName").text = name.clone();
        }
    }
    renames.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ClassIndexFactory, ClassLookup};
    use std::sync::Arc;

    const FOO: &str = "using System;

namespace Ns
{
    public class Foo
    {
        public void Run()
        {
            Console.WriteLine();
        }

        public int Bar { get; set; }
    }
}
";

    fn report(foo_path: &str) -> String {
        format!(
            r#"<CoverageSession>
  <Modules>
    <Module hash="A">
      <ModuleName>App</ModuleName>
      <Files>
        <File uid="1" fullPath="{foo_path}" />
      </Files>
      <Classes>
        <Class>
          <FullName>Ns.Foo</FullName>
          <Methods>
            <Method visited="true">
              <Name>System.Void Ns.Foo::Run()</Name>
              <FileRef uid="1" />
              <SequencePoints>
                <SequencePoint vc="1" sl="8" />
              </SequencePoints>
              <MethodPoint vc="1" />
            </Method>
            <Method isGetter="true">
              <Name>System.Int32 Ns.Foo::get_Bar()</Name>
              <SequencePoints />
              <MethodPoint vc="3" />
            </Method>
            <Method isGetter="true" skippedDueTo="Filter">
              <Name>System.Int32 Ns.Foo::get_Skipped()</Name>
              <SequencePoints />
            </Method>
          </Methods>
        </Class>
      </Classes>
    </Module>
  </Modules>
</CoverageSession>"#
        )
    }

    fn preprocessor() -> OpenCoverPreprocessor {
        let factory = Arc::new(ClassIndexFactory::new());
        let global: Arc<dyn ClassLookup> = Arc::new(factory.index_for_roots(&[]));
        OpenCoverPreprocessor::new(ElementSearcher::new(factory, global))
    }

    #[test]
    fn test_auto_property_gets_sequence_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Foo.cs");
        std::fs::write(&path, FOO).unwrap();

        let xml = report(&path.to_string_lossy());
        let mut doc = CoverageDocument::parse(xml.as_bytes()).unwrap();
        let stats = preprocessor().preprocess(&mut doc);

        assert_eq!(stats.synthesis_candidates, 1);
        assert_eq!(stats.synthesized, 1);

        let getter = doc
            .root
            .descendants("Method")
            .into_iter()
            .find(|m| m.child_text("Name").is_some_and(|n| n.contains("get_Bar")))
            .unwrap();
        assert_eq!(getter.child("FileRef").unwrap().attr("uid"), Some("1"));
        let point = &getter.child("SequencePoints").unwrap().children[0];
        assert_eq!(point.attr("vc"), Some("3"));
        assert_eq!(point.attr("sl"), Some("12"));
        assert_eq!(point.attr("fileid"), Some("1"));

        // No new file was registered.
        assert_eq!(doc.root.descendants("File").len(), 1);
    }

    #[test]
    fn test_missing_declaration_leaves_report_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Foo.cs");
        std::fs::write(&path, "namespace Ns { public class Foo { } }").unwrap();

        let xml = report(&path.to_string_lossy());
        let mut doc = CoverageDocument::parse(xml.as_bytes()).unwrap();
        let before = doc.clone();
        let stats = preprocessor().preprocess(&mut doc);

        assert_eq!(stats.synthesized, 0);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_missing_files_container_is_created() {
        let xml = "<CoverageSession><Modules><Module><Classes /></Module></Modules></CoverageSession>";
        let mut doc = CoverageDocument::parse(xml.as_bytes()).unwrap();
        preprocessor().preprocess(&mut doc);
        assert_eq!(doc.root.descendants("Files").len(), 1);
    }

    fn class(name: &str, file: &str, line: u32) -> String {
        format!(
            r#"<Class><FullName>{}</FullName><Methods><Method><FileRef uid="{}" /><SequencePoints><SequencePoint sl="{}" /></SequencePoints></Method></Methods></Class>"#,
            name.replace('<', "&lt;").replace('>', "&gt;"),
            file,
            line
        )
    }

    #[test]
    fn test_startup_code_is_renamed_below_owner() {
        let xml = format!(
            "<CoverageSession><Modules><Module><Files /><Classes>{}{}{}{}</Classes></Module></Modules></CoverageSession>",
            class("Ns.First", "1", 10),
            class("Ns.Second", "1", 40),
            class("Ns.Third", "1", 60),
            class("<StartupCode$App>.$Program/Closure", "1", 50),
        );
        let mut doc = CoverageDocument::parse(xml.as_bytes()).unwrap();
        let stats = preprocessor().preprocess(&mut doc);
        assert_eq!(stats.reattached, 1);

        let names: Vec<&str> = doc
            .root
            .descendants("FullName")
            .into_iter()
            .map(|n| n.text.as_str())
            .collect();
        assert_eq!(names[3], "Ns.Second/<StartupCode$App>.$Program/Closure");

        // Running again changes nothing.
        let before = doc.clone();
        let stats = preprocessor().preprocess(&mut doc);
        assert_eq!(stats.reattached, 0);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_startup_code_without_separator_is_ignored() {
        let xml = format!(
            "<CoverageSession><Modules><Module><Files /><Classes>{}{}</Classes></Module></Modules></CoverageSession>",
            class("Ns.First", "1", 10),
            class("<StartupCode$App>", "1", 50),
        );
        let mut doc = CoverageDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(preprocessor().preprocess(&mut doc).reattached, 0);
    }
}
