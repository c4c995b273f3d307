//! Mutable in-memory XML tree for one coverage report.
//!
//! Preprocessing rewrites reports in place (renaming classes, moving
//! subtrees, adding synthesized sequence points), which a streaming reader
//! cannot do. The whole document is therefore read into an [`Element`] tree
//! with quick-xml and written back out after the passes have run.
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::{CovnormError, Result};

/// One XML element with its attributes, child elements and text content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attr(mut self, key: &str, value: impl ToString) -> Self {
        self.set_attr(key, value);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value equals `value`, ignoring ASCII case (`"True"` == `"true"`).
    pub fn attr_is(&self, key: &str, value: &str) -> bool {
        self.attr(key).is_some_and(|v| v.eq_ignore_ascii_case(value))
    }

    /// Set or overwrite an attribute, keeping the original attribute order.
    pub fn set_attr(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Text of the first child named `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Child named `name`, appended first if it does not exist yet.
    pub fn ensure_child(&mut self, name: &str) -> &mut Element {
        let index = match self.children.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.children.push(Element::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn children_named_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.children.iter_mut().filter(move |c| c.name == name)
    }

    /// All elements named `name` below this one, in document order.
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        collect_descendants(self, name, &mut found);
        found
    }

    /// Element reached by following child indexes from this one.
    pub fn at_path(&self, path: &[usize]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |element, &index| element.children.get(index))
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        path.iter()
            .try_fold(self, |element, &index| element.children.get_mut(index))
    }

    /// Apply `f` to every element named `name` below this one.
    ///
    /// Matches are not searched inside a matched element, so `f` may freely
    /// restructure the subtree it is given.
    pub fn for_each_named_mut<F>(&mut self, name: &str, f: &mut F)
    where
        F: FnMut(&mut Element),
    {
        for child in &mut self.children {
            if child.name == name {
                f(child);
            } else {
                child.for_each_named_mut(name, f);
            }
        }
    }
}

fn collect_descendants<'a>(element: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
    for child in &element.children {
        if child.name == name {
            found.push(child);
        }
        collect_descendants(child, name, found);
    }
}

/// A parsed report document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageDocument {
    pub root: Element,
}

impl CoverageDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn parse(input: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Err(source) => {
                    return Err(CovnormError::Xml {
                        source,
                        position: reader.buffer_position(),
                    })
                }
                Ok(Event::Eof) => break,
                Ok(Event::Start(ref e)) => {
                    let element = start_element(e).map_err(|source| CovnormError::Xml {
                        source,
                        position: reader.buffer_position(),
                    })?;
                    stack.push(element);
                }
                Ok(Event::Empty(ref e)) => {
                    let element = start_element(e).map_err(|source| CovnormError::Xml {
                        source,
                        position: reader.buffer_position(),
                    })?;
                    attach(&mut stack, &mut root, element);
                }
                Ok(Event::End(_)) => {
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element);
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let text = e.unescape().map_err(|source| CovnormError::Xml {
                        source,
                        position: reader.buffer_position(),
                    })?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(_) => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(CovnormError::Parse(format!(
                "Unclosed element <{}>",
                stack[stack.len() - 1].name
            )));
        }
        root.map(Self::new)
            .ok_or_else(|| CovnormError::Parse("Document has no root element".to_string()))
    }

    /// Serialize the document, including an XML declaration.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let xml_err = |source| CovnormError::Xml {
            source,
            position: 0,
        };
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_err)?;
        write_element(&mut writer, &self.root).map_err(xml_err)?;
        Ok(writer.into_inner())
    }
}

fn start_element(e: &BytesStart) -> std::result::Result<Element, quick_xml::Error> {
    let mut element = Element::new(&String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
) -> std::result::Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if !element.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="utf-8"?>
<CoverageSession>
  <Modules>
    <Module hash="1">
      <ModuleName>App</ModuleName>
      <Files><File uid="1" fullPath="C:\src\Foo.cs" /></Files>
      <Classes>
        <Class><FullName>Ns.Foo&lt;T&gt;</FullName></Class>
      </Classes>
    </Module>
  </Modules>
</CoverageSession>"#;

    #[test]
    fn test_parse_tree() {
        let doc = CoverageDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.root.name, "CoverageSession");

        let modules = doc.root.descendants("Module");
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].attr("hash"), Some("1"));
        assert_eq!(modules[0].child_text("ModuleName"), Some("App"));

        let file = &doc.root.descendants("File")[0];
        assert_eq!(file.attr("fullPath"), Some("C:\\src\\Foo.cs"));

        let class = &doc.root.descendants("Class")[0];
        assert_eq!(class.child_text("FullName"), Some("Ns.Foo<T>"));
    }

    #[test]
    fn test_write_and_reparse() {
        let mut doc = CoverageDocument::parse(SAMPLE).unwrap();
        doc.root.for_each_named_mut("Module", &mut |module| {
            module.set_attr("hash", 2);
            module
                .ensure_child("Files")
                .children
                .push(Element::new("File").with_attr("uid", "7").with_attr("fullPath", "a&b.cs"));
        });

        let xml = doc.to_xml().unwrap();
        let text = String::from_utf8(xml.clone()).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("a&amp;b.cs"));

        let reparsed = CoverageDocument::parse(&xml).unwrap();
        assert_eq!(reparsed.root.descendants("Module")[0].attr("hash"), Some("2"));
        assert_eq!(reparsed.root.descendants("File").len(), 2);
        assert_eq!(
            reparsed.root.descendants("FullName")[0].text,
            "Ns.Foo<T>"
        );
    }

    #[test]
    fn test_malformed_documents() {
        assert!(CoverageDocument::parse(b"").is_err());
        assert!(CoverageDocument::parse(b"<a><b></a>").is_err());
        assert!(CoverageDocument::parse(b"<a><b>").is_err());
    }

    #[test]
    fn test_ensure_child_and_attr_is() {
        let mut e = Element::new("Method").with_attr("isGetter", "True");
        assert!(e.attr_is("isGetter", "true"));
        assert!(!e.attr_is("isSetter", "true"));
        e.ensure_child("SequencePoints");
        e.ensure_child("SequencePoints");
        assert_eq!(e.children.len(), 1);
    }

    #[test]
    fn test_paths() {
        let mut root = Element::new("a").with_child(
            Element::new("b")
                .with_child(Element::new("c"))
                .with_child(Element::new("d")),
        );
        assert_eq!(root.at_path(&[0, 1]).unwrap().name, "d");
        assert_eq!(root.at_path(&[]).unwrap().name, "a");
        assert!(root.at_path(&[0, 2]).is_none());

        root.at_path_mut(&[0, 0]).unwrap().set_attr("x", 1);
        assert_eq!(root.descendants("c")[0].attr("x"), Some("1"));
    }
}
