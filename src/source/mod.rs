//! Locating declarations in source files without compiling them.
//!
//! [`scan`] turns the text of a brace-delimited source file (C#, Java,
//! Kotlin, ...) into a flat list of type and member declarations with
//! their line ranges. [`SourceAnalyzer`] reads files from disk and answers
//! "which classes does this file declare" and "where is this member".

mod analyzer;
pub mod scan;

use std::sync::LazyLock;

use regex::Regex;

pub use analyzer::SourceAnalyzer;

/// Matches generic arity suffixes such as `` `1 `` in `Ns.Repository`1`.
static GENERIC_ARITY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`\d+").unwrap());

/// Start and end line of a declaration, both 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceElementPosition {
    start: u32,
    end: u32,
}

impl SourceElementPosition {
    /// Returns `None` unless `1 <= start <= end`.
    pub fn new(start: u32, end: u32) -> Option<Self> {
        if start == 0 || start > end {
            None
        } else {
            Some(Self { start, end })
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }
}

/// A member whose declaration should be found in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceElement {
    /// A property. Accessor prefixes (`get_`, `set_`) are already stripped.
    Property { class_name: String, name: String },
    /// A method or constructor (`.ctor`, `.cctor`). When `parameter_count`
    /// is known it is used to pick between overloads.
    Method {
        class_name: String,
        name: String,
        parameter_count: Option<usize>,
    },
}

impl SourceElement {
    /// Property element from an accessor or property name.
    pub fn property(class_name: &str, name: &str) -> Self {
        let name = name
            .strip_prefix("get_")
            .or_else(|| name.strip_prefix("set_"))
            .unwrap_or(name);
        SourceElement::Property {
            class_name: normalize_class_name(class_name),
            name: name.to_string(),
        }
    }

    pub fn method(class_name: &str, name: &str, parameter_count: Option<usize>) -> Self {
        SourceElement::Method {
            class_name: normalize_class_name(class_name),
            name: name.to_string(),
            parameter_count,
        }
    }

    /// Method element from a PartCover style signature like `void  (int, string)`.
    pub fn method_with_signature(class_name: &str, name: &str, signature: &str) -> Self {
        Self::method(class_name, name, parameter_count_of_signature(signature))
    }

    pub fn class_name(&self) -> &str {
        match self {
            SourceElement::Property { class_name, .. }
            | SourceElement::Method { class_name, .. } => class_name,
        }
    }
}

/// Canonical spelling of a fully-qualified class name: nested classes are
/// separated by `/` and generic arity markers are dropped.
pub fn normalize_class_name(class_name: &str) -> String {
    GENERIC_ARITY_RE
        .replace_all(&class_name.replace('+', "/"), "")
        .into_owned()
}

/// Count the parameters of a signature such as `void  (string, int[])`.
/// Returns `None` when the signature has no parameter list.
fn parameter_count_of_signature(signature: &str) -> Option<usize> {
    let open = signature.find('(')?;
    let close = signature.rfind(')')?;
    if close < open {
        return None;
    }
    let params = signature[open + 1..close].trim();
    if params.is_empty() {
        return Some(0);
    }

    let mut depth = 0i32;
    let mut count = 1;
    for c in params.chars() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => count += 1,
            _ => {}
        }
    }
    Some(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_invariant() {
        assert!(SourceElementPosition::new(0, 3).is_none());
        assert!(SourceElementPosition::new(5, 4).is_none());
        let pos = SourceElementPosition::new(12, 12).unwrap();
        assert_eq!((pos.start(), pos.end()), (12, 12));
    }

    #[test]
    fn test_property_prefix_stripped() {
        let getter = SourceElement::property("Ns.Foo", "get_Bar");
        let setter = SourceElement::property("Ns.Foo", "set_Bar");
        let plain = SourceElement::property("Ns.Foo", "Bar");
        assert_eq!(getter, plain);
        assert_eq!(setter, plain);
    }

    #[test]
    fn test_normalize_class_name() {
        assert_eq!(normalize_class_name("Ns.Outer+Inner"), "Ns.Outer/Inner");
        assert_eq!(normalize_class_name("Ns.Repository`1"), "Ns.Repository");
        assert_eq!(normalize_class_name("Ns.Plain"), "Ns.Plain");
    }

    #[test]
    fn test_parameter_count_of_signature() {
        assert_eq!(parameter_count_of_signature("void  ()"), Some(0));
        assert_eq!(parameter_count_of_signature("void  (int)"), Some(1));
        assert_eq!(
            parameter_count_of_signature(
                "string  (System.Collections.Generic.Dictionary<string, int>, ref int)"
            ),
            Some(2)
        );
        assert_eq!(parameter_count_of_signature("void"), None);
    }
}
