//! SVG document tree.
//!
//! The tree is owned and mutated in place by the passes. Attribute order is
//! insertion order, which keeps serialization deterministic.

use std::collections::HashMap;

/// Namespace URI bound to the `xml` prefix by definition.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace URI of the `xlink` vocabulary.
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// A complete SVG document.
#[derive(Debug, Clone)]
pub struct Document {
    /// XML declaration (e.g., `<?xml version="1.0" encoding="UTF-8"?>`)
    pub xml_declaration: Option<XmlDeclaration>,
    /// DOCTYPE declaration
    pub doctype: Option<String>,
    /// The root SVG element
    pub root: Element,
}

/// XML declaration attributes.
#[derive(Debug, Clone)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
}

/// An SVG/XML element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element name with optional prefix (e.g., "svg", "sodipodi:namedview")
    pub name: QName,
    /// Attributes on this element
    pub attributes: Vec<Attribute>,
    /// Child nodes
    pub children: Vec<Node>,
}

/// A qualified name (possibly with namespace prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace prefix (e.g., "svg", "xlink")
    pub prefix: Option<String>,
    /// Local name (e.g., "rect", "href")
    pub local: String,
}

impl QName {
    pub fn new(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            local: local.into(),
        }
    }

    /// Parse a qualified name from a string like "prefix:local" or just "local".
    pub fn parse(s: &str) -> Self {
        if let Some((prefix, local)) = s.split_once(':') {
            Self::with_prefix(prefix, local)
        } else {
            Self::new(s)
        }
    }

    /// Check if this is a namespace declaration (xmlns or xmlns:prefix).
    pub fn is_xmlns(&self) -> bool {
        self.prefix.as_deref() == Some("xmlns") || (self.prefix.is_none() && self.local == "xmlns")
    }

    /// Check if this name equals the given "prefix:local" or "local" string.
    pub fn matches(&self, full: &str) -> bool {
        match (&self.prefix, full.split_once(':')) {
            (Some(p), Some((fp, fl))) => p == fp && self.local == fl,
            (None, None) => self.local == full,
            _ => false,
        }
    }

    /// Get the full name as a string.
    pub fn full_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }
}

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    /// Build an attribute from a full name such as `"fill"` or `"xlink:href"`.
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: QName::parse(name),
            value: value.into(),
        }
    }
}

/// A node in the SVG tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An element node
    Element(Element),
    /// A text node
    Text(String),
    /// A comment node
    Comment(String),
    /// A CDATA section
    CData(String),
    /// A processing instruction (e.g., `<?xml-stylesheet ... ?>`)
    ProcessingInstruction { target: String, content: Option<String> },
}

impl Node {
    /// True for text nodes that contain nothing but whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: QName::parse(name),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Get an attribute value by full name (`"fill"`, `"xlink:href"`).
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.matches(name))
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name.matches(name))
    }

    /// Set an attribute value, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        if let Some(attr) = self.attributes.iter_mut().find(|a| a.name.matches(name)) {
            attr.value = value.into();
        } else {
            self.attributes.push(Attribute::new(name, value));
        }
    }

    /// Remove an attribute by full name, returning its value.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|a| a.name.matches(name))?;
        Some(self.attributes.remove(idx).value)
    }

    /// Check if this element has a specific unprefixed tag name.
    pub fn is(&self, name: &str) -> bool {
        self.name.prefix.is_none() && self.name.local == name
    }

    /// Get all namespace declarations on this element.
    pub fn namespaces(&self) -> HashMap<Option<&str>, &str> {
        let mut ns = HashMap::new();
        for attr in &self.attributes {
            if attr.name.local == "xmlns" && attr.name.prefix.is_none() {
                ns.insert(None, attr.value.as_str());
            } else if attr.name.prefix.as_deref() == Some("xmlns") {
                ns.insert(Some(attr.name.local.as_str()), attr.value.as_str());
            }
        }
        ns
    }

    /// Iterate over child elements only (skip text, comments, etc.).
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Iterate over child elements mutably.
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Concatenated text of all descendant text and CDATA nodes.
    pub fn text_content(&self) -> String {
        fn collect(elem: &Element, out: &mut String) {
            for child in &elem.children {
                match child {
                    Node::Text(t) | Node::CData(t) => out.push_str(t),
                    Node::Element(e) => collect(e, out),
                    _ => {}
                }
            }
        }
        let mut out = String::new();
        collect(self, &mut out);
        out
    }

    /// Whether any direct text child holds non-whitespace content.
    pub fn has_significant_text(&self) -> bool {
        self.children
            .iter()
            .any(|n| matches!(n, Node::Text(t) | Node::CData(t) if !t.trim().is_empty()))
    }
}

impl Document {
    /// Recursively visit all elements in the document.
    pub fn for_each_element<'a>(&'a self, mut f: impl FnMut(&'a Element)) {
        fn visit<'a>(elem: &'a Element, f: &mut impl FnMut(&'a Element)) {
            f(elem);
            for child in elem.child_elements() {
                visit(child, f);
            }
        }
        visit(&self.root, &mut f);
    }

    /// Recursively visit all elements mutably.
    pub fn for_each_element_mut(&mut self, mut f: impl FnMut(&mut Element)) {
        fn visit(elem: &mut Element, f: &mut impl FnMut(&mut Element)) {
            f(elem);
            for child in elem.child_elements_mut() {
                visit(child, f);
            }
        }
        visit(&mut self.root, &mut f);
    }

    /// Whether any element satisfies the predicate.
    pub fn any_element(&self, mut f: impl FnMut(&Element) -> bool) -> bool {
        fn visit(elem: &Element, f: &mut impl FnMut(&Element) -> bool) -> bool {
            f(elem) || elem.child_elements().any(|c| visit(c, f))
        }
        visit(&self.root, &mut f)
    }

    /// Find the first element (document order) whose `id` equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        fn visit<'a>(elem: &'a Element, id: &str) -> Option<&'a Element> {
            if elem.get_attr("id") == Some(id) {
                return Some(elem);
            }
            elem.child_elements().find_map(|c| visit(c, id))
        }
        visit(&self.root, id)
    }
}

/// Prefix bindings in scope at some element, resolved from the element's
/// own and its ancestors' `xmlns*` declarations.
#[derive(Debug, Clone)]
pub struct NamespaceScope {
    bindings: HashMap<Option<String>, String>,
}

impl Default for NamespaceScope {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(Some("xml".to_string()), XML_NS.to_string());
        Self { bindings }
    }
}

impl NamespaceScope {
    /// The scope seen by `elem`'s attributes, given the scope of its parent.
    pub fn enter(&self, elem: &Element) -> Self {
        let declared = elem.namespaces();
        if declared.is_empty() {
            return self.clone();
        }
        let mut bindings = self.bindings.clone();
        for (prefix, uri) in declared {
            bindings.insert(prefix.map(str::to_string), uri.to_string());
        }
        Self { bindings }
    }

    /// Namespace URI bound to `prefix`, if declared.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .get(&Some(prefix.to_string()))
            .map(String::as_str)
    }

    /// Whether `prefix` is declared (the default namespace is `""`).
    pub fn declares(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            self.bindings.contains_key(&None)
        } else {
            self.resolve(prefix).is_some()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_matching() {
        let name = QName::parse("xlink:href");
        assert!(name.matches("xlink:href"));
        assert!(!name.matches("href"));
        assert!(QName::parse("href").matches("href"));
    }

    #[test]
    fn test_attribute_order_is_insertion_order() {
        let mut elem = Element::new("rect");
        elem.set_attr("y", "2");
        elem.set_attr("x", "1");
        elem.set_attr("y", "3");
        let names: Vec<_> = elem.attributes.iter().map(|a| a.name.full_name()).collect();
        assert_eq!(names, ["y", "x"]);
        assert_eq!(elem.get_attr("y"), Some("3"));
        assert_eq!(elem.remove_attr("y").as_deref(), Some("3"));
        assert!(!elem.has_attr("y"));
    }

    #[test]
    fn test_namespace_scope_inherits_and_overrides() {
        let mut root = Element::new("svg");
        root.set_attr("xmlns:a", "urn:one");
        let mut child = Element::new("g");
        child.set_attr("xmlns:a", "urn:two");

        let outer = NamespaceScope::default().enter(&root);
        let inner = outer.enter(&child);
        assert_eq!(outer.resolve("a"), Some("urn:one"));
        assert_eq!(inner.resolve("a"), Some("urn:two"));
        assert!(inner.declares("xml"));
        assert!(!inner.declares("b"));
    }
}
