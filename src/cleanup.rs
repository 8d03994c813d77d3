//! Cleanup passes. Each pass is total: it never fails and leaves anything
//! it does not understand alone.

use std::collections::{HashMap, HashSet};

use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::ast::{Document, Element, NamespaceScope, Node, XLINK_NS};
use crate::attrs::{DEFAULT_VALUES, OPACITY_DROP_THRESHOLD, ROOT_DEFAULTS};
use crate::number::parse_leading_number;
use crate::serialize::serialize_element;

/// Namespace URIs of editor bookkeeping vocabularies.
const EDITOR_NAMESPACES: &[&str] = &[
    "http://www.inkscape.org/namespaces/inkscape",
    "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd",
];

const EDITOR_PREFIXES: &[&str] = &["inkscape", "sodipodi"];

const TEXT_STROKE_ATTRS: &[&str] = &[
    "stroke",
    "stroke-width",
    "stroke-opacity",
    "stroke-dasharray",
    "stroke-dashoffset",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
];

static URL_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*(['"]?)#([^'")\s]+)(['"]?)\s*\)"#).expect("valid regex")
});

/// Remove attributes restating their initial value, and near-opaque opacity.
pub fn remove_default_values(doc: &mut Document) {
    doc.for_each_element_mut(|elem| {
        elem.attributes.retain(|attr| {
            let name = attr.name.full_name();
            !DEFAULT_VALUES
                .iter()
                .any(|(n, values)| *n == name && values.contains(&attr.value.as_str()))
        });

        if elem
            .get_attr("opacity")
            .and_then(parse_leading_number)
            .is_some_and(|o| o >= OPACITY_DROP_THRESHOLD)
        {
            elem.remove_attr("opacity");
        }
    });
}

/// Remove `font-family` and/or `font-size` from every element.
pub fn remove_font_attributes(doc: &mut Document, family: bool, size: bool) {
    doc.for_each_element_mut(|elem| {
        if family {
            elem.remove_attr("font-family");
        }
        if size {
            elem.remove_attr("font-size");
        }
    });
}

/// Replace every `<tspan>` with its text content.
pub fn flatten_tspans(doc: &mut Document) {
    flatten_tspans_in(&mut doc.root);
}

fn flatten_tspans_in(elem: &mut Element) {
    if !elem.children.iter().any(|n| matches!(n, Node::Element(e) if e.is("tspan"))) {
        for child in elem.child_elements_mut() {
            flatten_tspans_in(child);
        }
        return;
    }

    let mut children: Vec<Node> = Vec::with_capacity(elem.children.len());
    for node in std::mem::take(&mut elem.children) {
        let node = match node {
            Node::Element(e) if e.is("tspan") => {
                let text = e.text_content();
                if text.is_empty() {
                    continue;
                }
                Node::Text(text)
            }
            Node::Element(mut e) => {
                flatten_tspans_in(&mut e);
                Node::Element(e)
            }
            other => other,
        };

        // Keep runs of text as a single node.
        if let (Some(Node::Text(prev)), Node::Text(next)) = (children.last_mut(), &node) {
            prev.push_str(next);
        } else {
            children.push(node);
        }
    }
    elem.children = children;
}

/// Remove `<style>` elements and every `style` and `class` attribute.
pub fn remove_styling(doc: &mut Document) {
    remove_styling_in(&mut doc.root);
}

fn remove_styling_in(elem: &mut Element) {
    elem.remove_attr("style");
    elem.remove_attr("class");
    elem.children
        .retain(|node| !matches!(node, Node::Element(e) if e.is("style")));
    for child in elem.child_elements_mut() {
        remove_styling_in(child);
    }
}

/// Remove editor bookkeeping elements, attributes and namespace declarations.
pub fn strip_editor_data(doc: &mut Document) {
    let mut prefixes: HashSet<String> = EDITOR_PREFIXES.iter().map(|p| p.to_string()).collect();
    doc.for_each_element(|elem| {
        for (prefix, uri) in elem.namespaces() {
            if let Some(prefix) = prefix
                && EDITOR_NAMESPACES.contains(&uri)
            {
                prefixes.insert(prefix.to_string());
            }
        }
    });

    strip_editor_data_in(&mut doc.root, &prefixes);
}

fn strip_editor_data_in(elem: &mut Element, prefixes: &HashSet<String>) {
    elem.children.retain(|node| match node {
        Node::Element(e) => !e.name.prefix.as_ref().is_some_and(|p| prefixes.contains(p)),
        _ => true,
    });

    elem.attributes.retain(|attr| {
        let name = &attr.name;
        let declares_editor = name.prefix.as_deref() == Some("xmlns") && prefixes.contains(&name.local);
        let editor_attr = name.prefix.as_ref().is_some_and(|p| prefixes.contains(p));
        !declares_editor && !editor_attr
    });

    for child in elem.child_elements_mut() {
        strip_editor_data_in(child, prefixes);
    }
}

/// Remove stroke styling from text, where it thickens glyphs.
pub fn remove_stroke_from_text(doc: &mut Document) {
    doc.for_each_element_mut(|elem| {
        if elem.is("text") || elem.is("tspan") {
            elem.attributes
                .retain(|a| !TEXT_STROKE_ATTRS.contains(&a.name.full_name().as_str()));
        }
    });
}

fn uses_xlink(doc: &Document) -> bool {
    doc.any_element(|e| {
        e.attributes
            .iter()
            .any(|a| a.name.prefix.as_deref() == Some("xlink"))
    })
}

/// Declare `xmlns:xlink` on the root when an `xlink:` attribute is used
/// without a declaration in scope.
pub fn normalize_namespaces(doc: &mut Document) {
    fn undeclared(elem: &Element, scope: &NamespaceScope) -> bool {
        let scope = scope.enter(elem);
        let missing = elem
            .attributes
            .iter()
            .any(|a| a.name.prefix.as_deref() == Some("xlink") && !scope.declares("xlink"));
        missing || elem.child_elements().any(|c| undeclared(c, &scope))
    }

    if undeclared(&doc.root, &NamespaceScope::default()) {
        debug!("declaring missing xlink namespace");
        doc.root.set_attr("xmlns:xlink", XLINK_NS);
    }
}

/// Drop the root `xmlns:xlink` declaration when nothing uses the prefix.
pub fn remove_unused_xlink(doc: &mut Document) {
    if !uses_xlink(doc) {
        doc.root.remove_attr("xmlns:xlink");
    }
}

/// Remove prefixed attributes whose prefix is not declared in scope.
pub fn remove_dangling_namespaced_attributes(doc: &mut Document) {
    fn visit(elem: &mut Element, scope: &NamespaceScope) {
        let scope = scope.enter(elem);
        elem.attributes.retain(|attr| match attr.name.prefix.as_deref() {
            None | Some("xmlns") | Some("xml") => true,
            Some(prefix) => scope.declares(prefix),
        });
        for child in elem.child_elements_mut() {
            visit(child, &scope);
        }
    }
    visit(&mut doc.root, &NamespaceScope::default());
}

/// Remove root attributes that restate the SVG default.
pub fn remove_root_defaults(doc: &mut Document) {
    for (name, value) in ROOT_DEFAULTS {
        if doc.root.get_attr(name).is_some_and(|v| v.trim() == *value) {
            doc.root.remove_attr(name);
        }
    }
}

/// Remove duplicate definitions and point references at the kept copy.
///
/// Children of every `<defs>` are compared by their serialization without
/// `id`. The first copy is kept; when it has no id of its own it takes over
/// the first duplicate's id. A `<defs>` left empty is removed.
///
/// Rewriting a reference can make two definitions that pointed at different
/// duplicates identical, so rounds repeat until nothing is removed.
pub fn dedupe_defs(doc: &mut Document) {
    while dedupe_round(doc) > 0 {}
    prune_empty_defs(&mut doc.root);
}

/// One comparison pass. Returns how many definitions were removed.
fn dedupe_round(doc: &mut Document) -> usize {
    let mut seen: HashMap<String, Option<String>> = HashMap::new();
    let mut renames: HashMap<String, String> = HashMap::new();
    let mut adopt: HashMap<String, String> = HashMap::new();

    let removed = dedupe_in(&mut doc.root, &mut seen, &mut renames, &mut adopt);

    if !adopt.is_empty() {
        assign_adopted_ids(&mut doc.root, &mut adopt);
    }

    if !renames.is_empty() {
        debug!("removed {} duplicate definitions", renames.len());
        rewrite_references(&mut doc.root, &renames);
    }
    removed
}

fn dedupe_in(
    elem: &mut Element,
    seen: &mut HashMap<String, Option<String>>,
    renames: &mut HashMap<String, String>,
    adopt: &mut HashMap<String, String>,
) -> usize {
    let mut removed = 0;
    if elem.is("defs") {
        let mut kept = Vec::with_capacity(elem.children.len());
        for node in std::mem::take(&mut elem.children) {
            let Node::Element(child) = node else {
                kept.push(node);
                continue;
            };

            let mut unnamed = child.clone();
            let id = unnamed.remove_attr("id");
            let signature = serialize_element(&unnamed);

            match seen.get_mut(&signature) {
                Some(first_id) => {
                    removed += 1;
                    let Some(dup_id) = id else {
                        continue;
                    };
                    match first_id.clone() {
                        Some(first) => {
                            renames.insert(dup_id, first);
                        }
                        None => {
                            *first_id = Some(dup_id.clone());
                            adopt.insert(signature, dup_id);
                        }
                    }
                }
                None => {
                    seen.insert(signature, id);
                    kept.push(Node::Element(child));
                }
            }
        }
        elem.children = kept;
        return removed;
    }

    for child in elem.child_elements_mut() {
        removed += dedupe_in(child, seen, renames, adopt);
    }
    removed
}

fn prune_empty_defs(elem: &mut Element) {
    elem.children.retain(|node| match node {
        Node::Element(e) => !(e.is("defs") && e.children.is_empty() && !e.has_attr("id")),
        _ => true,
    });
    for child in elem.child_elements_mut() {
        prune_empty_defs(child);
    }
}

/// Give id-less kept copies the id of their first removed duplicate.
fn assign_adopted_ids(elem: &mut Element, adopt: &mut HashMap<String, String>) {
    if elem.is("defs") {
        for child in elem.child_elements_mut() {
            if child.has_attr("id") {
                continue;
            }
            if let Some(id) = adopt.remove(&serialize_element(child)) {
                child.set_attr("id", id);
            }
        }
        return;
    }
    for child in elem.child_elements_mut() {
        assign_adopted_ids(child, adopt);
    }
}

fn rewrite_references(elem: &mut Element, renames: &HashMap<String, String>) {
    for attr in &mut elem.attributes {
        if let Some(target) = attr.value.trim().strip_prefix('#')
            && let Some(new) = renames.get(target)
        {
            attr.value = format!("#{}", new);
            continue;
        }
        if attr.value.contains("url(") {
            attr.value = rewrite_urls(&attr.value, renames);
        }
    }

    let is_style = elem.is("style");
    for child in &mut elem.children {
        match child {
            Node::Element(e) => rewrite_references(e, renames),
            Node::Text(t) | Node::CData(t) if is_style => *t = rewrite_urls(t, renames),
            _ => {}
        }
    }
}

fn rewrite_urls(value: &str, renames: &HashMap<String, String>) -> String {
    URL_REF
        .replace_all(value, |caps: &Captures| match renames.get(&caps[2]) {
            Some(new) => format!("url({}#{}{})", &caps[1], new, &caps[3]),
            None => caps[0].to_string(),
        })
        .into_owned()
}
