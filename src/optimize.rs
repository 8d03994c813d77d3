//! General-purpose optimization stage.
//!
//! The pipeline treats this stage as a black box that takes SVG text and a
//! plugin list and returns SVG text. [`BuiltinOptimizer`] is the in-crate
//! implementation; other implementations plug in through
//! [`ExternalOptimizer`].

use std::collections::HashSet;

use log::{debug, trace};

use crate::ast::*;
use crate::attrs::{KNOWN_SVG_ATTRS, PRESERVED_NAMES, PRESERVED_PREFIXES, contains_ci};
use crate::cleanup::strip_editor_data;
use crate::error::SvgcrushError;
use crate::parse::parse_svg;
use crate::path::{minify, parse_path};
use crate::preserve::MARKER_ATTR;
use crate::serialize::serialize;

/// Decimal places kept by [`Plugin::ConvertPathData`].
pub const PATH_DATA_PRECISION: u8 = 3;

/// One optimization of the general-purpose stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plugin {
    RemoveDoctype,
    RemoveXmlProcInst,
    RemoveComments,
    /// `<metadata>`, `<title>` and `<desc>`.
    RemoveMetadata,
    RemoveEditorsNsData,
    RemoveHiddenElems,
    RemoveEmptyContainers,
    RemoveEmptyText,
    ConvertColors,
    MinifyStyles,
    /// Unknown attributes and default values. `data-*`, `aria-*`, `role`
    /// and prefixed attributes are never touched.
    RemoveUnknownsAndDefaults,
    /// Groups without attributes only.
    CollapseGroups,
    ConvertPathData,
    RemoveUnusedNs,
    SortAttrs,
}

impl Plugin {
    pub fn name(self) -> &'static str {
        match self {
            Plugin::RemoveDoctype => "removeDoctype",
            Plugin::RemoveXmlProcInst => "removeXMLProcInst",
            Plugin::RemoveComments => "removeComments",
            Plugin::RemoveMetadata => "removeMetadata",
            Plugin::RemoveEditorsNsData => "removeEditorsNSData",
            Plugin::RemoveHiddenElems => "removeHiddenElems",
            Plugin::RemoveEmptyContainers => "removeEmptyContainers",
            Plugin::RemoveEmptyText => "removeEmptyText",
            Plugin::ConvertColors => "convertColors",
            Plugin::MinifyStyles => "minifyStyles",
            Plugin::RemoveUnknownsAndDefaults => "removeUnknownsAndDefaults",
            Plugin::CollapseGroups => "collapseGroups",
            Plugin::ConvertPathData => "convertPathData",
            Plugin::RemoveUnusedNs => "removeUnusedNS",
            Plugin::SortAttrs => "sortAttrs",
        }
    }
}

/// A text-to-text SVG optimizer run with an explicit plugin list.
pub trait ExternalOptimizer: Send + Sync {
    fn optimize(&self, svg: &str, plugins: &[Plugin]) -> Result<String, SvgcrushError>;
}

/// The optimizer shipped with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinOptimizer;

impl ExternalOptimizer for BuiltinOptimizer {
    fn optimize(&self, svg: &str, plugins: &[Plugin]) -> Result<String, SvgcrushError> {
        let mut doc = parse_svg(svg)?;
        for plugin in plugins {
            trace!("running {}", plugin.name());
            apply(&mut doc, *plugin);
        }
        cleanup_whitespace(&mut doc.root);
        Ok(serialize(&doc))
    }
}

/// Apply a single plugin to a parsed document.
pub fn apply(doc: &mut Document, plugin: Plugin) {
    match plugin {
        Plugin::RemoveDoctype => doc.doctype = None,
        Plugin::RemoveXmlProcInst => {
            doc.xml_declaration = None;
            remove_processing_instructions(&mut doc.root);
        }
        Plugin::RemoveComments => remove_comments(&mut doc.root),
        Plugin::RemoveMetadata => remove_metadata(&mut doc.root),
        Plugin::RemoveEditorsNsData => strip_editor_data(doc),
        Plugin::RemoveHiddenElems => remove_hidden(&mut doc.root),
        Plugin::RemoveEmptyContainers => remove_empty(&mut doc.root),
        Plugin::RemoveEmptyText => remove_empty_text(&mut doc.root),
        Plugin::ConvertColors => minify_colors(&mut doc.root),
        Plugin::MinifyStyles => minify_styles(&mut doc.root),
        Plugin::RemoveUnknownsAndDefaults => {
            remove_unknowns_and_defaults(&mut doc.root, &HashSet::new())
        }
        Plugin::CollapseGroups => collapse_groups(&mut doc.root),
        Plugin::ConvertPathData => minify_paths(&mut doc.root, PATH_DATA_PRECISION),
        Plugin::RemoveUnusedNs => remove_unused_namespaces(&mut doc.root),
        Plugin::SortAttrs => doc.for_each_element_mut(sort_attrs),
    }
}

fn remove_processing_instructions(elem: &mut Element) {
    elem.children
        .retain(|node| !matches!(node, Node::ProcessingInstruction { .. }));

    for child in elem.child_elements_mut() {
        remove_processing_instructions(child);
    }
}

/// Remove comment nodes.
fn remove_comments(elem: &mut Element) {
    elem.children
        .retain(|node| !matches!(node, Node::Comment(_)));

    for child in elem.child_elements_mut() {
        remove_comments(child);
    }
}

/// Remove metadata, title and desc.
fn remove_metadata(elem: &mut Element) {
    let metadata_elements = ["metadata", "title", "desc"];

    elem.children.retain(|node| match node {
        Node::Element(e) => !metadata_elements.iter().any(|name| e.is(name)),
        _ => true,
    });

    for child in elem.child_elements_mut() {
        remove_metadata(child);
    }
}

/// Remove hidden elements (display:none, visibility:hidden, opacity:0).
/// Elements with an id may be referenced and are kept.
fn remove_hidden(elem: &mut Element) {
    elem.children.retain(|node| match node {
        Node::Element(e) => e.has_attr("id") || !is_hidden(e),
        _ => true,
    });

    for child in elem.child_elements_mut() {
        remove_hidden(child);
    }
}

fn is_hidden(elem: &Element) -> bool {
    if elem.get_attr("display") == Some("none") {
        return true;
    }

    // A hidden parent can still show a visible child.
    if elem.get_attr("visibility") == Some("hidden") && elem.child_elements().next().is_none() {
        return true;
    }

    if let Some(opacity) = elem.get_attr("opacity")
        && opacity.trim().parse::<f64>().ok() == Some(0.0)
    {
        return true;
    }

    if let Some(style) = elem.get_attr("style")
        && (style.contains("display:none") || style.contains("display: none"))
    {
        return true;
    }

    false
}

/// Remove empty container elements.
fn remove_empty(elem: &mut Element) {
    for child in elem.child_elements_mut() {
        remove_empty(child);
    }

    let container_elements = ["g", "defs", "symbol", "marker", "clipPath", "mask", "pattern"];

    elem.children.retain(|node| match node {
        Node::Element(e) if container_elements.iter().any(|name| e.is(name)) => {
            !e.children.is_empty() || e.has_attr("id")
        }
        _ => true,
    });
}

/// Remove text elements that hold no characters.
fn remove_empty_text(elem: &mut Element) {
    elem.children.retain(|node| match node {
        Node::Element(e) if e.is("text") || e.is("tspan") => {
            e.has_attr("id") || !e.text_content().is_empty()
        }
        _ => true,
    });

    for child in elem.child_elements_mut() {
        remove_empty_text(child);
    }
}

/// Collapse groups that carry no attributes into their parent.
fn collapse_groups(elem: &mut Element) {
    for child in elem.child_elements_mut() {
        collapse_groups(child);
    }

    // Children of a switch are alternatives; lifting them out changes
    // which one renders.
    if elem.is("switch") {
        return;
    }

    let mut new_children = Vec::with_capacity(elem.children.len());
    for child in std::mem::take(&mut elem.children) {
        match child {
            Node::Element(mut e) if can_collapse_group(&e) => {
                new_children.extend(std::mem::take(&mut e.children));
            }
            other => new_children.push(other),
        }
    }
    elem.children = new_children;
}

fn can_collapse_group(elem: &Element) -> bool {
    elem.is("g") && elem.attributes.is_empty()
}

/// Re-encode path data compactly.
fn minify_paths(elem: &mut Element, precision: u8) {
    if elem.is("path")
        && let Some(d) = elem.get_attr("d")
    {
        match parse_path(d) {
            Ok(commands) => {
                let minified = minify(&commands, precision);
                elem.set_attr("d", minified);
            }
            Err(e) => debug!("leaving path data as is: {}", e),
        }
    }

    for child in elem.child_elements_mut() {
        minify_paths(child, precision);
    }
}

const COLOR_ATTRS: &[&str] = &[
    "fill",
    "stroke",
    "stop-color",
    "flood-color",
    "lighting-color",
    "color",
];

/// Minify color values.
fn minify_colors(elem: &mut Element) {
    for attr in &mut elem.attributes {
        if attr.name.prefix.is_none() && COLOR_ATTRS.contains(&attr.name.local.as_str()) {
            attr.value = minify_color(&attr.value);
        }
    }

    if let Some(style) = elem.get_attr("style") {
        let new_style = minify_style_colors(style);
        elem.set_attr("style", new_style);
    }

    for child in elem.child_elements_mut() {
        minify_colors(child);
    }
}

fn minify_color(color: &str) -> String {
    let color = color.trim();
    let lower = color.to_lowercase();

    match lower.as_str() {
        "white" | "#ffffff" | "#fff" => return "#fff".into(),
        "black" | "#000000" | "#000" => return "#000".into(),
        "#ff0000" | "#f00" => return "red".into(),
        "#0000ff" | "#00f" => return "blue".into(),
        _ => {}
    }

    let hex = if let Some(rgb) = parse_rgb(&lower) {
        format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
    } else if lower.len() == 7 && lower.starts_with('#') {
        lower.clone()
    } else {
        return color.to_string();
    };

    // #RRGGBB -> #RGB if possible
    let bytes: Vec<u8> = (1..7)
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect();
    if let [r, g, b] = bytes[..] {
        if r >> 4 == r & 0xf && g >> 4 == g & 0xf && b >> 4 == b & 0xf {
            return format!("#{:x}{:x}{:x}", r & 0xf, g & 0xf, b & 0xf);
        }
        return hex;
    }

    color.to_string()
}

/// `rgb(r, g, b)` with integer channels in 0..=255.
fn parse_rgb(color: &str) -> Option<[u8; 3]> {
    let inner = color.strip_prefix("rgb(")?.strip_suffix(')')?;
    let channels: Vec<u8> = inner
        .split(',')
        .map(|c| c.trim().parse::<u8>().ok())
        .collect::<Option<_>>()?;
    match channels[..] {
        [r, g, b] => Some([r, g, b]),
        _ => None,
    }
}

fn minify_style_colors(style: &str) -> String {
    let mut result = String::new();
    for decl in style.split(';') {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }

        if !result.is_empty() {
            result.push(';');
        }

        if let Some((prop, value)) = decl.split_once(':') {
            let prop = prop.trim();
            let value = value.trim();
            result.push_str(prop);
            result.push(':');
            if COLOR_ATTRS.contains(&prop) {
                result.push_str(&minify_color(value));
            } else {
                result.push_str(value);
            }
        } else {
            result.push_str(decl);
        }
    }
    result
}

/// Minify inline styles.
fn minify_styles(elem: &mut Element) {
    if let Some(style) = elem.get_attr("style") {
        let minified = minify_style(style);
        if minified.is_empty() {
            elem.remove_attr("style");
        } else {
            elem.set_attr("style", minified);
        }
    }

    for child in elem.child_elements_mut() {
        minify_styles(child);
    }
}

fn minify_style(style: &str) -> String {
    let mut parts = Vec::new();

    for decl in style.split(';') {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }

        if let Some((prop, value)) = decl.split_once(':') {
            let prop = prop.trim();
            let value = value.trim();
            parts.push(format!("{}:{}", prop, value));
        }
    }

    parts.join(";")
}

/// Whether an unprefixed attribute is one the optimizer may drop as unknown.
fn is_droppable_unknown(name: &QName) -> bool {
    if name.prefix.is_some() || name.is_xmlns() {
        return false;
    }
    let local = name.local.to_ascii_lowercase();
    if local == MARKER_ATTR
        || PRESERVED_NAMES.contains(&local.as_str())
        || PRESERVED_PREFIXES.iter().any(|p| local.starts_with(p))
    {
        return false;
    }
    !contains_ci(KNOWN_SVG_ATTRS, &local)
}

/// Remove unknown attributes and default values.
///
/// Inherited properties are only dropped as defaults when no ancestor sets
/// them, so an explicit reset to the initial value survives.
fn remove_unknowns_and_defaults(elem: &mut Element, inherited: &HashSet<String>) {
    let tag = elem.name.local.clone();
    elem.attributes.retain(|attr| {
        if is_droppable_unknown(&attr.name) {
            return false;
        }
        if attr.name.prefix.is_some() {
            return true;
        }
        match default_kind(&tag, &attr.name.local, attr.value.trim()) {
            Some(DefaultKind::Inherited) => inherited.contains(&attr.name.local),
            Some(DefaultKind::Local) => false,
            None => true,
        }
    });

    let mut scope = inherited.clone();
    scope.extend(
        elem.attributes
            .iter()
            .filter(|a| a.name.prefix.is_none())
            .map(|a| a.name.local.clone()),
    );
    for child in elem.child_elements_mut() {
        remove_unknowns_and_defaults(child, &scope);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultKind {
    /// Default of an inherited property.
    Inherited,
    /// Default of an element-specific attribute.
    Local,
}

fn default_kind(element: &str, attr: &str, value: &str) -> Option<DefaultKind> {
    use DefaultKind::*;

    let kind = match (element, attr, value) {
        (_, "fill-opacity", "1")
        | (_, "stroke-opacity", "1")
        | (_, "stroke-width", "1")
        | (_, "stroke-linecap", "butt")
        | (_, "stroke-linejoin", "miter")
        | (_, "stroke-miterlimit", "4")
        | (_, "fill-rule", "nonzero")
        | (_, "clip-rule", "nonzero")
        | (_, "font-style", "normal")
        | (_, "text-anchor", "start")
        | (_, "visibility", "visible") => Inherited,

        (_, "opacity", "1") | (_, "display", "inline") => Local,

        ("rect", "rx", "0") | ("rect", "ry", "0") => Local,
        ("circle", "cx", "0") | ("circle", "cy", "0") => Local,
        ("ellipse", "cx", "0") | ("ellipse", "cy", "0") => Local,
        ("line", "x1", "0") | ("line", "y1", "0") | ("line", "x2", "0") | ("line", "y2", "0") => {
            Local
        }

        _ => return None,
    };
    Some(kind)
}

/// Remove unused namespace declarations.
fn remove_unused_namespaces(elem: &mut Element) {
    let mut used_prefixes: HashSet<Option<String>> = HashSet::new();
    collect_used_prefixes(elem, &mut used_prefixes);

    elem.attributes.retain(|attr| {
        if attr.name.local == "xmlns" && attr.name.prefix.is_none() {
            // Default namespace - always keep
            true
        } else if attr.name.prefix.as_deref() == Some("xmlns") {
            used_prefixes.contains(&Some(attr.name.local.clone()))
        } else {
            true
        }
    });
}

fn collect_used_prefixes(elem: &Element, used: &mut HashSet<Option<String>>) {
    used.insert(elem.name.prefix.clone());

    for attr in &elem.attributes {
        if attr.name.prefix.is_some() && !attr.name.is_xmlns() {
            used.insert(attr.name.prefix.clone());
        }
    }

    for child in elem.child_elements() {
        collect_used_prefixes(child, used);
    }
}

/// Attribute order used by [`Plugin::SortAttrs`]; the rest follow
/// alphabetically.
const ATTR_ORDER: &[&str] = &[
    "id", "width", "height", "x", "x1", "x2", "y", "y1", "y2", "cx", "cy", "r", "fill", "stroke",
    "marker", "d", "points",
];

fn sort_attrs(elem: &mut Element) {
    elem.attributes.sort_by_cached_key(|attr| {
        let name = attr.name.full_name();
        let group = if attr.name.is_xmlns() {
            0
        } else if ATTR_ORDER.contains(&name.as_str()) {
            1
        } else {
            2
        };
        let rank = ATTR_ORDER.iter().position(|n| *n == name).unwrap_or(0);
        (group, rank, name)
    });
}

/// Clean up whitespace-only text nodes outside text content.
fn cleanup_whitespace(elem: &mut Element) {
    if elem.is("text") || elem.is("tspan") || elem.is("textPath") {
        return;
    }
    elem.children.retain(|node| !node.is_blank_text());

    for child in elem.child_elements_mut() {
        cleanup_whitespace(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(svg: &str, plugins: &[Plugin]) -> String {
        BuiltinOptimizer.optimize(svg, plugins).unwrap()
    }

    #[test]
    fn test_minify_color() {
        assert_eq!(minify_color("#ffffff"), "#fff");
        assert_eq!(minify_color("#ff0000"), "red");
        assert_eq!(minify_color("#aabbcc"), "#abc");
        assert_eq!(minify_color("#abcdef"), "#abcdef"); // can't shorten
        assert_eq!(minify_color("rgb(17, 34, 51)"), "#123");
        assert_eq!(minify_color("url(#g)"), "url(#g)");
    }

    #[test]
    fn test_default_kind() {
        assert_eq!(default_kind("rect", "opacity", "1"), Some(DefaultKind::Local));
        assert_eq!(default_kind("rect", "stroke-width", "1"), Some(DefaultKind::Inherited));
        assert_eq!(default_kind("rect", "opacity", "0.5"), None);
    }

    #[test]
    fn test_prolog_and_comments() {
        let out = run(
            r#"<?xml version="1.0"?><!DOCTYPE svg><svg xmlns="http://www.w3.org/2000/svg"><!-- c --><?foo bar?><title>t</title><rect/></svg>"#,
            &[
                Plugin::RemoveDoctype,
                Plugin::RemoveXmlProcInst,
                Plugin::RemoveComments,
                Plugin::RemoveMetadata,
            ],
        );
        assert_eq!(out, r#"<svg xmlns="http://www.w3.org/2000/svg"><rect/></svg>"#);
    }

    #[test]
    fn test_unknowns_keep_custom_families() {
        let out = run(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect foo="1" data-x="2" aria-label="a" role="img" sodipodi:type="arc" stroke-width="1"/></svg>"#,
            &[Plugin::RemoveUnknownsAndDefaults],
        );
        assert_eq!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect data-x="2" aria-label="a" role="img" sodipodi:type="arc"/></svg>"#
        );
    }

    #[test]
    fn test_inherited_defaults_survive_under_override() {
        let out = run(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g stroke-width="2"><rect stroke-width="1"/></g></svg>"#,
            &[Plugin::RemoveUnknownsAndDefaults],
        );
        assert!(out.contains(r#"<rect stroke-width="1"/>"#));
    }

    #[test]
    fn test_collapse_only_bare_groups() {
        let out = run(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g><rect/><circle/></g><g fill="red"><rect/></g></svg>"#,
            &[Plugin::CollapseGroups],
        );
        assert_eq!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect/><circle/><g fill="red"><rect/></g></svg>"#
        );
    }

    #[test]
    fn test_hidden_and_empty() {
        let out = run(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect display="none"/><rect id="keep" display="none"/><g><g/></g><text></text><defs/></svg>"#,
            &[
                Plugin::RemoveHiddenElems,
                Plugin::RemoveEmptyText,
                Plugin::RemoveEmptyContainers,
            ],
        );
        assert_eq!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect id="keep" display="none"/></svg>"#
        );
    }

    #[test]
    fn test_convert_path_data() {
        let out = run(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><path d="M 0.12345 0 L 10 10 L 20 20"/><path d="bogus"/></svg>"#,
            &[Plugin::ConvertPathData],
        );
        assert!(out.contains(r#"<path d="M.123 0 10 10 20 20"/>"#), "{}", out);
        assert!(out.contains(r#"<path d="bogus"/>"#));
    }

    #[test]
    fn test_unused_namespaces_and_sorting() {
        let out = run(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:foo="urn:foo" xmlns:bar="urn:bar"><rect fill="red" height="1" foo:a="1" width="2"/></svg>"#,
            &[Plugin::RemoveUnusedNs, Plugin::SortAttrs],
        );
        assert_eq!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:foo="urn:foo"><rect width="2" height="1" fill="red" foo:a="1"/></svg>"#
        );
    }
}
