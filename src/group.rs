//! Sibling grouping, group flattening and path merging.
//!
//! Grouping wraps runs of same-tag siblings sharing presentation attributes
//! in a `<g>` when the hoisted attributes pay for the wrapper. Merging joins
//! paths inside a group whose effective attributes are identical into a
//! single path, again only when that is smaller.

use std::collections::BTreeMap;

use log::debug;

use crate::ast::{Attribute, Document, Element, Node};
use crate::attrs::{
    GROUPING_ATTRS, MARKER_ATTRS, MERGEABLE_PRESENTATION_ATTRS, NON_INHERITED_ATTRS,
    NON_RENDERING_TAGS, SHAPE_TAGS, TEXT_GROUPING_ATTRS,
};
use crate::path::normalize_start;
use crate::serialize::{attribute_size, serialize_element};

/// Bytes a `<g></g>` wrapper costs.
const GROUP_OVERHEAD: i64 = 7;

/// Parents whose content model does not admit an inserted `<g>`.
const NO_WRAP_PARENTS: &[&str] = &["text", "tspan", "textPath", "clipPath", "switch"];

const TEXT_TAGS: &[&str] = &["text", "tspan"];

/// Group runs of sibling shapes sharing presentation attributes.
pub fn group_similar_shapes(doc: &mut Document) {
    group_runs(&mut doc.root, SHAPE_TAGS, GROUPING_ATTRS);
}

/// Group runs of sibling text elements sharing typography.
pub fn group_text(doc: &mut Document) {
    let mut count = 0;
    doc.for_each_element(|e| {
        if TEXT_TAGS.iter().any(|t| e.is(t)) {
            count += 1;
        }
    });
    if count < 2 {
        return;
    }
    group_runs(&mut doc.root, TEXT_TAGS, TEXT_GROUPING_ATTRS);
}

fn group_runs(elem: &mut Element, tags: &[&str], attrs: &[&str]) {
    for child in elem.child_elements_mut() {
        group_runs(child, tags, attrs);
    }

    if NO_WRAP_PARENTS.iter().any(|t| elem.is(t))
        || !elem.child_elements().any(|c| tags.iter().any(|t| c.is(t)))
    {
        return;
    }

    let mut out = Vec::with_capacity(elem.children.len());
    let mut run: Vec<Element> = Vec::new();
    for node in std::mem::take(&mut elem.children) {
        match node {
            Node::Element(e) if tags.iter().any(|t| e.is(t)) => {
                if run.first().is_some_and(|first| first.name != e.name) {
                    flush_run(&mut run, &mut out, attrs);
                }
                run.push(e);
            }
            node if node.is_blank_text() && !run.is_empty() => {}
            node => {
                flush_run(&mut run, &mut out, attrs);
                out.push(node);
            }
        }
    }
    flush_run(&mut run, &mut out, attrs);
    elem.children = out;
}

/// A sub-run chosen for wrapping, with the attributes hoisted onto it.
#[derive(Debug)]
struct Span {
    start: usize,
    end: usize,
    common: Vec<(String, String)>,
}

fn plan_groups(run: &[Element], attrs: &[&str]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut i = 0;

    while i < run.len() {
        let mut common = groupable(&run[i], attrs);
        let mut best: Option<Span> = None;
        let mut best_savings = 0;

        for (j, next) in run.iter().enumerate().skip(i + 1) {
            if next.has_attr("id") {
                break;
            }
            common.retain(|(name, value)| next.get_attr(name) == Some(value.as_str()));
            if common.is_empty() {
                break;
            }

            let size: usize = common.iter().map(|(n, v)| attribute_size(n, v)).sum();
            let savings = (j - i) as i64 * size as i64 - GROUP_OVERHEAD;
            if savings > best_savings {
                best_savings = savings;
                best = Some(Span {
                    start: i,
                    end: j,
                    common: common.clone(),
                });
            }
        }

        match best {
            Some(span) => {
                i = span.end + 1;
                spans.push(span);
            }
            None => i += 1,
        }
    }

    spans
}

/// Groupable attributes of one element. Elements with an id may be
/// referenced on their own and are never wrapped.
fn groupable(elem: &Element, attrs: &[&str]) -> Vec<(String, String)> {
    if elem.has_attr("id") {
        return Vec::new();
    }
    attrs
        .iter()
        .filter_map(|name| elem.get_attr(name).map(|v| (name.to_string(), v.to_string())))
        .collect()
}

fn flush_run(run: &mut Vec<Element>, out: &mut Vec<Node>, attrs: &[&str]) {
    if run.is_empty() {
        return;
    }

    let spans = plan_groups(run, attrs);
    let mut elems = std::mem::take(run).into_iter();
    let mut pos = 0;

    for span in spans {
        out.extend(elems.by_ref().take(span.start - pos).map(Node::Element));

        let mut group = Element::new("g");
        for (name, value) in &span.common {
            group.set_attr(name, value.clone());
        }
        group.children = elems
            .by_ref()
            .take(span.end - span.start + 1)
            .map(|mut e| {
                for (name, _) in &span.common {
                    e.remove_attr(name);
                }
                Node::Element(e)
            })
            .collect();

        debug!(
            "grouped {} <{}> elements",
            group.children.len(),
            group
                .child_elements()
                .next()
                .map(|e| e.name.full_name())
                .unwrap_or_default()
        );
        out.push(Node::Element(group));
        pos = span.end + 1;
    }

    out.extend(elems.map(Node::Element));
}

fn is_presentation(name: &str) -> bool {
    MERGEABLE_PRESENTATION_ATTRS.contains(&name)
}

fn is_inheritable(name: &str) -> bool {
    (MERGEABLE_PRESENTATION_ATTRS.contains(&name)
        || TEXT_GROUPING_ATTRS.contains(&name)
        || MARKER_ATTRS.contains(&name))
        && !NON_INHERITED_ATTRS.contains(&name)
}

/// Copy group attributes the child does not define onto it. A group
/// transform is prepended to the child's own.
fn push_down(attrs: &[Attribute], child: &mut Element) {
    if NON_RENDERING_TAGS.iter().any(|t| child.is(t)) {
        return;
    }
    for attr in attrs {
        let name = attr.name.full_name();
        if name == "transform" {
            let combined = match child.get_attr("transform") {
                Some(own) => format!("{} {}", attr.value, own),
                None => attr.value.clone(),
            };
            child.set_attr("transform", combined);
        } else if !child.has_attr(&name) {
            child.attributes.push(attr.clone());
        }
    }
}

/// Replace every `<g>` with its children.
///
/// Group attributes are pushed onto the children. Groups with an id or with
/// attributes that do not inherit (opacity, clipping, masking, filters) are
/// kept, as flattening them would change what they apply to.
pub fn remove_groups(doc: &mut Document) {
    flatten_in(&mut doc.root);
}

fn is_flattenable(elem: &Element) -> bool {
    elem.is("g")
        && elem.attributes.iter().all(|a| {
            let name = a.name.full_name();
            name == "transform" || is_inheritable(&name)
        })
}

fn flatten_in(elem: &mut Element) {
    for child in elem.child_elements_mut() {
        flatten_in(child);
    }

    if !elem
        .children
        .iter()
        .any(|n| matches!(n, Node::Element(e) if is_flattenable(e)))
    {
        return;
    }

    let mut out = Vec::with_capacity(elem.children.len());
    for node in std::mem::take(&mut elem.children) {
        match node {
            Node::Element(group) if is_flattenable(&group) => {
                let Element {
                    attributes,
                    children,
                    ..
                } = group;
                for mut node in children {
                    if let Node::Element(child) = &mut node {
                        push_down(&attributes, child);
                    }
                    out.push(node);
                }
            }
            other => out.push(other),
        }
    }
    elem.children = out;
}

/// Merge paths inside groups, then collapse groups left with one child.
/// Collapsing can leave a group holding only paths, so both repeat until
/// the tree stops shrinking.
pub fn merge_paths_and_collapse(doc: &mut Document) {
    let mut count = element_count(&doc.root);
    loop {
        merge_paths(doc);
        collapse_single_child_groups(doc);
        let next = element_count(&doc.root);
        if next >= count {
            break;
        }
        count = next;
    }
}

fn element_count(elem: &Element) -> usize {
    1 + elem.child_elements().map(element_count).sum::<usize>()
}

/// Merge consecutive paths with identical effective attributes inside
/// path-only groups.
pub fn merge_paths(doc: &mut Document) {
    doc.for_each_element_mut(|elem| {
        if can_merge_group(elem) {
            merge_group(elem);
        }
    });
}

fn can_merge_group(group: &Element) -> bool {
    group.is("g")
        && !group.has_significant_text()
        && group
            .attributes
            .iter()
            .all(|a| is_presentation(&a.name.full_name()))
        && group.child_elements().count() >= 2
        && group.child_elements().all(|c| c.is("path"))
}

/// Effective attributes of a path inside a group, plus its normalized data.
/// `None` when the path cannot take part in a merge.
fn merge_key(
    path: &Element,
    base: &BTreeMap<String, String>,
) -> Option<(BTreeMap<String, String>, String)> {
    let mut key = base.clone();
    for attr in &path.attributes {
        let name = attr.name.full_name();
        if name == "d" {
            continue;
        }
        if !is_presentation(&name) {
            return None;
        }
        key.insert(name, attr.value.clone());
    }
    let d = normalize_start(path.get_attr("d")?)?;
    Some((key, d))
}

type MergeCandidate = (Element, BTreeMap<String, String>, String);

fn merge_group(group: &mut Element) {
    let base: BTreeMap<String, String> = group
        .attributes
        .iter()
        .map(|a| (a.name.full_name(), a.value.clone()))
        .collect();

    let mut out = Vec::with_capacity(group.children.len());
    let mut run: Vec<MergeCandidate> = Vec::new();

    for node in std::mem::take(&mut group.children) {
        match node {
            Node::Element(path) => match merge_key(&path, &base) {
                Some((key, d)) => {
                    if run.last().is_some_and(|(_, k, _)| *k != key) {
                        flush_merge(&mut run, &mut out, &base);
                    }
                    run.push((path, key, d));
                }
                None => {
                    flush_merge(&mut run, &mut out, &base);
                    out.push(Node::Element(path));
                }
            },
            node if node.is_blank_text() => {}
            node => {
                flush_merge(&mut run, &mut out, &base);
                out.push(node);
            }
        }
    }
    flush_merge(&mut run, &mut out, &base);
    group.children = out;
}

fn flush_merge(run: &mut Vec<MergeCandidate>, out: &mut Vec<Node>, base: &BTreeMap<String, String>) {
    let candidates = std::mem::take(run);
    if candidates.len() < 2 {
        out.extend(candidates.into_iter().map(|(p, _, _)| Node::Element(p)));
        return;
    }

    let (_, key, _) = &candidates[0];
    let mut merged = Element::new("path");
    let data: Vec<&str> = candidates.iter().map(|(_, _, d)| d.as_str()).collect();
    merged.set_attr("d", data.concat());
    for (name, value) in key {
        if base.get(name) != Some(value) {
            merged.set_attr(name, value.clone());
        }
    }

    let before: usize = candidates
        .iter()
        .map(|(p, _, _)| serialize_element(p).len())
        .sum();
    let after = serialize_element(&merged).len();

    if after < before {
        debug!("merged {} paths ({} -> {} bytes)", candidates.len(), before, after);
        out.push(Node::Element(merged));
    } else {
        out.extend(candidates.into_iter().map(|(p, _, _)| Node::Element(p)));
    }
}

/// Replace groups holding exactly one element with that element, and lift
/// the children of groups with no attributes into their parent.
pub fn collapse_single_child_groups(doc: &mut Document) {
    collapse_in(&mut doc.root);
}

fn can_collapse(group: &Element) -> bool {
    if !group.is("g")
        || group.has_significant_text()
        || group.has_attr("transform")
        || !group
            .attributes
            .iter()
            .all(|a| is_presentation(&a.name.full_name()))
    {
        return false;
    }

    let mut elements = group.child_elements();
    let (Some(child), None) = (elements.next(), elements.next()) else {
        return false;
    };

    // A group and its child each apply non-inherited effects; they cannot
    // be folded into one. Clipping, masking and filters also move with the
    // child's transform.
    group.attributes.iter().all(|a| {
        let name = a.name.full_name();
        if !NON_INHERITED_ATTRS.contains(&name.as_str()) {
            return true;
        }
        !child.has_attr(&name) && (name == "opacity" || !child.has_attr("transform"))
    })
}

fn collapse_in(elem: &mut Element) {
    for child in elem.child_elements_mut() {
        collapse_in(child);
    }

    // Children of a switch are alternatives; lifting would add more.
    let lift = !elem.is("switch");
    let mut out = Vec::with_capacity(elem.children.len());
    for node in std::mem::take(&mut elem.children) {
        match node {
            Node::Element(mut group) if can_collapse(&group) => {
                match group
                    .children
                    .iter()
                    .position(|n| matches!(n, Node::Element(_)))
                {
                    Some(pos) => {
                        if let Node::Element(mut child) = group.children.swap_remove(pos) {
                            push_down(&group.attributes, &mut child);
                            out.push(Node::Element(child));
                        }
                    }
                    None => out.push(Node::Element(group)),
                }
            }
            Node::Element(group) if lift && is_bare_group(&group) => {
                out.extend(group.children);
            }
            other => out.push(other),
        }
    }
    elem.children = out;
}

fn is_bare_group(group: &Element) -> bool {
    group.is("g") && group.attributes.is_empty() && !group.has_significant_text()
}
