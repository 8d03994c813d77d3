//! Baking pure translations into geometry.
//!
//! A `transform` holding nothing but `translate(...)` calls is removed when
//! every element under it can absorb the offset into its own coordinates.
//! Anything else about the transform is left exactly as written.

use std::collections::{HashMap, HashSet};

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Document, Element};
use crate::attrs::NON_RENDERING_TAGS;
use crate::error::SvgcrushError;
use crate::number::{format_compact, parse_number, parse_number_list, round_to};
use crate::path::{parse_path, serialize_commands, translate};

static TRANSLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"translate\(\s*([^)]+)\)").expect("valid regex"));

static URL_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*['"]?#([^'")\s]+)['"]?\s*\)"#).expect("valid regex")
});

/// Decimal digits kept when summing offsets, to drop float noise.
const OFFSET_DIGITS: u8 = 9;

/// A pure translation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Translation {
    pub dx: f64,
    pub dy: f64,
}

impl Translation {
    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

/// Extract the translation of a transform list made only of `translate()`
/// calls. Multiple calls add up. Returns `None` when any other function is
/// present or an argument does not parse.
pub fn extract_translation(value: &str) -> Option<Translation> {
    let mut total = Translation::default();

    for caps in TRANSLATE.captures_iter(value) {
        let args = parse_number_list(&caps[1])?;
        let (dx, dy) = match args.as_slice() {
            [dx] => (*dx, 0.0),
            [dx, dy] => (*dx, *dy),
            _ => return None,
        };
        total.dx += dx;
        total.dy += dy;
    }

    let residual = TRANSLATE.replace_all(value, "");
    if residual
        .chars()
        .any(|c| !c.is_ascii_whitespace() && c != ',')
    {
        return None;
    }

    Some(total)
}

/// Every `url(#id)` target named in a value.
pub(crate) fn url_targets(value: &str) -> impl Iterator<Item = &str> {
    URL_REF
        .captures_iter(value)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
}

/// Collapse translation-only transforms across the document.
pub fn collapse_transforms(doc: &mut Document) {
    let ctx = Context::new(doc);
    collapse_in(&mut doc.root, &ctx);
}

struct Context {
    /// Paint servers laid out in the referencing element's user space.
    user_space_paints: HashSet<String>,
    /// Ids some `href` points at. A `<use>` renders its target at the
    /// target's own coordinates, so those elements never move.
    href_targets: HashSet<String>,
}

impl Context {
    fn new(doc: &Document) -> Self {
        let mut by_id: HashMap<&str, &Element> = HashMap::new();
        let mut href_targets = HashSet::new();
        doc.for_each_element(|e| {
            if let Some(id) = e.get_attr("id") {
                by_id.entry(id).or_insert(e);
            }
            if let Some(id) = href_target(e) {
                href_targets.insert(id.to_string());
            }
        });

        let user_space_paints = by_id
            .iter()
            .filter(|(_, e)| paint_units_attr(e).is_some())
            .filter(|(_, e)| effective_units(e, &by_id) == Some("userSpaceOnUse"))
            .map(|(id, _)| id.to_string())
            .collect();

        Self {
            user_space_paints,
            href_targets,
        }
    }

    fn is_href_target(&self, elem: &Element) -> bool {
        elem.get_attr("id")
            .is_some_and(|id| self.href_targets.contains(id))
    }

    fn references_user_space(&self, elem: &Element) -> bool {
        ["fill", "stroke", "style"].iter().any(|name| {
            elem.get_attr(name)
                .is_some_and(|v| url_targets(v).any(|id| self.user_space_paints.contains(id)))
        })
    }
}

fn href_target(elem: &Element) -> Option<&str> {
    elem.get_attr("href")
        .or_else(|| elem.get_attr("xlink:href"))?
        .trim()
        .strip_prefix('#')
}

fn paint_units_attr(elem: &Element) -> Option<&'static str> {
    match elem.name.local.as_str() {
        "linearGradient" | "radialGradient" => Some("gradientUnits"),
        "pattern" => Some("patternUnits"),
        _ => None,
    }
}

/// Units of a paint server, following `href` chains to inherited values.
fn effective_units<'a>(elem: &'a Element, by_id: &HashMap<&str, &'a Element>) -> Option<&'a str> {
    let mut visited = HashSet::new();
    let mut current = elem;
    loop {
        let units_attr = paint_units_attr(current)?;
        if let Some(units) = current.get_attr(units_attr) {
            return Some(units.trim());
        }
        let id = href_target(current)?;
        if !visited.insert(id) {
            return None;
        }
        current = *by_id.get(id)?;
    }
}

fn collapse_in(elem: &mut Element, ctx: &Context) {
    if let Some(value) = elem.get_attr("transform") {
        match extract_translation(value) {
            Some(t) if t.is_zero() => {
                elem.remove_attr("transform");
            }
            Some(t) => {
                if can_absorb(elem, ctx, true) {
                    let mut candidate = elem.clone();
                    candidate.remove_attr("transform");
                    match shift(&mut candidate, t, true) {
                        Ok(()) => *elem = candidate,
                        Err(e) => debug!("keeping transform on <{}>: {}", elem.name.local, e),
                    }
                } else {
                    debug!("transform on <{}> cannot be absorbed", elem.name.local);
                }
            }
            None => {}
        }
    }

    for child in elem.child_elements_mut() {
        collapse_in(child, ctx);
    }
}

fn is_container(elem: &Element, target: bool) -> bool {
    match elem.name.local.as_str() {
        "g" | "a" | "switch" => true,
        "svg" => target,
        _ => false,
    }
}

/// Whether `elem` (and everything under it) can absorb a translation.
fn can_absorb(elem: &Element, ctx: &Context, target: bool) -> bool {
    if elem.name.prefix.is_some() {
        return false;
    }
    if !target
        && elem
            .get_attr("transform")
            .is_some_and(|t| extract_translation(t).is_none())
    {
        return false;
    }
    if ctx.references_user_space(elem)
        || ctx.is_href_target(elem)
        || ["clip-path", "mask"].iter().any(|a| elem.has_attr(a))
    {
        return false;
    }

    let tag = elem.name.local.as_str();
    if is_container(elem, target) || tag == "text" || tag == "tspan" {
        return elem.child_elements().all(|c| can_absorb(c, ctx, false));
    }

    match tag {
        "path" => elem.get_attr("d").is_none_or(|d| parse_path(d).is_ok()),
        "polyline" | "polygon" => elem
            .get_attr("points")
            .is_none_or(|p| parse_number_list(p).is_some_and(|v| v.len() % 2 == 0)),
        "rect" | "image" | "use" | "foreignObject" | "svg" => ["x", "y"]
            .iter()
            .all(|a| elem.get_attr(a).is_none_or(|v| parse_number(v).is_some())),
        "circle" | "ellipse" => ["cx", "cy"]
            .iter()
            .all(|a| elem.get_attr(a).is_none_or(|v| parse_number(v).is_some())),
        "line" => ["x1", "y1", "x2", "y2"]
            .iter()
            .all(|a| elem.get_attr(a).is_none_or(|v| parse_number(v).is_some())),
        _ => NON_RENDERING_TAGS.contains(&tag),
    }
}

fn shift(elem: &mut Element, t: Translation, target: bool) -> Result<(), SvgcrushError> {
    let tag = elem.name.local.clone();

    if is_container(elem, target) {
        for child in elem.child_elements_mut() {
            shift(child, t, false)?;
        }
        return Ok(());
    }

    match tag.as_str() {
        "path" => {
            if let Some(d) = elem.get_attr("d") {
                let moved = translate(&parse_path(d)?, t.dx, t.dy);
                elem.set_attr("d", serialize_commands(&moved));
            }
        }
        "polyline" | "polygon" => {
            if let Some(points) = elem.get_attr("points") {
                let values = parse_number_list(points)
                    .ok_or_else(|| SvgcrushError::InvalidSvg(format!("bad points: {}", points)))?;
                let moved: Vec<String> = values
                    .chunks(2)
                    .map(|p| format!("{},{}", offset(p[0], t.dx), offset(p[1], t.dy)))
                    .collect();
                elem.set_attr("points", moved.join(" "));
            }
        }
        "rect" | "image" | "use" | "foreignObject" | "svg" => {
            shift_attr(elem, "x", t.dx)?;
            shift_attr(elem, "y", t.dy)?;
        }
        "circle" | "ellipse" => {
            shift_attr(elem, "cx", t.dx)?;
            shift_attr(elem, "cy", t.dy)?;
        }
        "line" => {
            shift_attr(elem, "x1", t.dx)?;
            shift_attr(elem, "y1", t.dy)?;
            shift_attr(elem, "x2", t.dx)?;
            shift_attr(elem, "y2", t.dy)?;
        }
        "text" | "tspan" => {
            // A tspan without its own position flows after the text.
            let anchored = tag == "text";
            shift_list_attr(elem, "x", t.dx, anchored)?;
            shift_list_attr(elem, "y", t.dy, anchored)?;
            for child in elem.child_elements_mut() {
                shift(child, t, false)?;
            }
        }
        other if NON_RENDERING_TAGS.contains(&other) => {}
        other => {
            return Err(SvgcrushError::InvalidSvg(format!(
                "<{}> cannot absorb a translation",
                other
            )));
        }
    }

    Ok(())
}

fn offset(value: f64, by: f64) -> String {
    format_compact(round_to(value + by, OFFSET_DIGITS))
}

fn shift_attr(elem: &mut Element, name: &str, by: f64) -> Result<(), SvgcrushError> {
    let current = match elem.get_attr(name) {
        Some(v) => parse_number(v)
            .ok_or_else(|| SvgcrushError::InvalidSvg(format!("bad {}: {}", name, v)))?,
        None => 0.0,
    };
    elem.set_attr(name, offset(current, by));
    Ok(())
}

fn shift_list_attr(
    elem: &mut Element,
    name: &str,
    by: f64,
    set_missing: bool,
) -> Result<(), SvgcrushError> {
    match elem.get_attr(name) {
        Some(v) => {
            let values = parse_number_list(v)
                .ok_or_else(|| SvgcrushError::InvalidSvg(format!("bad {}: {}", name, v)))?;
            let moved: Vec<String> = values.iter().map(|x| offset(*x, by)).collect();
            elem.set_attr(name, moved.join(" "));
        }
        None if set_missing => elem.set_attr(name, offset(0.0, by)),
        None => {}
    }
    Ok(())
}
