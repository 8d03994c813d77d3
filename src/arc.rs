//! Conversion of legacy editor arcs into standard shapes.
//!
//! Older editors store arcs as `<circle>`/`<ellipse>` elements annotated
//! with `type="arc"` plus center, radii and angles in their own namespace.
//! Renderers ignore those annotations, so the arc is rebuilt as a real
//! circle, ellipse or elliptical-arc path.

use std::f64::consts::{PI, TAU};

use log::{debug, warn};

use crate::ast::{Attribute, Document, Element, NamespaceScope, Node};
use crate::number::{format_compact, parse_leading_number};
use crate::path::{CommandKind, PathCommand, serialize_commands};

/// Namespace of the legacy arc annotations.
pub const SODIPODI_NS: &str = "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd";

const VENDOR_PREFIX: &str = "sodipodi";

const EPSILON: f64 = 1e-6;

/// Replace every annotated arc in the document.
///
/// Arcs that cannot be converted keep their element but lose the vendor
/// annotations.
pub fn convert_legacy_arcs(doc: &mut Document) {
    let mut converted = 0;
    convert_in(&mut doc.root, &NamespaceScope::default(), &mut converted);
    if converted > 0 {
        debug!("converted {} legacy arcs", converted);
    }
}

fn convert_in(elem: &mut Element, parent_scope: &NamespaceScope, converted: &mut usize) {
    let scope = parent_scope.enter(elem);

    for node in &mut elem.children {
        let Node::Element(child) = node else {
            continue;
        };

        let child_scope = scope.enter(child);
        if (child.is("circle") || child.is("ellipse"))
            && vendor_attr(child, &child_scope, "type") == Some("arc")
        {
            match LegacyArc::read(child, &child_scope) {
                Some(arc) => {
                    *node = Node::Element(arc.to_element(child, &child_scope));
                    *converted += 1;
                }
                None => {
                    warn!("skipping legacy arc with unusable radius or angles");
                    child
                        .attributes
                        .retain(|a| !is_vendor(&a.name.prefix, &child_scope));
                }
            }
            continue;
        }

        convert_in(child, &scope, converted);
    }
}

fn is_vendor(prefix: &Option<String>, scope: &NamespaceScope) -> bool {
    match prefix.as_deref() {
        Some(VENDOR_PREFIX) => true,
        Some(p) => scope.resolve(p) == Some(SODIPODI_NS),
        None => false,
    }
}

fn vendor_attr<'a>(elem: &'a Element, scope: &NamespaceScope, local: &str) -> Option<&'a str> {
    elem.attributes
        .iter()
        .find(|a| a.name.local == local && is_vendor(&a.name.prefix, scope))
        .map(|a| a.value.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LegacyArc {
    cx: f64,
    cy: f64,
    rx: f64,
    ry: f64,
    start: f64,
    end: f64,
}

impl LegacyArc {
    /// Read the annotations. Missing values default to zero, except the end
    /// angle which defaults to a full turn.
    fn read(elem: &Element, scope: &NamespaceScope) -> Option<Self> {
        let value = |local: &str, default: f64| match vendor_attr(elem, scope, local) {
            Some(v) => parse_leading_number(v),
            None => Some(default),
        };

        let arc = Self {
            cx: value("cx", 0.0)?,
            cy: value("cy", 0.0)?,
            rx: value("rx", 0.0)?.abs(),
            ry: value("ry", 0.0)?.abs(),
            start: normalize_angle(value("start", 0.0)?),
            end: normalize_angle(value("end", TAU)?),
        };

        if arc.rx <= 0.0 || arc.ry <= 0.0 {
            return None;
        }
        Some(arc)
    }

    fn is_full_turn(&self) -> bool {
        let span = (self.end - self.start).abs();
        span < EPSILON || (span - TAU).abs() < EPSILON
    }

    fn is_round(&self) -> bool {
        (self.rx - self.ry).abs() < EPSILON
    }

    fn point_at(&self, angle: f64) -> (f64, f64) {
        (
            self.cx + self.rx * angle.cos(),
            self.cy + self.ry * angle.sin(),
        )
    }

    /// A single elliptical arc from the start angle to the end angle.
    ///
    /// The sweep flag is always 1: positive angles are assumed to run
    /// clockwise on screen. This matches the editors seen in practice but is
    /// not guaranteed for every angle ordering.
    fn path_data(&self) -> String {
        let (sx, sy) = self.point_at(self.start);
        let (ex, ey) = self.point_at(self.end);

        let mut span = self.end - self.start;
        if span < 0.0 {
            span += TAU;
        }
        let large_arc = if span > PI { 1.0 } else { 0.0 };

        serialize_commands(&[
            PathCommand::new(CommandKind::MoveTo, true, vec![sx, sy]),
            PathCommand::new(
                CommandKind::Arc,
                true,
                vec![self.rx, self.ry, 0.0, large_arc, 1.0, ex, ey],
            ),
        ])
    }

    /// Build the replacement element, carrying over every attribute that is
    /// neither a vendor annotation nor geometry the replacement defines.
    fn to_element(&self, original: &Element, scope: &NamespaceScope) -> Element {
        let mut replacement;
        if self.is_full_turn() && self.is_round() {
            replacement = Element::new("circle");
            replacement.set_attr("cx", format_compact(self.cx));
            replacement.set_attr("cy", format_compact(self.cy));
            replacement.set_attr("r", format_compact(self.rx));
        } else if self.is_full_turn() {
            replacement = Element::new("ellipse");
            replacement.set_attr("cx", format_compact(self.cx));
            replacement.set_attr("cy", format_compact(self.cy));
            replacement.set_attr("rx", format_compact(self.rx));
            replacement.set_attr("ry", format_compact(self.ry));
        } else {
            replacement = Element::new("path");
            replacement.set_attr("d", self.path_data());
        }

        let geometry = ["cx", "cy", "r", "rx", "ry", "d"];
        let carried: Vec<Attribute> = original
            .attributes
            .iter()
            .filter(|a| {
                !is_vendor(&a.name.prefix, scope)
                    && !(a.name.prefix.is_none() && geometry.contains(&a.name.local.as_str()))
            })
            .cloned()
            .collect();
        replacement.attributes.extend(carried);
        replacement.children = original.children.clone();
        replacement
    }
}

/// Map an angle into `[0, 2π)`.
fn normalize_angle(angle: f64) -> f64 {
    let a = angle % TAU;
    if a < 0.0 { a + TAU } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_svg;
    use crate::serialize::serialize;

    fn convert(body: &str) -> String {
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:sodipodi="{}">{}</svg>"#,
            SODIPODI_NS, body
        );
        let mut doc = parse_svg(&svg).unwrap();
        convert_legacy_arcs(&mut doc);
        let out = serialize(&doc);
        let start = out.find('>').unwrap() + 1;
        out[start..out.len() - "</svg>".len()].to_string()
    }

    #[test]
    fn test_full_circle() {
        assert_eq!(
            convert(
                r#"<circle sodipodi:type="arc" sodipodi:cx="10" sodipodi:cy="10" sodipodi:rx="5" sodipodi:ry="5" cx="10" cy="10" r="5" fill="red"/>"#
            ),
            r#"<circle cx="10" cy="10" r="5" fill="red"/>"#
        );
    }

    #[test]
    fn test_half_arc_becomes_path() {
        assert_eq!(
            convert(&format!(
                r#"<ellipse sodipodi:type="arc" sodipodi:cx="10" sodipodi:cy="10" sodipodi:rx="5" sodipodi:ry="5" sodipodi:start="0" sodipodi:end="{}" stroke="blue"/>"#,
                PI / 2.0
            )),
            r#"<path d="M15 10A5 5 0 0 1 10 15" stroke="blue"/>"#
        );
    }

    #[test]
    fn test_large_arc_flag() {
        let out = convert(&format!(
            r#"<circle sodipodi:type="arc" sodipodi:rx="1" sodipodi:ry="1" sodipodi:start="0" sodipodi:end="{}"/>"#,
            1.5 * PI
        ));
        assert!(out.contains("A1 1 0 1 1"), "{}", out);
    }

    #[test]
    fn test_negative_radii_are_normalized() {
        let out = convert(
            r#"<circle sodipodi:type="arc" sodipodi:cx="0" sodipodi:cy="0" sodipodi:rx="-2" sodipodi:ry="-2"/>"#,
        );
        assert_eq!(out, r#"<circle cx="0" cy="0" r="2"/>"#);
    }

    #[test]
    fn test_full_turn_with_unequal_radii() {
        let out = convert(
            r#"<ellipse sodipodi:type="arc" sodipodi:cx="5" sodipodi:cy="5" sodipodi:rx="2" sodipodi:ry="3"/>"#,
        );
        assert_eq!(out, r#"<ellipse cx="5" cy="5" rx="2" ry="3"/>"#);
    }

    #[test]
    fn test_zero_radius_only_strips_annotations() {
        let out = convert(
            r#"<circle sodipodi:type="arc" sodipodi:rx="0" sodipodi:ry="4" r="4" fill="red"/>"#,
        );
        assert_eq!(out, r#"<circle r="4" fill="red"/>"#);
    }

    #[test]
    fn test_prefix_resolved_by_namespace() {
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:sp="{}"><g><circle sp:type="arc" sp:rx="3" sp:ry="3"/></g></svg>"#,
            SODIPODI_NS
        );
        let mut doc = parse_svg(&svg).unwrap();
        convert_legacy_arcs(&mut doc);
        assert!(serialize(&doc).contains(r#"<g><circle cx="0" cy="0" r="3"/></g>"#));
    }

    #[test]
    fn test_plain_circles_untouched() {
        assert_eq!(convert(r#"<circle r="4"/>"#), r#"<circle r="4"/>"#);
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(-PI / 2.0) - 1.5 * PI).abs() < 1e-12);
        assert!(normalize_angle(TAU).abs() < 1e-12);
    }
}
