//! Content bounds, resizing and autocropping.
//!
//! Bounds are computed from geometry alone, in the root's user space, with
//! every transform list on the way down applied. Stroke widths, markers and
//! text are not measured.

use std::collections::HashSet;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Document, Element};
use crate::number::{format_compact, parse_leading_number, parse_number, parse_number_list};
use crate::path::{CommandKind, PathCommand, parse_path, to_absolute};

pub type Unit = euclid::UnknownUnit;
pub type Point = euclid::Point2D<f64, Unit>;
pub type Bounds = euclid::Box2D<f64, Unit>;
pub type Transform = euclid::Transform2D<f64, Unit, Unit>;

fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

/// Margin added around the content when autocropping.
pub const DEFAULT_AUTOCROP_MARGIN: f64 = 3.0;

/// Nesting limit for `<use>` chains.
const MAX_USE_DEPTH: usize = 16;

static TRANSFORM_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(matrix|translate|scale|rotate|skewX|skewY)\s*\(([^)]*)\)").expect("valid regex")
});

static LENGTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([\d.]+)([a-z]*)$").expect("valid regex"));

/// Parse an SVG transform list into a single matrix.
///
/// Returns `None` if anything other than the known functions (and
/// separators) appears, or if a function has the wrong arguments.
pub fn parse_transform(value: &str) -> Option<Transform> {
    let mut acc = Transform::identity();
    let mut last_end = 0;

    for caps in TRANSFORM_FN.captures_iter(value) {
        let whole = caps.get(0)?;
        if !is_separator(&value[last_end..whole.start()]) {
            return None;
        }
        last_end = whole.end();

        let args = parse_number_list(&caps[2])?;
        let t = transform_fn(&caps[1], &args)?;
        acc = t.then(&acc);
    }

    is_separator(&value[last_end..]).then_some(acc)
}

fn is_separator(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_whitespace() || c == ',')
}

fn transform_fn(name: &str, args: &[f64]) -> Option<Transform> {
    let t = match (name, args) {
        ("matrix", [a, b, c, d, e, f]) => Transform::new(*a, *b, *c, *d, *e, *f),
        ("translate", [tx]) => Transform::translation(*tx, 0.0),
        ("translate", [tx, ty]) => Transform::translation(*tx, *ty),
        ("scale", [s]) => Transform::scale(*s, *s),
        ("scale", [sx, sy]) => Transform::scale(*sx, *sy),
        ("rotate", [deg]) => rotation(*deg),
        ("rotate", [deg, cx, cy]) => Transform::translation(-cx, -cy)
            .then(&rotation(*deg))
            .then(&Transform::translation(*cx, *cy)),
        ("skewX", [deg]) => Transform::new(1.0, 0.0, deg.to_radians().tan(), 1.0, 0.0, 0.0),
        ("skewY", [deg]) => Transform::new(1.0, deg.to_radians().tan(), 0.0, 1.0, 0.0, 0.0),
        _ => return None,
    };
    Some(t)
}

fn rotation(deg: f64) -> Transform {
    let (sin, cos) = deg.to_radians().sin_cos();
    Transform::new(cos, sin, -sin, cos, 0.0, 0.0)
}

/// Geometric bounds of everything the document draws.
pub fn content_bounds(doc: &Document) -> Option<Bounds> {
    let mut walker = BoundsWalker {
        doc,
        bounds: None,
        using: HashSet::new(),
    };
    for child in doc.root.child_elements() {
        walker.visit(child, &Transform::identity(), 0);
    }
    walker.bounds
}

struct BoundsWalker<'a> {
    doc: &'a Document,
    bounds: Option<Bounds>,
    /// Ids of `<use>` targets currently being measured.
    using: HashSet<String>,
}

impl<'a> BoundsWalker<'a> {
    fn add_points(&mut self, points: impl IntoIterator<Item = Point>, ctm: &Transform) {
        let mapped: Vec<Point> = points
            .into_iter()
            .map(|p| ctm.transform_point(p))
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .collect();
        if mapped.is_empty() {
            return;
        }
        let b = Bounds::from_points(mapped);
        self.bounds = Some(match self.bounds {
            Some(acc) => acc.union(&b),
            None => b,
        });
    }

    fn add_box(&mut self, x: f64, y: f64, w: f64, h: f64, ctm: &Transform) {
        self.add_points(
            [point(x, y), point(x + w, y), point(x, y + h), point(x + w, y + h)],
            ctm,
        );
    }

    fn visit(&mut self, elem: &'a Element, parent: &Transform, depth: usize) {
        if elem.name.prefix.is_some() || elem.get_attr("display") == Some("none") {
            return;
        }

        let ctm = match elem.get_attr("transform") {
            Some(value) => match parse_transform(value) {
                Some(t) => t.then(parent),
                None => {
                    debug!("ignoring unparsable transform {:?}", value);
                    *parent
                }
            },
            None => *parent,
        };

        let num = |name: &str| elem.get_attr(name).and_then(parse_leading_number);
        let num0 = |name: &str| num(name).unwrap_or(0.0);

        match elem.name.local.as_str() {
            "g" | "a" | "switch" => {
                for child in elem.child_elements() {
                    self.visit(child, &ctm, depth);
                }
            }
            "svg" => match (num("width"), num("height")) {
                (Some(w), Some(h)) => self.add_box(num0("x"), num0("y"), w, h, &ctm),
                _ => {
                    let inner = Transform::translation(num0("x"), num0("y")).then(&ctm);
                    for child in elem.child_elements() {
                        self.visit(child, &inner, depth);
                    }
                }
            },
            "rect" | "image" | "foreignObject" => {
                if let (Some(w), Some(h)) = (num("width"), num("height")) {
                    self.add_box(num0("x"), num0("y"), w, h, &ctm);
                }
            }
            "circle" => {
                if let Some(r) = num("r") {
                    self.add_box(num0("cx") - r, num0("cy") - r, 2.0 * r, 2.0 * r, &ctm);
                }
            }
            "ellipse" => {
                if let (Some(rx), Some(ry)) = (num("rx"), num("ry")) {
                    self.add_box(num0("cx") - rx, num0("cy") - ry, 2.0 * rx, 2.0 * ry, &ctm);
                }
            }
            "line" => self.add_points(
                [point(num0("x1"), num0("y1")), point(num0("x2"), num0("y2"))],
                &ctm,
            ),
            "polyline" | "polygon" => {
                if let Some(values) = elem.get_attr("points").and_then(parse_number_list) {
                    let points = values.chunks_exact(2).map(|p| point(p[0], p[1]));
                    self.add_points(points, &ctm);
                }
            }
            "path" => {
                if let Some(d) = elem.get_attr("d") {
                    match parse_path(d) {
                        Ok(commands) => self.add_points(path_extrema(&commands), &ctm),
                        Err(e) => debug!("skipping path in bounds: {}", e),
                    }
                }
            }
            "use" => self.visit_use(elem, &ctm, depth),
            _ => {}
        }
    }

    fn visit_use(&mut self, elem: &'a Element, ctm: &Transform, depth: usize) {
        let Some(id) = elem
            .get_attr("href")
            .or_else(|| elem.get_attr("xlink:href"))
            .and_then(|h| h.trim().strip_prefix('#'))
        else {
            return;
        };
        if depth >= MAX_USE_DEPTH || self.using.contains(id) {
            return;
        }
        let Some(target) = self.doc.find_by_id(id) else {
            return;
        };

        let num0 = |name: &str| elem.get_attr(name).and_then(parse_leading_number).unwrap_or(0.0);
        let inner = Transform::translation(num0("x"), num0("y")).then(ctm);

        self.using.insert(id.to_string());
        if target.is("symbol") {
            for child in target.child_elements() {
                self.visit(child, &inner, depth + 1);
            }
        } else {
            self.visit(target, &inner, depth + 1);
        }
        self.using.remove(id);
    }
}

/// Points whose bounds equal the path's geometric bounds: every endpoint
/// plus the extrema of curves and arcs.
fn path_extrema(commands: &[PathCommand]) -> Vec<Point> {
    let mut points = Vec::new();
    let mut current = point(0.0, 0.0);
    let mut start = current;
    let mut last_cubic: Option<Point> = None;
    let mut last_quad: Option<Point> = None;

    for cmd in to_absolute(commands) {
        let ops = &cmd.operands;
        let mut cubic_ctrl = None;
        let mut quad_ctrl = None;

        current = match cmd.kind {
            CommandKind::MoveTo => {
                let p = point(ops[0], ops[1]);
                start = p;
                points.push(p);
                p
            }
            CommandKind::LineTo => {
                let p = point(ops[0], ops[1]);
                points.push(p);
                p
            }
            CommandKind::HorizontalTo => {
                let p = point(ops[0], current.y);
                points.push(p);
                p
            }
            CommandKind::VerticalTo => {
                let p = point(current.x, ops[0]);
                points.push(p);
                p
            }
            CommandKind::CurveTo | CommandKind::SmoothCurveTo => {
                let (c1, c2, end) = if cmd.kind == CommandKind::CurveTo {
                    (point(ops[0], ops[1]), point(ops[2], ops[3]), point(ops[4], ops[5]))
                } else {
                    let c1 = last_cubic.map_or(current, |c| reflect(c, current));
                    (c1, point(ops[0], ops[1]), point(ops[2], ops[3]))
                };
                cubic_extrema(current, c1, c2, end, &mut points);
                cubic_ctrl = Some(c2);
                end
            }
            CommandKind::QuadTo | CommandKind::SmoothQuadTo => {
                let (c, end) = if cmd.kind == CommandKind::QuadTo {
                    (point(ops[0], ops[1]), point(ops[2], ops[3]))
                } else {
                    let c = last_quad.map_or(current, |c| reflect(c, current));
                    (c, point(ops[0], ops[1]))
                };
                quad_extrema(current, c, end, &mut points);
                quad_ctrl = Some(c);
                end
            }
            CommandKind::Arc => {
                let end = point(ops[5], ops[6]);
                arc_extrema(current, ops, end, &mut points);
                end
            }
            CommandKind::ClosePath => start,
        };

        last_cubic = cubic_ctrl;
        last_quad = quad_ctrl;
    }

    points
}

fn reflect(ctrl: Point, about: Point) -> Point {
    point(2.0 * about.x - ctrl.x, 2.0 * about.y - ctrl.y)
}

fn cubic_at(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    mt * mt * mt * p0 + 3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t * p3
}

fn cubic_roots(p0: f64, p1: f64, p2: f64, p3: f64) -> Vec<f64> {
    // Derivative coefficients of the Bernstein form, divided by 3.
    let a = -p0 + 3.0 * p1 - 3.0 * p2 + p3;
    let b = 2.0 * (p0 - 2.0 * p1 + p2);
    let c = p1 - p0;

    let mut roots = Vec::with_capacity(2);
    if a.abs() < 1e-12 {
        if b.abs() > 1e-12 {
            roots.push(-c / b);
        }
    } else {
        let disc = b * b - 4.0 * a * c;
        if disc >= 0.0 {
            let sq = disc.sqrt();
            roots.push((-b + sq) / (2.0 * a));
            roots.push((-b - sq) / (2.0 * a));
        }
    }
    roots.retain(|t| *t > 0.0 && *t < 1.0);
    roots
}

fn cubic_extrema(p0: Point, c1: Point, c2: Point, p3: Point, points: &mut Vec<Point>) {
    points.push(p3);
    let ts = cubic_roots(p0.x, c1.x, c2.x, p3.x)
        .into_iter()
        .chain(cubic_roots(p0.y, c1.y, c2.y, p3.y));
    for t in ts {
        points.push(point(
            cubic_at(p0.x, c1.x, c2.x, p3.x, t),
            cubic_at(p0.y, c1.y, c2.y, p3.y, t),
        ));
    }
}

fn quad_extrema(p0: Point, c: Point, p1: Point, points: &mut Vec<Point>) {
    points.push(p1);
    let at = |a: f64, b: f64, d: f64, t: f64| {
        let mt = 1.0 - t;
        mt * mt * a + 2.0 * mt * t * b + t * t * d
    };
    for (a, b, d) in [(p0.x, c.x, p1.x), (p0.y, c.y, p1.y)] {
        let denom = a - 2.0 * b + d;
        if denom.abs() < 1e-12 {
            continue;
        }
        let t = (a - b) / denom;
        if t > 0.0 && t < 1.0 {
            points.push(point(at(p0.x, c.x, p1.x, t), at(p0.y, c.y, p1.y, t)));
        }
    }
}

/// Endpoint and axis-extreme points of an elliptical arc, using the
/// endpoint-to-center conversion.
fn arc_extrema(from: Point, ops: &[f64], to: Point, points: &mut Vec<Point>) {
    points.push(to);

    let (mut rx, mut ry) = (ops[0].abs(), ops[1].abs());
    if rx == 0.0 || ry == 0.0 || from == to {
        return;
    }
    let phi = ops[2].to_radians();
    let large_arc = ops[3] != 0.0;
    let sweep = ops[4] != 0.0;
    let (sin_phi, cos_phi) = phi.sin_cos();

    let dx2 = (from.x - to.x) / 2.0;
    let dy2 = (from.y - to.y) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
    if lambda > 1.0 {
        let s = lambda.sqrt();
        rx *= s;
        ry *= s;
    }

    let num = rx * rx * ry * ry - rx * rx * y1p * y1p - ry * ry * x1p * x1p;
    let den = rx * rx * y1p * y1p + ry * ry * x1p * x1p;
    let mut coef = (num / den).max(0.0).sqrt();
    if large_arc == sweep {
        coef = -coef;
    }
    let cxp = coef * rx * y1p / ry;
    let cyp = -coef * ry * x1p / rx;

    let cx = cos_phi * cxp - sin_phi * cyp + (from.x + to.x) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (from.y + to.y) / 2.0;

    let angle = |ux: f64, uy: f64| uy.atan2(ux);
    let theta1 = angle((x1p - cxp) / rx, (y1p - cyp) / ry);
    let theta2 = angle((-x1p - cxp) / rx, (-y1p - cyp) / ry);
    let tau = std::f64::consts::TAU;
    let mut delta = (theta2 - theta1).rem_euclid(tau);
    if !sweep {
        delta -= tau;
    }

    let in_sweep = |theta: f64| {
        if delta >= 0.0 {
            (theta - theta1).rem_euclid(tau) <= delta
        } else {
            (theta1 - theta).rem_euclid(tau) <= -delta
        }
    };

    let at = |theta: f64| {
        let (s, c) = theta.sin_cos();
        point(
            cx + rx * cos_phi * c - ry * sin_phi * s,
            cy + rx * sin_phi * c + ry * cos_phi * s,
        )
    };

    let theta_x = (-ry * sin_phi).atan2(rx * cos_phi);
    let theta_y = (ry * cos_phi).atan2(rx * sin_phi);
    let pi = std::f64::consts::PI;
    for theta in [theta_x, theta_x + pi, theta_y, theta_y + pi] {
        if in_sweep(theta) {
            points.push(at(theta));
        }
    }
}

/// Convert a length with an optional absolute unit to user units.
/// Unknown units are read as plain numbers.
pub fn parse_length(value: Option<&str>, default: f64) -> f64 {
    let Some(value) = value.map(str::trim) else {
        return default;
    };
    if let Some(caps) = LENGTH.captures(value)
        && let Some(n) = parse_number(&caps[1])
    {
        // Units per inch; a CSS inch is 96 user units.
        let per_inch = match caps[2].to_ascii_lowercase().as_str() {
            "" | "px" => 96.0,
            "pt" => 72.0,
            "pc" => 6.0,
            "mm" => 25.4,
            "cm" => 2.54,
            "in" => 1.0,
            unit => {
                warn!("unknown length unit {:?}, reading as pixels", unit);
                96.0
            }
        };
        return n * 96.0 / per_inch;
    }
    parse_leading_number(value)
        .filter(|n| *n != 0.0)
        .unwrap_or(default)
}

/// Integer viewBox enclosing `bounds`; degenerate sides become 1.
fn snap(bounds: &Bounds) -> (f64, f64, f64, f64) {
    let x = bounds.min.x.floor();
    let y = bounds.min.y.floor();
    let w = (bounds.max.x.ceil() - x).max(0.0);
    let h = (bounds.max.y.ceil() - y).max(0.0);
    (x, y, if w == 0.0 { 1.0 } else { w }, if h == 0.0 { 1.0 } else { h })
}

fn view_box_string((x, y, w, h): (f64, f64, f64, f64)) -> String {
    format!(
        "{} {} {} {}",
        format_compact(x),
        format_compact(y),
        format_compact(w),
        format_compact(h)
    )
}

/// Fit the viewBox to the content and set explicit dimensions.
///
/// Without measurable content the existing viewBox, then the root's
/// `width`/`height`, then `0 0 100 100` is used.
pub fn resize(doc: &mut Document, width: f64, height: f64) {
    if !width.is_finite() || !height.is_finite() {
        warn!("ignoring non-finite target size {}x{}", width, height);
        return;
    }

    let view_box = match content_bounds(doc) {
        Some(b) if b.width() > 0.0 || b.height() > 0.0 => snap(&b),
        _ => fallback_view_box(&doc.root),
    };

    doc.root.set_attr("width", format_compact(width));
    doc.root.set_attr("height", format_compact(height));
    doc.root.set_attr("viewBox", view_box_string(view_box));
}

fn fallback_view_box(root: &Element) -> (f64, f64, f64, f64) {
    debug!("no measurable content, falling back to root dimensions");
    let (x, y, w, h) = match root.get_attr("viewBox").and_then(parse_number_list).as_deref() {
        Some([x, y, w, h]) => (x.floor(), y.floor(), w.ceil(), h.ceil()),
        _ => (
            0.0,
            0.0,
            parse_length(root.get_attr("width"), 100.0).ceil(),
            parse_length(root.get_attr("height"), 100.0).ceil(),
        ),
    };
    if w > 0.0 && h > 0.0 {
        (x, y, w, h)
    } else {
        (0.0, 0.0, 100.0, 100.0)
    }
}

/// Shrink the viewBox to the content plus `margin` on each side. Leaves
/// the document alone when nothing measurable is drawn.
pub fn autocrop(doc: &mut Document, margin: f64) {
    let Some(b) = content_bounds(doc).filter(|b| b.width() > 0.0 && b.height() > 0.0) else {
        warn!("no measurable content, leaving viewBox unchanged");
        return;
    };
    let m = if margin.is_finite() { margin } else { 0.0 };

    let x = (b.min.x - m).floor();
    let y = (b.min.y - m).floor();
    let w = (b.max.x + m).ceil() - x;
    let h = (b.max.y + m).ceil() - y;
    let view_box = (x, y, if w <= 0.0 { 1.0 } else { w }, if h <= 0.0 { 1.0 } else { h });
    doc.root.set_attr("viewBox", view_box_string(view_box));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_svg;

    fn bounds_of(body: &str) -> Option<(f64, f64, f64, f64)> {
        let doc = parse_svg(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg">{}</svg>"#,
            body
        ))
        .unwrap();
        content_bounds(&doc).map(|b| {
            let r = |v: f64| (v * 1e6).round() / 1e6;
            (r(b.min.x), r(b.min.y), r(b.max.x), r(b.max.y))
        })
    }

    #[test]
    fn test_parse_transform() {
        let t = parse_transform("translate(10 20) scale(2)").unwrap();
        let p = t.transform_point(point(1.0, 1.0));
        assert_eq!((p.x, p.y), (12.0, 22.0));

        let t = parse_transform("rotate(90 5 5)").unwrap();
        let p = t.transform_point(point(10.0, 5.0));
        assert!((p.x - 5.0).abs() < 1e-9 && (p.y - 10.0).abs() < 1e-9);

        assert!(parse_transform("translate(1) bogus(2)").is_none());
        assert!(parse_transform("scale(1 2 3)").is_none());
    }

    #[test]
    fn test_shape_bounds() {
        assert_eq!(
            bounds_of(r#"<rect x="1" y="2" width="3" height="4"/><circle cx="20" cy="20" r="5"/>"#),
            Some((1.0, 2.0, 25.0, 25.0))
        );
        assert_eq!(
            bounds_of(r#"<g transform="translate(10 0)"><line x1="0" y1="0" x2="5" y2="5"/></g>"#),
            Some((10.0, 0.0, 15.0, 5.0))
        );
        assert_eq!(
            bounds_of(r#"<polygon points="0,0 10,0 5,-5"/>"#),
            Some((0.0, -5.0, 10.0, 0.0))
        );
    }

    #[test]
    fn test_curve_bounds() {
        // The curve bulges to y = -7.5 between its endpoints.
        assert_eq!(
            bounds_of(r#"<path d="M0 0C0 -10 10 -10 10 0"/>"#),
            Some((0.0, -7.5, 10.0, 0.0))
        );
        assert_eq!(
            bounds_of(r#"<path d="M0 0Q5 10 10 0"/>"#),
            Some((0.0, 0.0, 10.0, 5.0))
        );
        // Half circle above the chord.
        assert_eq!(
            bounds_of(r#"<path d="M0 0A5 5 0 0 1 10 0"/>"#),
            Some((0.0, -5.0, 10.0, 0.0))
        );
    }

    #[test]
    fn test_use_and_defs_bounds() {
        assert_eq!(
            bounds_of(
                r##"<defs><rect id="r" width="2" height="2"/></defs><use href="#r" x="5" y="5"/>"##
            ),
            Some((5.0, 5.0, 7.0, 7.0))
        );
        assert_eq!(bounds_of(r##"<use id="u" href="#u"/>"##), None);
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length(Some("10"), 0.0), 10.0);
        assert_eq!(parse_length(Some("1in"), 0.0), 96.0);
        assert_eq!(parse_length(Some("72pt"), 0.0), 96.0);
        assert_eq!(parse_length(Some("100%"), 5.0), 100.0);
        assert_eq!(parse_length(None, 100.0), 100.0);
    }

    #[test]
    fn test_resize() {
        let mut doc = parse_svg(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="500"><rect x="10.5" y="10.5" width="20" height="20"/></svg>"#,
        )
        .unwrap();
        resize(&mut doc, 64.0, 64.0);
        assert_eq!(doc.root.get_attr("width"), Some("64"));
        assert_eq!(doc.root.get_attr("height"), Some("64"));
        assert_eq!(doc.root.get_attr("viewBox"), Some("10 10 21 21"));
    }

    #[test]
    fn test_resize_falls_back_to_dimensions() {
        let mut doc =
            parse_svg(r#"<svg xmlns="http://www.w3.org/2000/svg" width="2in" height="50"/>"#)
                .unwrap();
        resize(&mut doc, 10.0, 10.0);
        assert_eq!(doc.root.get_attr("viewBox"), Some("0 0 192 50"));
    }

    #[test]
    fn test_autocrop() {
        let mut doc = parse_svg(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100"><rect x="10" y="10" width="5" height="5"/></svg>"#,
        )
        .unwrap();
        autocrop(&mut doc, DEFAULT_AUTOCROP_MARGIN);
        assert_eq!(doc.root.get_attr("viewBox"), Some("7 7 11 11"));

        let mut empty =
            parse_svg(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1 1"/>"#).unwrap();
        autocrop(&mut empty, 3.0);
        assert_eq!(empty.root.get_attr("viewBox"), Some("0 0 1 1"));
    }
}
