//! Attribute vocabularies shared by the passes.
//!
//! Names are lowercase; callers compare against lowercased attribute names.

/// Attributes holding a single number.
pub const NUMERIC_ATTRS: &[&str] = &[
    "x",
    "y",
    "x1",
    "y1",
    "x2",
    "y2",
    "cx",
    "cy",
    "r",
    "rx",
    "ry",
    "width",
    "height",
    "dx",
    "dy",
    "font-size",
    "stroke-width",
    "opacity",
    "fill-opacity",
    "stroke-opacity",
    "stroke-dashoffset",
    "stroke-miterlimit",
    "letter-spacing",
    "word-spacing",
    "pathlength",
];

/// Attributes holding a list of numbers.
pub const NUMERIC_LIST_ATTRS: &[&str] = &["viewbox", "points", "stroke-dasharray"];

/// Attributes the optimizer itself understands. Anything outside this set
/// (and outside the preserved families) may be dropped by the optimizer.
pub const KNOWN_SVG_ATTRS: &[&str] = &[
    "id",
    "class",
    "style",
    "transform",
    "opacity",
    "display",
    "visibility",
    "fill",
    "fill-opacity",
    "fill-rule",
    "stroke",
    "stroke-width",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-dasharray",
    "stroke-dashoffset",
    "stroke-miterlimit",
    "stroke-opacity",
    "clip-path",
    "clip-rule",
    "mask",
    "filter",
    "vector-effect",
    "shape-rendering",
    "text-rendering",
    "paint-order",
    "pointer-events",
    "x",
    "y",
    "x1",
    "y1",
    "x2",
    "y2",
    "cx",
    "cy",
    "r",
    "rx",
    "ry",
    "width",
    "height",
    "d",
    "points",
    "pathlength",
    "dx",
    "dy",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "text-anchor",
    "dominant-baseline",
    "letter-spacing",
    "word-spacing",
    "viewbox",
    "preserveaspectratio",
    "href",
    "xlink:href",
    "offset",
    "stop-color",
    "stop-opacity",
    "gradientunits",
    "gradienttransform",
    "spreadmethod",
    "fx",
    "fy",
    "marker-start",
    "marker-mid",
    "marker-end",
    "markerwidth",
    "markerheight",
    "refx",
    "refy",
    "orient",
    "markerunits",
    "patternunits",
    "patterncontentunits",
    "patterntransform",
    "maskunits",
    "maskcontentunits",
    "clippathunits",
    "version",
    "baseprofile",
    "xmlns",
    "xmlns:xlink",
    "xml:space",
];

/// Attribute names preserved verbatim through the optimizer.
pub const PRESERVED_NAMES: &[&str] = &["role", "tabindex"];

/// Attribute prefixes preserved verbatim through the optimizer.
pub const PRESERVED_PREFIXES: &[&str] = &["data-", "aria-"];

/// Editor vocabularies that are never preserved.
pub const EDITOR_PREFIXES: &[&str] = &["inkscape:", "sodipodi:"];

/// Presentation attributes considered when grouping similar shapes.
pub const GROUPING_ATTRS: &[&str] = &[
    "fill",
    "stroke",
    "stroke-width",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-dasharray",
    "stroke-dashoffset",
    "stroke-miterlimit",
    "fill-rule",
    "opacity",
    "fill-opacity",
    "stroke-opacity",
];

/// Attributes that may appear on a group whose path children get merged.
pub const MERGEABLE_PRESENTATION_ATTRS: &[&str] = &[
    "fill",
    "stroke",
    "stroke-width",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-dasharray",
    "stroke-dashoffset",
    "stroke-miterlimit",
    "fill-rule",
    "opacity",
    "fill-opacity",
    "stroke-opacity",
    "clip-path",
    "mask",
    "filter",
    "vector-effect",
    "paint-order",
    "shape-rendering",
    "text-rendering",
];

/// Marker references; paths carrying them never merge.
pub const MARKER_ATTRS: &[&str] = &["marker-start", "marker-mid", "marker-end"];

/// Shape elements eligible for grouping.
pub const SHAPE_TAGS: &[&str] = &[
    "path", "circle", "ellipse", "rect", "line", "polyline", "polygon",
];

/// Typography attributes considered when grouping text.
pub const TEXT_GROUPING_ATTRS: &[&str] = &[
    "font-family",
    "font-size",
    "text-anchor",
    "font-weight",
    "font-style",
];

/// Properties that do not inherit; a group and its child each apply them.
pub const NON_INHERITED_ATTRS: &[&str] = &["opacity", "clip-path", "mask", "filter"];

/// Attribute values that restate the property's initial value.
pub const DEFAULT_VALUES: &[(&str, &[&str])] = &[
    ("letter-spacing", &["0", "normal"]),
    ("word-spacing", &["0", "normal"]),
    ("paint-order", &["normal", "fill stroke markers"]),
    ("fill-opacity", &["1"]),
    ("stroke-opacity", &["1"]),
    ("opacity", &["1"]),
    ("clip-rule", &["nonzero"]),
    ("fill-rule", &["nonzero"]),
    ("stroke-miterlimit", &["4"]),
    ("stroke-linecap", &["butt"]),
    ("stroke-linejoin", &["miter"]),
    ("xml:space", &["preserve"]),
    ("font-weight", &["400"]),
];

/// Opacity at or above this is treated as fully opaque and dropped.
pub const OPACITY_DROP_THRESHOLD: f64 = 0.9;

/// Root attributes dropped when they restate the SVG default.
pub const ROOT_DEFAULTS: &[(&str, &str)] = &[
    ("version", "1.1"),
    ("baseProfile", "full"),
    ("preserveAspectRatio", "xMidYMid meet"),
];

/// Elements that never render and never carry geometry.
pub const NON_RENDERING_TAGS: &[&str] = &["title", "desc", "metadata", "style", "script"];

/// Whether `name` (any case) is in `set`.
pub fn contains_ci(set: &[&str], name: &str) -> bool {
    set.iter().any(|s| s.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ci() {
        assert!(contains_ci(KNOWN_SVG_ATTRS, "viewBox"));
        assert!(contains_ci(KNOWN_SVG_ATTRS, "xlink:href"));
        assert!(!contains_ci(KNOWN_SVG_ATTRS, "data-x"));
    }

    #[test]
    fn test_grouping_sets_are_presentation_subsets() {
        for attr in GROUPING_ATTRS {
            assert!(MERGEABLE_PRESENTATION_ATTRS.contains(attr));
        }
        assert!(
            !DEFAULT_VALUES
                .iter()
                .any(|(k, v)| *k == "stroke-linejoin" && v.contains(&"round"))
        );
    }
}
