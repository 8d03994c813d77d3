//! End-to-end behavior of the optimization pipeline.

use svgcrush::{
    EMPTY_SVG, ExternalOptimizer, GroupingMode, Options, Pipeline, Plugin, SvgcrushError,
    optimize_svg, optimize_svg_with, parse_svg,
};

const SVG_OPEN: &str = r#"<svg xmlns="http://www.w3.org/2000/svg">"#;

fn svg(body: &str) -> String {
    format!("{}{}</svg>", SVG_OPEN, body)
}

#[test]
fn test_translation_is_baked_into_path() {
    let out = optimize_svg(&svg(
        r#"<g transform="translate(5 5)"><path d="M0 0h10v10z"/></g>"#,
    ))
    .svg;
    assert_eq!(out, svg(r#"<path d="M5 5h10v10z"/>"#));
}

#[test]
fn test_rotation_is_left_alone() {
    let out = optimize_svg(&svg(
        r#"<g transform="rotate(10) translate(5 5)"><path d="M0 0h10v10z"/></g>"#,
    ))
    .svg;
    assert!(
        out.contains(r#"transform="rotate(10) translate(5 5)""#),
        "{}",
        out
    );
    assert!(out.contains(r#"d="M0 0h10v10z""#), "{}", out);
}

#[test]
fn test_output_is_idempotent() {
    let source = r##"<?xml version="1.0"?>
<!-- drawing -->
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">
  <title>Shapes</title>
  <g transform="translate(10 10)">
    <rect x="0" y="0" width="10.555" height="10" fill="#ff0000"/>
    <rect x="20" y="0" width="10" height="10" fill="#ff0000"/>
  </g>
  <circle cx="50" cy="50" r="5" data-id="c1"/>
  <g fill="#00f">
    <path d="M 0 0 L 10 10"/>
    <path d="M 20 20 L 30 30"/>
  </g>
  <text x="5" y="90" stroke="#000">Hello <tspan font-weight="bold">world</tspan></text>
</svg>"##;

    let once = optimize_svg(source);
    assert!(once.is_optimized(), "{:?}", once.diagnostic);
    let twice = optimize_svg(&once.svg);
    assert_eq!(once.svg, twice.svg);
    assert!(once.svg.contains(r#"data-id="c1""#), "{}", once.svg);
    assert!(parse_svg(&once.svg).is_ok());
}

fn assert_settles(source: &str) -> String {
    let once = optimize_svg(source);
    assert!(once.is_optimized(), "{:?}", once.diagnostic);
    let twice = optimize_svg(&once.svg);
    assert_eq!(once.svg, twice.svg);
    once.svg
}

#[test]
fn test_nested_groups_settle_in_one_run() {
    let out = assert_settles(&svg(concat!(
        r#"<g fill="red"><g stroke="blue"><path d="M0 0h1"/></g>"#,
        r#"<g stroke="blue"><path d="M2 0h1"/></g></g>"#,
    )));
    assert_eq!(out.matches("<path").count(), 1, "{}", out);
    assert!(!out.contains("<g"), "{}", out);
}

#[test]
fn test_chained_definitions_settle_in_one_run() {
    let out = assert_settles(&svg(concat!(
        r##"<defs><linearGradient id="s1"><stop offset="0" stop-color="#fff"/></linearGradient>"##,
        r##"<linearGradient id="s2"><stop offset="0" stop-color="#fff"/></linearGradient>"##,
        r##"<linearGradient id="a" href="#s1"/><linearGradient id="b" href="#s2"/></defs>"##,
        r##"<rect fill="url(#a)" width="1" height="1"/><rect fill="url(#b)" width="2" height="2"/>"##,
    )));
    assert!(!out.contains(r#"id="b""#), "{}", out);
    assert!(!out.contains(r#"id="s2""#), "{}", out);
    assert!(!out.contains("url(#b)"), "{}", out);
}

#[test]
fn test_use_target_is_not_moved() {
    let out = assert_settles(&svg(
        r##"<g transform="translate(5 5)"><rect id="r" width="2" height="2"/></g><use href="#r" x="10"/>"##,
    ));
    assert!(out.contains(r#"transform="translate(5 5)""#), "{}", out);
    assert!(!out.contains(r#"y="5""#), "{}", out);
}

#[test]
fn test_use_beside_its_target_is_not_moved() {
    let out = assert_settles(&svg(
        r##"<g transform="translate(5 5)"><rect id="r" width="2" height="2"/><use href="#r" x="10"/></g>"##,
    ));
    assert!(out.contains(r#"transform="translate(5 5)""#), "{}", out);
    assert!(out.contains(r#"x="10""#), "{}", out);
    assert!(!out.contains(r#"x="15""#), "{}", out);
}

#[test]
fn test_custom_attributes_survive() {
    let out = optimize_svg(&svg(
        r#"<g><rect data-foo="1" aria-label="box" role="img" tabindex="0" foo="bar" width="1" height="1"/></g>"#,
    ))
    .svg;
    for attr in [
        r#"data-foo="1""#,
        r#"aria-label="box""#,
        r#"role="img""#,
        r#"tabindex="0""#,
        r#"foo="bar""#,
    ] {
        assert!(out.contains(attr), "{} missing from {}", attr, out);
    }
    assert!(!out.contains("data-svgcrush-keep"), "{}", out);
}

#[test]
fn test_duplicate_gradients_are_merged() {
    let out = optimize_svg(&svg(concat!(
        r##"<defs><linearGradient id="a"><stop offset="0" stop-color="#fff"/></linearGradient>"##,
        r##"<linearGradient id="b"><stop offset="0" stop-color="#fff"/></linearGradient></defs>"##,
        r##"<rect fill="url(#a)" width="1" height="1"/><rect fill="url(#b)" width="2" height="2"/>"##,
    )))
    .svg;
    assert_eq!(out.matches("<linearGradient").count(), 1, "{}", out);
    assert!(!out.contains("url(#b)"), "{}", out);
    assert!(!out.contains(r#"id="b""#), "{}", out);
    assert!(out.contains("url(#a)"), "{}", out);
}

#[test]
fn test_sibling_paths_are_merged() {
    let out = optimize_svg(&svg(
        r#"<g fill="red"><path d="M0 0h1"/><path d="M5 5h1"/></g>"#,
    ))
    .svg;
    assert_eq!(out.matches("<path").count(), 1, "{}", out);
    assert!(out.contains(r#"fill="red""#), "{}", out);
    assert!(!out.contains("<g"), "{}", out);
}

#[test]
fn test_remove_grouping_mode_flattens() {
    let options = Options {
        grouping_mode: GroupingMode::Remove,
        ..Options::default()
    };
    let out = optimize_svg_with(
        &svg(r#"<g fill="red"><rect width="1" height="1"/></g>"#),
        &options,
    )
    .unwrap()
    .svg;
    assert_eq!(out, svg(r#"<rect width="1" height="1" fill="red"/>"#));
}

#[test]
fn test_resize_sets_dimensions() {
    let options = Options {
        use_custom_dimensions: true,
        custom_width: 64.0,
        custom_height: 32.0,
        ..Options::default()
    };
    let out = optimize_svg_with(
        &svg(r#"<rect x="10" y="10" width="20" height="20"/>"#),
        &options,
    )
    .unwrap()
    .svg;
    assert!(out.contains(r#"width="64""#), "{}", out);
    assert!(out.contains(r#"height="32""#), "{}", out);
    assert!(out.contains(r#"viewBox="10 10 20 20""#), "{}", out);
}

#[test]
fn test_blank_source_yields_empty_svg() {
    assert_eq!(optimize_svg("").svg, EMPTY_SVG);
    assert_eq!(optimize_svg("   \n").svg, EMPTY_SVG);
    assert_eq!(optimize_svg("<html></html>").svg, EMPTY_SVG);
}

#[test]
fn test_disabled_options_pass_through() {
    let source = format!("<!-- keep -->{}", svg(r#"<g><rect x="1.23456"/></g>"#));
    let outcome = optimize_svg_with(&source, &Options::disabled()).unwrap();
    assert_eq!(outcome.svg, source);
    assert!(outcome.is_optimized());
    assert_eq!(outcome.stats.reduction_bytes, 0);
}

#[test]
fn test_malformed_source_is_returned_unchanged() {
    let source = format!("{}<g></svg>", SVG_OPEN);
    let outcome = optimize_svg(&source);
    assert_eq!(outcome.svg, source);
    assert!(outcome.diagnostic.is_some());
}

#[test]
fn test_invalid_options_are_rejected() {
    let options = Options {
        precision: 9,
        ..Options::default()
    };
    assert!(matches!(
        Pipeline::new(options),
        Err(SvgcrushError::InvalidOption(_))
    ));
}

struct Unavailable;

impl ExternalOptimizer for Unavailable {
    fn optimize(&self, _svg: &str, _plugins: &[Plugin]) -> Result<String, SvgcrushError> {
        Err(SvgcrushError::Optimizer("service unavailable".into()))
    }
}

struct DropsUnknownAttributes;

impl ExternalOptimizer for DropsUnknownAttributes {
    fn optimize(&self, svg: &str, _plugins: &[Plugin]) -> Result<String, SvgcrushError> {
        Ok(svg.replace(r#" data-note="x""#, "").replace(r#" foo="bar""#, ""))
    }
}

#[test]
fn test_optimizer_failure_returns_source() {
    let pipeline = Pipeline::new(Options::default())
        .unwrap()
        .with_optimizer(Unavailable);
    let source = svg(r#"<rect width="1.2345" height="1"/>"#);
    let outcome = pipeline.run(&source);
    assert_eq!(outcome.svg, source);
    assert!(matches!(
        outcome.diagnostic,
        Some(SvgcrushError::Optimizer(_))
    ));
}

#[test]
fn test_guard_restores_what_the_optimizer_drops() {
    let pipeline = Pipeline::new(Options::default())
        .unwrap()
        .with_optimizer(DropsUnknownAttributes);
    let out = pipeline
        .run(&svg(r#"<rect data-note="x" foo="bar" width="1" height="1"/>"#))
        .svg;
    assert!(out.contains(r#"data-note="x""#), "{}", out);
    assert!(out.contains(r#"foo="bar""#), "{}", out);
}

#[test]
fn test_stats_serialize_camel_case() {
    let outcome = optimize_svg(&svg(r#"<rect width="1.23456" height="1"/>"#));
    let json = serde_json::to_value(outcome.stats).unwrap();
    assert_eq!(json["originalSize"], outcome.stats.original_size);
    assert!(json["reductionBytes"].as_i64().unwrap() > 0);
    assert!(json["reductionPercent"].as_f64().unwrap() > 0.0);
}
