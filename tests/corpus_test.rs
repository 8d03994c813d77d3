//! Corpus tests - run the pipeline on all SVGs in the corpus directory.
//! These tests verify that every output parses and that a second run is a
//! no-op.

use std::fs;
use std::path::Path;

use ignore::WalkBuilder;
use svgcrush::{optimize_svg, parse_svg};

/// Test that all corpus SVGs can be optimized without falling back.
#[test]
fn test_corpus_optimization() {
    let corpus_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/corpus");

    if !corpus_dir.exists() {
        println!("Corpus directory not found, skipping");
        return;
    }

    let mut total = 0;
    let mut passed = 0;
    let mut failed = 0;
    let mut total_original = 0usize;
    let mut total_optimized = 0usize;

    for entry in WalkBuilder::new(&corpus_dir).git_ignore(false).build() {
        let entry = entry.unwrap();
        let path = entry.path();

        if path.extension().is_some_and(|e| e == "svg") {
            let rel_path = path.strip_prefix(&corpus_dir).unwrap_or(path);
            let content = match fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("  SKIP {}: {}", rel_path.display(), e);
                    continue;
                }
            };
            total += 1;

            let outcome = optimize_svg(&content);
            if let Some(e) = &outcome.diagnostic {
                eprintln!("  FAIL {}: {}", rel_path.display(), e);
                failed += 1;
                continue;
            }

            if let Err(e) = parse_svg(&outcome.svg) {
                eprintln!(
                    "  FAIL {}: optimized output invalid: {}",
                    rel_path.display(),
                    e
                );
                failed += 1;
                continue;
            }

            let again = optimize_svg(&outcome.svg);
            if again.svg != outcome.svg {
                eprintln!("  FAIL {}: second run changed output", rel_path.display());
                failed += 1;
                continue;
            }

            passed += 1;
            total_original += outcome.stats.original_size;
            total_optimized += outcome.stats.optimized_size;
        }
    }

    if total > 0 {
        let total_savings = if total_original > 0 {
            (total_original as f64 - total_optimized as f64) / total_original as f64 * 100.0
        } else {
            0.0
        };
        println!("\nCorpus: {}/{} passed, {} failed", passed, total, failed);
        println!(
            "Size: {} -> {} bytes ({:.1}% smaller)",
            total_original, total_optimized, total_savings
        );
    }

    assert_eq!(failed, 0, "{} SVG files failed to optimize", failed);
}

#[test]
fn test_inkscape_cleanup() {
    let inkscape_svg = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg"
     xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
     xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd"
     inkscape:version="1.0"
     sodipodi:docname="test.svg">
  <sodipodi:namedview inkscape:zoom="1"/>
  <g inkscape:label="Layer 1">
    <rect x="0" y="0" width="100" height="100"/>
  </g>
</svg>"#;

    let optimized = optimize_svg(inkscape_svg).svg;

    assert!(
        !optimized.contains("inkscape"),
        "inkscape namespace not removed"
    );
    assert!(
        !optimized.contains("sodipodi"),
        "sodipodi namespace not removed"
    );

    let doc = parse_svg(&optimized).unwrap();
    assert!(doc.root.is("svg"));
}

#[test]
fn test_inkscape_arc_becomes_circle() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd">
  <circle sodipodi:type="arc" sodipodi:cx="10" sodipodi:cy="10" sodipodi:rx="4" sodipodi:ry="4" fill="red"/>
</svg>"#;

    let optimized = optimize_svg(svg).svg;
    assert!(
        optimized.contains(r#"<circle cx="10" cy="10" r="4" fill="red"/>"#),
        "{}",
        optimized
    );
    assert!(!optimized.contains("sodipodi"), "{}", optimized);
}

#[test]
fn test_path_precision() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg">
        <path d="M 10.123456789 20.987654321 L 30.111111111 40.222222222"/>
    </svg>"#;

    let optimized = optimize_svg(svg).svg;

    assert!(
        !optimized.contains("123456789"),
        "High precision not reduced"
    );
    assert!(
        optimized.contains(r#"d="M10.12 20.99 30.11 40.22""#),
        "{}",
        optimized
    );
}

#[test]
fn test_color_minification() {
    let svg = r##"<svg xmlns="http://www.w3.org/2000/svg">
        <rect fill="#ff0000"/>
        <rect fill="#ffffff"/>
        <rect fill="#aabbcc"/>
    </svg>"##;

    let optimized = optimize_svg(svg).svg;

    assert!(optimized.contains("red"), "red color not shortened");
    assert!(optimized.contains("#fff"), "#ffffff not shortened to #fff");
    assert!(optimized.contains("#abc"), "#aabbcc not shortened to #abc");
}

#[test]
fn test_default_removal() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1">
        <rect fill-opacity="1" stroke-opacity="1" opacity="1" width="2" height="2"/>
    </svg>"#;

    let optimized = optimize_svg(svg).svg;

    assert!(
        !optimized.contains("version="),
        "version attribute not removed"
    );
    assert!(
        !optimized.contains("fill-opacity"),
        "fill-opacity not removed"
    );
    assert!(
        !optimized.contains("stroke-opacity"),
        "stroke-opacity not removed"
    );
    assert!(!optimized.contains("opacity="), "opacity not removed");
}
