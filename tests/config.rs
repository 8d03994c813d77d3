//! Loading options from JSON files.

use std::io::Write;

use svgcrush::{GroupingMode, Options, SvgcrushError, optimize_svg_with};
use tempfile::NamedTempFile;

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_partial_config() {
    let file = write_config(
        r#"{
            "precision": 0,
            "pathPrecision": 1,
            "groupingMode": "none",
            "removeFontFamily": true,
            "autocropMargin": 2.5
        }"#,
    );

    let options = Options::from_json_file(file.path()).unwrap();
    assert_eq!(options.precision, 0);
    assert_eq!(options.path_precision, 1);
    assert_eq!(options.grouping_mode, GroupingMode::None);
    assert!(options.remove_font_family);
    assert_eq!(options.autocrop_margin, Some(2.5));
    // Untouched keys keep their defaults.
    assert!(options.remove_tspan);
    assert!(options.convert_legacy_arcs);
    assert_eq!(options.custom_width, 100.0);
}

#[test]
fn test_loaded_config_drives_pipeline() {
    let file = write_config(r#"{"precision": 0, "removeFontFamily": true}"#);
    let options = Options::from_json_file(file.path()).unwrap();

    let out = optimize_svg_with(
        r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="1.4" font-family="Arial">Hi</text></svg>"#,
        &options,
    )
    .unwrap()
    .svg;
    assert!(out.contains(r#"x="1""#), "{}", out);
    assert!(!out.contains("font-family"), "{}", out);
}

#[test]
fn test_rejects_out_of_range_precision() {
    let file = write_config(r#"{"pathPrecision": 7}"#);
    assert!(matches!(
        Options::from_json_file(file.path()),
        Err(SvgcrushError::InvalidOption(_))
    ));
}

#[test]
fn test_rejects_unknown_grouping_mode() {
    let file = write_config(r#"{"groupingMode": "sometimes"}"#);
    assert!(matches!(
        Options::from_json_file(file.path()),
        Err(SvgcrushError::Config(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Options::from_json_file(dir.path().join("missing.json")),
        Err(SvgcrushError::Io(_))
    ));
}

#[test]
fn test_options_round_trip_through_json() {
    let options = Options {
        grouping_mode: GroupingMode::Remove,
        use_custom_dimensions: true,
        custom_width: 48.0,
        ..Options::default()
    };
    let json = serde_json::to_string(&options).unwrap();
    assert!(json.contains(r#""groupingMode":"remove""#), "{}", json);
    assert_eq!(Options::from_json(&json).unwrap(), options);
}
