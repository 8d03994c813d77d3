//! Pipeline options.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SvgcrushError;

/// Highest supported rounding precision.
pub const MAX_PRECISION: u8 = 5;

/// What the grouping stage does with `<g>` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    /// Leave grouping as it is.
    None,
    /// Wrap runs of similar siblings in new groups.
    #[default]
    Group,
    /// Flatten groups into their parents.
    Remove,
}

/// Optimization options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Decimal places for numeric attributes (default: 1)
    pub precision: u8,
    /// Decimal places for path data (default: 2)
    pub path_precision: u8,
    /// Replace `<tspan>` elements with their text
    pub remove_tspan: bool,
    /// Remove `<style>`, `style` and `class`
    pub remove_styling: bool,
    pub grouping_mode: GroupingMode,
    /// Remove attributes restating their initial value
    pub remove_default_values: bool,
    pub remove_font_family: bool,
    pub remove_font_size: bool,
    /// Rebuild legacy editor arcs as standard shapes
    pub convert_legacy_arcs: bool,
    /// Fit the viewBox to the content and set `width`/`height`
    pub use_custom_dimensions: bool,
    pub custom_width: f64,
    pub custom_height: f64,
    /// Crop the viewBox to the content plus this margin
    pub autocrop_margin: Option<f64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            precision: 1,
            path_precision: 2,
            remove_tspan: true,
            remove_styling: true,
            grouping_mode: GroupingMode::Group,
            remove_default_values: true,
            remove_font_family: false,
            remove_font_size: false,
            convert_legacy_arcs: true,
            use_custom_dimensions: false,
            custom_width: 100.0,
            custom_height: 100.0,
            autocrop_margin: None,
        }
    }
}

impl Options {
    /// Options with every optimization switched off.
    pub fn disabled() -> Self {
        Self {
            precision: 0,
            path_precision: 0,
            remove_tspan: false,
            remove_styling: false,
            grouping_mode: GroupingMode::None,
            remove_default_values: false,
            remove_font_family: false,
            remove_font_size: false,
            convert_legacy_arcs: false,
            use_custom_dimensions: false,
            autocrop_margin: None,
            ..Self::default()
        }
    }

    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SvgcrushError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, SvgcrushError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Check ranges the pipeline relies on.
    pub fn validate(&self) -> Result<(), SvgcrushError> {
        if self.precision > MAX_PRECISION {
            return Err(SvgcrushError::InvalidOption(format!(
                "precision must be between 0 and {}, got {}",
                MAX_PRECISION, self.precision
            )));
        }
        if self.path_precision > MAX_PRECISION {
            return Err(SvgcrushError::InvalidOption(format!(
                "pathPrecision must be between 0 and {}, got {}",
                MAX_PRECISION, self.path_precision
            )));
        }
        if self.use_custom_dimensions {
            for (name, value) in [
                ("customWidth", self.custom_width),
                ("customHeight", self.custom_height),
            ] {
                if !value.is_finite() || value <= 0.0 {
                    return Err(SvgcrushError::InvalidOption(format!(
                        "{} must be a positive number, got {}",
                        name, value
                    )));
                }
            }
        }
        if let Some(margin) = self.autocrop_margin
            && !margin.is_finite()
        {
            return Err(SvgcrushError::InvalidOption(format!(
                "autocropMargin must be finite, got {}",
                margin
            )));
        }
        Ok(())
    }

    /// Whether any pass would change the document.
    pub fn any_enabled(&self) -> bool {
        self.precision > 0
            || self.path_precision > 0
            || self.remove_default_values
            || self.remove_font_family
            || self.remove_font_size
            || self.remove_tspan
            || self.remove_styling
            || self.convert_legacy_arcs
            || self.use_custom_dimensions
            || self.autocrop_margin.is_some()
            || self.grouping_mode != GroupingMode::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.precision, 1);
        assert_eq!(options.path_precision, 2);
        assert_eq!(options.grouping_mode, GroupingMode::Group);
        assert!(options.any_enabled());
        assert!(!Options::disabled().any_enabled());
    }

    #[test]
    fn test_from_json_uses_camel_case_and_defaults() {
        let options =
            Options::from_json(r#"{"pathPrecision": 4, "groupingMode": "remove"}"#).unwrap();
        assert_eq!(options.path_precision, 4);
        assert_eq!(options.grouping_mode, GroupingMode::Remove);
        assert_eq!(options.precision, 1);
        assert!(options.remove_tspan);
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            Options::from_json(r#"{"precision": 6}"#),
            Err(SvgcrushError::InvalidOption(_))
        ));
        let options = Options {
            use_custom_dimensions: true,
            custom_width: 0.0,
            ..Options::default()
        };
        assert!(options.validate().is_err());
        assert!(matches!(
            Options::from_json("{not json"),
            Err(SvgcrushError::Config(_))
        ));
    }
}
