//! The optimization pipeline.
//!
//! One run parses the source, marks custom attributes, hands the document
//! to the general-purpose optimizer, then applies the structural passes in
//! a fixed order before restoring the marked attributes. A run either
//! completes or returns the source untouched with a diagnostic.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, warn};
use serde::Serialize;

use crate::arc::convert_legacy_arcs;
use crate::ast::Document;
use crate::cleanup::{
    dedupe_defs, flatten_tspans, normalize_namespaces, remove_dangling_namespaced_attributes,
    remove_default_values, remove_font_attributes, remove_root_defaults,
    remove_stroke_from_text, remove_styling, remove_unused_xlink, strip_editor_data,
};
use crate::config::{GroupingMode, Options};
use crate::error::SvgcrushError;
use crate::group::{group_similar_shapes, group_text, merge_paths_and_collapse, remove_groups};
use crate::number::round_attributes;
use crate::optimize::{self, BuiltinOptimizer, ExternalOptimizer, Plugin};
use crate::parse::parse_svg;
use crate::preserve::AttributeGuard;
use crate::resize::{autocrop, resize};
use crate::serialize::serialize;
use crate::transform::collapse_transforms;

/// Output for sources that hold no SVG at all.
pub const EMPTY_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"></svg>"#;

/// Plugins handed to the general-purpose optimizer, in order.
///
/// Editor namespace data is left in place here; legacy arcs are stored in
/// it and are converted afterwards.
pub const PIPELINE_PLUGINS: &[Plugin] = &[
    Plugin::RemoveDoctype,
    Plugin::RemoveXmlProcInst,
    Plugin::RemoveComments,
    Plugin::RemoveMetadata,
    Plugin::RemoveHiddenElems,
    Plugin::RemoveEmptyText,
    Plugin::RemoveEmptyContainers,
    Plugin::ConvertColors,
    Plugin::MinifyStyles,
    Plugin::RemoveUnknownsAndDefaults,
    Plugin::CollapseGroups,
    Plugin::ConvertPathData,
    Plugin::RemoveUnusedNs,
    Plugin::SortAttrs,
];

/// Size comparison between source and output, in UTF-8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub original_size: usize,
    pub optimized_size: usize,
    /// Negative when the output grew.
    pub reduction_bytes: i64,
    pub reduction_percent: f64,
}

impl Stats {
    pub fn new(original: &str, optimized: &str) -> Self {
        let original_size = original.len();
        let optimized_size = optimized.len();
        let reduction_bytes = original_size as i64 - optimized_size as i64;
        let reduction_percent = if original_size > 0 {
            reduction_bytes as f64 / original_size as f64 * 100.0
        } else {
            0.0
        };
        Self {
            original_size,
            optimized_size,
            reduction_bytes,
            reduction_percent,
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} bytes ({:.1}% smaller)",
            self.original_size, self.optimized_size, self.reduction_percent
        )
    }
}

/// Result of one run.
#[derive(Debug)]
pub struct Outcome {
    /// The optimized document, or the untouched source on failure.
    pub svg: String,
    pub stats: Stats,
    /// Why the source was returned unchanged, if it was.
    pub diagnostic: Option<SvgcrushError>,
}

impl Outcome {
    pub fn is_optimized(&self) -> bool {
        self.diagnostic.is_none()
    }
}

/// A configured pipeline. Runs share no state; each one builds its own
/// document and preservation table.
pub struct Pipeline {
    options: Options,
    optimizer: Box<dyn ExternalOptimizer>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            options: Options::default(),
            optimizer: Box::new(BuiltinOptimizer),
        }
    }
}

impl Pipeline {
    pub fn new(options: Options) -> Result<Self, SvgcrushError> {
        options.validate()?;
        Ok(Self {
            options,
            optimizer: Box::new(BuiltinOptimizer),
        })
    }

    /// Use a different general-purpose optimizer.
    pub fn with_optimizer(mut self, optimizer: impl ExternalOptimizer + 'static) -> Self {
        self.optimizer = Box::new(optimizer);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Optimize one document.
    pub fn run(&self, source: &str) -> Outcome {
        let result = if source.trim().is_empty() || !source.contains("<svg") {
            debug!("no svg element in source");
            Ok(EMPTY_SVG.to_string())
        } else if !self.options.any_enabled() {
            debug!("all optimizations disabled");
            Ok(source.to_string())
        } else {
            panic::catch_unwind(AssertUnwindSafe(|| self.transform(source))).unwrap_or_else(
                |_| Err(SvgcrushError::Optimizer("a pass panicked".into())),
            )
        };

        match result {
            Ok(svg) => Outcome {
                stats: Stats::new(source, &svg),
                svg,
                diagnostic: None,
            },
            Err(e) => {
                warn!("optimization failed, returning source unchanged: {}", e);
                Outcome {
                    svg: source.to_string(),
                    stats: Stats::new(source, source),
                    diagnostic: Some(e),
                }
            }
        }
    }

    fn transform(&self, source: &str) -> Result<String, SvgcrushError> {
        let options = &self.options;

        let mut doc = parse_svg(source)?;
        let guard = AttributeGuard::mark(&mut doc);

        debug!("stage: general-purpose optimizer");
        let optimized = self.optimizer.optimize(&serialize(&doc), PIPELINE_PLUGINS)?;
        let mut doc = parse_svg(&optimized)?;

        if options.convert_legacy_arcs {
            debug!("stage: legacy arcs");
            convert_legacy_arcs(&mut doc);
        }
        strip_editor_data(&mut doc);

        debug!("stage: transforms and rounding");
        collapse_transforms(&mut doc);
        round_attributes(&mut doc, options.precision, options.path_precision);

        self.cleanup(&mut doc);
        // Baked transforms and stripped styling leave groups with nothing on
        // them; lift those before grouping sees their children.
        optimize::apply(&mut doc, Plugin::CollapseGroups);

        debug!("stage: grouping ({:?})", options.grouping_mode);
        match options.grouping_mode {
            GroupingMode::Remove => remove_groups(&mut doc),
            GroupingMode::Group => group_similar_shapes(&mut doc),
            GroupingMode::None => {}
        }

        dedupe_defs(&mut doc);
        remove_stroke_from_text(&mut doc);
        if options.grouping_mode != GroupingMode::Remove {
            group_text(&mut doc);
        }
        merge_paths_and_collapse(&mut doc);
        remove_root_defaults(&mut doc);

        if options.use_custom_dimensions {
            debug!("stage: resize");
            resize(&mut doc, options.custom_width, options.custom_height);
        }
        if let Some(margin) = options.autocrop_margin {
            debug!("stage: autocrop");
            autocrop(&mut doc, margin);
        }

        debug!("stage: restore {} preserved attribute sets", guard.len());
        guard.restore(&mut doc);
        normalize_namespaces(&mut doc);
        remove_unused_xlink(&mut doc);
        remove_dangling_namespaced_attributes(&mut doc);

        // Later passes append attributes; settle on one order so a second
        // run finds nothing to move.
        optimize::apply(&mut doc, Plugin::SortAttrs);

        Ok(serialize(&doc))
    }

    fn cleanup(&self, doc: &mut Document) {
        let options = &self.options;
        debug!("stage: cleanup");
        if options.remove_default_values {
            remove_default_values(doc);
        }
        if options.remove_font_family || options.remove_font_size {
            remove_font_attributes(doc, options.remove_font_family, options.remove_font_size);
        }
        if options.remove_tspan {
            flatten_tspans(doc);
        }
        if options.remove_styling {
            remove_styling(doc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl ExternalOptimizer for Failing {
        fn optimize(&self, _svg: &str, _plugins: &[Plugin]) -> Result<String, SvgcrushError> {
            Err(SvgcrushError::Optimizer("unavailable".into()))
        }
    }

    struct Passthrough;

    impl ExternalOptimizer for Passthrough {
        fn optimize(&self, svg: &str, plugins: &[Plugin]) -> Result<String, SvgcrushError> {
            assert!(!plugins.contains(&Plugin::RemoveEditorsNsData));
            Ok(svg.to_string())
        }
    }

    #[test]
    fn test_stats() {
        let stats = Stats::new("abcd", "ab");
        assert_eq!(stats.reduction_bytes, 2);
        assert_eq!(stats.reduction_percent, 50.0);
        assert_eq!(Stats::new("ab", "abcd").reduction_bytes, -2);
        assert_eq!(Stats::new("", "").reduction_percent, 0.0);
        assert_eq!(stats.to_string(), "4 -> 2 bytes (50.0% smaller)");
    }

    #[test]
    fn test_failing_optimizer_returns_source() {
        let pipeline = Pipeline::new(Options::default())
            .unwrap()
            .with_optimizer(Failing);
        let source = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect/></svg>"#;
        let outcome = pipeline.run(source);
        assert_eq!(outcome.svg, source);
        assert!(matches!(outcome.diagnostic, Some(SvgcrushError::Optimizer(_))));
        assert!(!outcome.is_optimized());
        assert_eq!(outcome.stats.reduction_bytes, 0);
    }

    #[test]
    fn test_custom_optimizer_sees_fixed_plugins() {
        let pipeline = Pipeline::new(Options::default())
            .unwrap()
            .with_optimizer(Passthrough);
        let outcome = pipeline.run(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g transform="translate(1 2)"><rect x="1" y="1"/></g></svg>"#,
        );
        assert!(outcome.is_optimized());
        assert_eq!(
            outcome.svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect x="2" y="3"/></svg>"#
        );
    }
}
