//! svgcrush - a tree-rewriting SVG optimizer
//!
//! svgcrush runs a general-purpose optimizer over an SVG document, then
//! applies structural passes of its own: translation bake-in, numeric
//! rounding, grouping of similar siblings, path merging and viewBox fitting.
//! Custom attributes (`data-*`, `aria-*`, unknown names) survive the run.
//!
//! ```
//! let outcome = svgcrush::optimize_svg(
//!     r#"<svg xmlns="http://www.w3.org/2000/svg"><g transform="translate(10,20)"><rect x="0" y="0" width="5" height="5"/></g></svg>"#,
//! );
//! assert!(outcome.svg.contains(r#"x="10""#));
//! ```

mod ast;
mod attrs;
mod error;
mod parse;
mod path;
mod serialize;

pub mod arc;
pub mod cleanup;
pub mod config;
pub mod group;
pub mod number;
pub mod optimize;
pub mod pipeline;
pub mod preserve;
pub mod resize;
pub mod transform;

pub use ast::*;
pub use config::{GroupingMode, Options};
pub use error::*;
pub use optimize::{BuiltinOptimizer, ExternalOptimizer, Plugin};
pub use parse::*;
pub use path::{CommandKind, PathCommand, parse_path, serialize_commands};
pub use pipeline::{EMPTY_SVG, Outcome, Pipeline, Stats};
pub use serialize::*;

/// Optimize an SVG string with default settings.
pub fn optimize_svg(svg: &str) -> Outcome {
    Pipeline::default().run(svg)
}

/// Optimize an SVG string with custom options.
pub fn optimize_svg_with(svg: &str, options: &Options) -> Result<Outcome, SvgcrushError> {
    Ok(Pipeline::new(options.clone())?.run(svg))
}
