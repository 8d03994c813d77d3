use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use log::{LevelFilter, warn};
use svgcrush::{GroupingMode, Options, Pipeline};

#[derive(Parser)]
#[command(name = "svgcrush")]
#[command(about = "A tree-rewriting SVG optimizer", long_about = None)]
struct Cli {
    /// Input file (use - for stdin)
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Output file (use - for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// JSON options file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Decimal places for numeric attributes
    #[arg(short, long)]
    precision: Option<u8>,

    /// Decimal places for path data
    #[arg(long)]
    path_precision: Option<u8>,

    /// What to do with groups
    #[arg(long, value_enum)]
    grouping: Option<GroupingMode>,

    /// Keep <tspan> elements
    #[arg(long)]
    keep_tspan: bool,

    /// Keep <style>, style and class
    #[arg(long)]
    keep_styling: bool,

    /// Keep attributes that restate their default value
    #[arg(long)]
    keep_defaults: bool,

    /// Remove font-family attributes
    #[arg(long)]
    remove_font_family: bool,

    /// Remove font-size attributes
    #[arg(long)]
    remove_font_size: bool,

    /// Leave legacy editor arcs alone
    #[arg(long)]
    no_arcs: bool,

    /// Fit the viewBox to the content and set this width
    #[arg(long)]
    width: Option<f64>,

    /// Fit the viewBox to the content and set this height
    #[arg(long)]
    height: Option<f64>,

    /// Crop the viewBox to the content plus a margin (default: 3)
    #[arg(long, num_args = 0..=1, default_missing_value = "3")]
    autocrop: Option<f64>,

    /// Print size comparison
    #[arg(short, long)]
    stats: bool,

    /// Log each pipeline stage
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> Result<Options, svgcrush::SvgcrushError> {
        let mut options = match &self.config {
            Some(path) => Options::from_json_file(path)?,
            None => Options::default(),
        };

        if let Some(precision) = self.precision {
            options.precision = precision;
        }
        if let Some(path_precision) = self.path_precision {
            options.path_precision = path_precision;
        }
        if let Some(grouping) = self.grouping {
            options.grouping_mode = grouping;
        }
        if self.keep_tspan {
            options.remove_tspan = false;
        }
        if self.keep_styling {
            options.remove_styling = false;
        }
        if self.keep_defaults {
            options.remove_default_values = false;
        }
        options.remove_font_family |= self.remove_font_family;
        options.remove_font_size |= self.remove_font_size;
        if self.no_arcs {
            options.convert_legacy_arcs = false;
        }
        if self.width.is_some() || self.height.is_some() {
            options.use_custom_dimensions = true;
            options.custom_width = self.width.unwrap_or(options.custom_width);
            options.custom_height = self.height.unwrap_or(options.custom_height);
        }
        if let Some(margin) = self.autocrop {
            options.autocrop_margin = Some(margin);
        }

        Ok(options)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let input = if cli.input.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(&cli.input)?
    };

    let pipeline = Pipeline::new(cli.options()?)?;
    let outcome = pipeline.run(&input);
    if let Some(diagnostic) = &outcome.diagnostic {
        warn!("{}: {}", cli.input.display(), diagnostic);
    }

    if cli.output.as_os_str() == "-" {
        io::stdout().write_all(outcome.svg.as_bytes())?;
    } else {
        fs::write(&cli.output, &outcome.svg)?;
    }

    if cli.stats {
        eprintln!("{}", outcome.stats);
    }

    Ok(())
}
