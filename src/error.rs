use thiserror::Error;

#[derive(Debug, Error)]
pub enum SvgcrushError {
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("Invalid SVG: {0}")]
    InvalidSvg(String),

    #[error("Invalid path data {input:?}: {reason}")]
    InvalidPath { input: String, reason: String },

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Optimizer stage failed: {0}")]
    Optimizer(String),
}

impl SvgcrushError {
    pub(crate) fn path(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
