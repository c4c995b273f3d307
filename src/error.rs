use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovnormError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown coverage format")]
    UnknownFormat,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Risk hotspot thresholds exceeded:\n{0}")]
    RiskHotspotThreshold(String),
}

pub type Result<T> = std::result::Result<T, CovnormError>;
