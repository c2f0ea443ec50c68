use std::path::PathBuf;

use thiserror::Error;

/// Analyzer error types
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Invalid subnet: {0}")]
    InvalidSubnet(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Pattern set already compiled, no further patterns can be added")]
    MatcherSealed,

    #[error("No CSV header found in {}", path.display())]
    HeaderNotFound { path: PathBuf },

    #[error("Config error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
