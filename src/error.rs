use thiserror::Error;

/// Errors raised at the edges of the engine: config files, CSV I/O and the timestamp contract.
///
/// Degenerate geometry is not an error; it yields an undefined angle and the frame is skipped.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("failed to write config file {path}: {source}")]
    ConfigWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing column `{column}` in frame file")]
    MissingColumn { column: String },

    #[error("row {row}: `{value}` in column `{column}` is not a number")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("timestamp went backwards ({current}s after {previous}s)")]
    OutOfOrderTimestamp { previous: f64, current: f64 },

    #[error("timestamp is not a finite number ({0})")]
    NonFiniteTimestamp(f64),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
