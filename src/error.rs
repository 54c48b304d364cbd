use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input table missing, unreadable, or structurally broken. Fatal.
    #[error("failed to read table {path}: {source}")]
    DataSource {
        path: String,
        #[source]
        source: PolarsError,
    },

    /// A requested column is absent from a loaded table. Fatal.
    #[error("table {path} is missing required column {column:?}")]
    MissingColumn { path: String, column: String },

    /// Rejected before any aggregation runs (bad year range, negative
    /// threshold, unknown title type or genre).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Requested metric name is not in the registry.
    #[error("unknown metric {0:?}")]
    UnknownMetric(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
