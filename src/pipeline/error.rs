use std::{io, path::PathBuf, string::String};

use arrow::{datatypes::DataType, error::ArrowError};
use parquet::errors::ParquetError;

/// Result type of the pipeline
pub type Result<T> = core::result::Result<T, Error>;

/// Failures that abort a pipeline run.
///
/// Degenerate windows and windows with too few observations are not errors; they surface
/// row by row as zero or missing betas.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The dataset could not be opened
    #[error("failed to open {}: {source}", .path.display())]
    SourceRead {
        /// Path that was opened
        path: PathBuf,
        /// Underlying I/O failure
        source: io::Error,
    },

    /// The dataset is not readable Parquet, or is corrupt
    #[error("failed to read parquet data: {0}")]
    Parquet(#[from] ParquetError),

    /// A record batch could not be decoded
    #[error("failed to decode record batch: {0}")]
    Arrow(#[from] ArrowError),

    /// A column the pipeline needs is absent
    #[error("missing required column: {0}")]
    MissingColumn(String),

    /// A column holds a value that can not be converted
    #[error("column {column} can not be cast from {from} to {to}: {source}")]
    Cast {
        /// Column name
        column: String,
        /// Stored type
        from: DataType,
        /// Requested type
        to: DataType,
        /// Underlying cast failure
        source: ArrowError,
    },

    /// A column's type has no meaning for its role
    #[error("column {column} has unsupported type {data_type}")]
    UnsupportedType {
        /// Column name
        column: String,
        /// Stored type
        data_type: DataType,
    },

    /// The window is rejected before any data is read
    #[error("invalid window {window} with min_periods {min_periods}: need 2 <= window and 1 <= min_periods <= window")]
    InvalidWindow {
        /// Requested window
        window: usize,
        /// Requested minimum observations
        min_periods: usize,
    },

    /// Any other rejected setting
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns true if the dataset itself could not be read
    pub const fn is_source_error(&self) -> bool {
        matches!(self, Self::SourceRead { .. } | Self::Parquet(_) | Self::Arrow(_))
    }

    /// Returns true if the dataset was read but lacks a usable column
    pub const fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn(_) | Self::Cast { .. } | Self::UnsupportedType { .. }
        )
    }
}
