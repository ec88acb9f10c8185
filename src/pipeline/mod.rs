//! Grouped rolling beta over Parquet datasets.
//!
//! The pipeline reads only the columns it needs, normalizes them (values to `f64`, the
//! group key to categorical codes, the time column to an orderable key), establishes
//! (group, time) order, and evaluates a [`RollingBetaExpr`](crate::RollingBetaExpr)
//! independently over every group.

mod error;
pub use error::{Error, Result};

mod config;
pub use config::{DEFAULT_BATCH_SIZE, PipelineConfig, RowOrder, TimeOrder};

mod frame;
mod source;

mod runner;
pub use runner::{GroupedPipelineRunner, rolling_regbeta};
