#![doc = include_str!("../README.md")]
#![no_std]
#![deny(
    unsafe_code,
    unused_imports,
    unused_variables,
    unused_must_use,
    missing_docs,
    clippy::all,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented
)]
#![allow(clippy::len_without_is_empty)]

#[macro_use]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub(crate) type Kbn<T> = compensated_summation::KahanBabuskaNeumaier<T>;

/// Observations a windowed mean needs before it is defined
pub const DEFAULT_MIN_PERIODS: usize = 2;

/// Variance magnitude below which a window is degenerate and its beta is zero
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Window length used when none is given
pub const DEFAULT_WINDOW: usize = 20;

mod utils;

mod rolling_mean;
pub use rolling_mean::RollingMean;

mod rolling_beta;
pub use rolling_beta::RollingBeta;

mod expression;
pub use expression::{
    BinaryOp, ColumnExpr, ColumnSource, DEFAULT_ALIAS, RollingBetaExpr, col, lit,
};

#[cfg(feature = "pipeline")]
pub mod pipeline;
#[cfg(feature = "pipeline")]
pub use pipeline::{
    Error, GroupedPipelineRunner, PipelineConfig, Result, RowOrder, rolling_regbeta,
};
