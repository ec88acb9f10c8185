use core::ops::Range;
use std::{path::Path, vec::Vec};

use log::debug;

use crate::RollingBetaExpr;

use super::{
    Result,
    config::{PipelineConfig, RowOrder},
    source,
};

/// Runs a [`RollingBetaExpr`] over every group of a Parquet dataset.
///
/// A run loads the projected columns, sorts rows by group key and time, evaluates the
/// expression over each group's contiguous run of rows with fresh window state, and
/// returns one value per row.
///
/// # Examples
///
/// ```no_run
/// use ta_rolling_beta::{GroupedPipelineRunner, PipelineConfig};
///
/// let mut config = PipelineConfig::default();
/// config.set_window(10);
///
/// let runner = GroupedPipelineRunner::new(config)?;
/// let betas = runner.run_flat("prices.parquet")?;
/// println!("{} betas", betas.len());
/// # Ok::<(), ta_rolling_beta::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct GroupedPipelineRunner {
    config: PipelineConfig,
    expr: RollingBetaExpr,
}

impl GroupedPipelineRunner {
    /// Creates a runner after validating `config`
    ///
    /// # Returns
    ///
    /// * `Result<Self>` - The runner, or the configuration error
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let expr = config.expr();
        Ok(Self { config, expr })
    }

    /// Returns the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the per-group expression
    pub fn expr(&self) -> &RollingBetaExpr {
        &self.expr
    }

    /// Computes the rolling beta of every row of the dataset at `path`
    ///
    /// # Returns
    ///
    /// * `Result<Vec<Option<f64>>>` - One value per row, `None` where undefined, in the
    ///   configured [`RowOrder`]
    pub fn run(&self, path: impl AsRef<Path>) -> Result<Vec<Option<f64>>> {
        let path = path.as_ref();
        let frame = source::load(path, &self.config)?;

        let xs = self.expr.x().evaluate(&frame)?;
        let ys = self.expr.y().evaluate(&frame)?;

        let perm = frame.sort_permutation();
        let runs = frame.group_runs(&perm);
        debug!(
            "evaluating {} over {} rows in {} groups",
            self.expr.alias(),
            frame.num_rows(),
            runs.len()
        );

        let sorted_x: Vec<_> = perm.iter().map(|&i| xs[i]).collect();
        let sorted_y: Vec<_> = perm.iter().map(|&i| ys[i]).collect();
        let betas = evaluate_groups(&self.expr, &runs, &sorted_x, &sorted_y);

        Ok(match self.config.row_order() {
            RowOrder::Sorted => betas,
            RowOrder::Input => {
                let mut out = vec![None; betas.len()];
                for (beta, &row) in betas.into_iter().zip(&perm) {
                    out[row] = beta;
                }
                out
            }
        })
    }

    /// Like [`run`](Self::run), with undefined values as `NaN`
    pub fn run_flat(&self, path: impl AsRef<Path>) -> Result<Vec<f64>> {
        Ok(self
            .run(path)?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }
}

#[cfg(not(feature = "parallel"))]
fn evaluate_groups(
    expr: &RollingBetaExpr,
    runs: &[Range<usize>],
    xs: &[Option<f64>],
    ys: &[Option<f64>],
) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(xs.len());
    if runs.is_empty() {
        return out;
    }
    let mut acc = expr.accumulator();
    for run in runs {
        expr.evaluate_into(&mut acc, &xs[run.clone()], &ys[run.clone()], &mut out);
    }
    out
}

#[cfg(feature = "parallel")]
fn evaluate_groups(
    expr: &RollingBetaExpr,
    runs: &[Range<usize>],
    xs: &[Option<f64>],
    ys: &[Option<f64>],
) -> Vec<Option<f64>> {
    use rayon::prelude::*;

    runs.par_iter()
        .map(|run| expr.evaluate(&xs[run.clone()], &ys[run.clone()]))
        .collect::<Vec<_>>()
        .concat()
}

/// Rolling beta of `Close` on `Low` per `symbol`, ordered by `date` when the dataset
/// has it, over `window` rows.
///
/// Values come back flattened in (symbol, date) order, `NaN` where undefined.
pub fn rolling_regbeta(path: impl AsRef<Path>, window: usize) -> Result<Vec<f64>> {
    let mut config = PipelineConfig::default();
    config.set_window(window);
    GroupedPipelineRunner::new(config)?.run_flat(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn invalid_window_is_rejected_before_io() {
        let err = rolling_regbeta("/definitely/not/here.parquet", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidWindow { window: 1, .. }));
    }

    #[test]
    fn unreadable_path_is_a_source_error() {
        let err = rolling_regbeta("/definitely/not/here.parquet", 20).unwrap_err();
        assert!(err.is_source_error());
    }

    #[test]
    fn groups_never_share_a_window() {
        let expr = RollingBetaExpr::new("x", "y", 3);
        let xs = [Some(1.0), Some(2.0), Some(3.0), Some(10.0), Some(20.0)];
        let ys = [Some(2.0), Some(4.0), Some(6.0), Some(5.0), Some(0.0)];
        let betas = evaluate_groups(&expr, &[0..3, 3..5], &xs, &ys);

        assert_eq!(betas.len(), 5);
        assert_eq!(betas[0], None);
        assert_eq!(betas[3], None);
        assert!((betas[2].unwrap_or_default() - 2.0).abs() < 1e-9);
        assert!((betas[4].unwrap_or_default() + 0.5).abs() < 1e-9);
    }
}
