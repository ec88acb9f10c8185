use std::string::{String, ToString};

use crate::{
    ColumnExpr, DEFAULT_EPSILON, DEFAULT_MIN_PERIODS, DEFAULT_WINDOW, RollingBetaExpr, col,
};

use super::{Error, Result};

/// Rows read per record batch unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 65_536;

/// How rows are put in time order within a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeOrder {
    /// Keep the order rows are stored in
    Stored,
    /// Sort by this column, failing if it is absent
    Column(String),
    /// Sort by this column when the dataset has it, otherwise keep stored order
    ColumnIfPresent(String),
}

/// Order of the values returned by a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowOrder {
    /// Sorted by group key, then time: the order the betas are computed in
    #[default]
    Sorted,
    /// The order rows are stored in the dataset
    Input,
}

/// Settings for a [`GroupedPipelineRunner`](super::GroupedPipelineRunner).
///
/// The default reproduces the conventional price layout: group by `symbol`, order by
/// `date` when present, regress `Close` on `Low` over 20 rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    group_column: String,
    time_order: TimeOrder,
    x: ColumnExpr,
    y: ColumnExpr,
    window: usize,
    min_periods: usize,
    epsilon: f64,
    batch_size: usize,
    row_order: RowOrder,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            group_column: "symbol".to_string(),
            time_order: TimeOrder::ColumnIfPresent("date".to_string()),
            x: col("Low"),
            y: col("Close"),
            window: DEFAULT_WINDOW,
            min_periods: DEFAULT_MIN_PERIODS,
            epsilon: DEFAULT_EPSILON,
            batch_size: DEFAULT_BATCH_SIZE,
            row_order: RowOrder::Sorted,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration regressing `y` on `x` over `window` rows, with the
    /// remaining settings at their defaults
    pub fn new(x: impl Into<ColumnExpr>, y: impl Into<ColumnExpr>, window: usize) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            window,
            ..Self::default()
        }
    }

    /// Sets the group key column
    pub fn set_group_column(&mut self, name: impl Into<String>) -> &mut Self {
        self.group_column = name.into();
        self
    }

    /// Sets how rows are time-ordered within a group
    pub fn set_time_order(&mut self, order: TimeOrder) -> &mut Self {
        self.time_order = order;
        self
    }

    /// Sets the predictor selector
    pub fn set_x(&mut self, x: impl Into<ColumnExpr>) -> &mut Self {
        self.x = x.into();
        self
    }

    /// Sets the response selector
    pub fn set_y(&mut self, y: impl Into<ColumnExpr>) -> &mut Self {
        self.y = y.into();
        self
    }

    /// Sets the window length in rows
    pub fn set_window(&mut self, window: usize) -> &mut Self {
        self.window = window;
        self
    }

    /// Sets the observations each windowed mean requires
    pub fn set_min_periods(&mut self, min_periods: usize) -> &mut Self {
        self.min_periods = min_periods;
        self
    }

    /// Sets the variance threshold below which beta is zero
    pub fn set_epsilon(&mut self, epsilon: f64) -> &mut Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the rows decoded per record batch
    pub fn set_batch_size(&mut self, batch_size: usize) -> &mut Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the order of the returned values
    pub fn set_row_order(&mut self, order: RowOrder) -> &mut Self {
        self.row_order = order;
        self
    }

    /// Returns the group key column
    pub fn group_column(&self) -> &str {
        &self.group_column
    }

    /// Returns the time ordering
    pub fn time_order(&self) -> &TimeOrder {
        &self.time_order
    }

    /// Returns the window length in rows
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Returns the rows decoded per record batch
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the order of the returned values
    pub const fn row_order(&self) -> RowOrder {
        self.row_order
    }

    /// Builds the per-group expression these settings describe
    pub fn expr(&self) -> RollingBetaExpr {
        RollingBetaExpr::new(self.x.clone(), self.y.clone(), self.window)
            .with_min_periods(self.min_periods)
            .with_epsilon(self.epsilon)
    }

    /// Checks the settings without touching any data
    ///
    /// # Returns
    ///
    /// * `Result<()>` - `Error::InvalidWindow` or `Error::InvalidConfig` on rejection
    pub fn validate(&self) -> Result<()> {
        if self.window < 2 || self.min_periods == 0 || self.min_periods > self.window {
            return Err(Error::InvalidWindow {
                window: self.window,
                min_periods: self.min_periods,
            });
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size can not be zero".to_string()));
        }
        if self.group_column.is_empty() {
            return Err(Error::InvalidConfig("group column name is empty".to_string()));
        }
        if self.epsilon.is_nan() {
            return Err(Error::InvalidConfig("epsilon is NaN".to_string()));
        }
        Ok(())
    }
}
