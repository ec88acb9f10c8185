use alloc::{boxed::Box, string::String, vec::Vec};
use core::{
    fmt,
    ops::{Add, Div, Mul, Neg, Sub},
};

use crate::{DEFAULT_EPSILON, DEFAULT_MIN_PERIODS, RollingBeta};

/// Name given to the output column of a [`RollingBetaExpr`] unless overridden
pub const DEFAULT_ALIAS: &str = "rolling_regbeta";

/// Provides named `f64` columns to [`ColumnExpr::evaluate`]
pub trait ColumnSource {
    /// Error returned for a column that cannot be provided
    type Error;

    /// Number of rows in every column
    fn num_rows(&self) -> usize;

    /// Returns the column called `name`
    fn column(&self, name: &str) -> Result<&[Option<f64>], Self::Error>;
}

/// Arithmetic operator of a [`ColumnExpr::Binary`] node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `lhs + rhs`
    Add,
    /// `lhs - rhs`
    Sub,
    /// `lhs * rhs`
    Mul,
    /// `lhs / rhs`
    Div,
}

impl BinaryOp {
    #[inline]
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// Selector for one side of the regression: a column, or arithmetic over columns.
///
/// Missing values propagate through every operator; `NaN` and infinities follow IEEE-754.
///
/// ```
/// use ta_rolling_beta::{col, lit};
///
/// let range = (col("High") - col("Low")) / lit(2.0);
/// assert_eq!(range.to_string(), "((High - Low) / 2)");
/// assert_eq!(range.required_columns(), vec!["High", "Low"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExpr {
    /// Column by name
    Column(String),
    /// Constant broadcast to every row
    Literal(f64),
    /// Negation
    Neg(Box<ColumnExpr>),
    /// Binary arithmetic
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<ColumnExpr>,
        /// Right operand
        rhs: Box<ColumnExpr>,
    },
}

/// Selects the column called `name`
pub fn col(name: impl Into<String>) -> ColumnExpr {
    ColumnExpr::Column(name.into())
}

/// A constant
pub fn lit(value: f64) -> ColumnExpr {
    ColumnExpr::Literal(value)
}

impl ColumnExpr {
    /// Returns the distinct columns this expression reads, in first-use order
    pub fn required_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name.as_str());
                }
            }
            Self::Literal(_) => {}
            Self::Neg(inner) => inner.collect_columns(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
        }
    }

    /// Evaluates the expression row by row against `source`
    ///
    /// # Arguments
    ///
    /// * `source` - Provides the referenced columns
    ///
    /// # Returns
    ///
    /// * `Result<Vec<Option<f64>>, S::Error>` - One value per row, or the first column
    ///   lookup failure
    pub fn evaluate<S: ColumnSource>(&self, source: &S) -> Result<Vec<Option<f64>>, S::Error> {
        let rows = source.num_rows();
        match self {
            Self::Column(name) => {
                let mut values = source.column(name)?.to_vec();
                values.resize(rows, None);
                Ok(values)
            }
            Self::Literal(v) => Ok(vec![Some(*v); rows]),
            Self::Neg(inner) => Ok(inner
                .evaluate(source)?
                .into_iter()
                .map(|v| v.map(|v| -v))
                .collect()),
            Self::Binary { op, lhs, rhs } => {
                let lhs = lhs.evaluate(source)?;
                let rhs = rhs.evaluate(source)?;
                Ok(lhs
                    .into_iter()
                    .zip(rhs)
                    .map(|(l, r)| l.zip(r).map(|(l, r)| op.apply(l, r)))
                    .collect())
            }
        }
    }

    fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

impl From<&str> for ColumnExpr {
    fn from(name: &str) -> Self {
        col(name)
    }
}

impl From<String> for ColumnExpr {
    fn from(name: String) -> Self {
        col(name)
    }
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(name) => f.write_str(name),
            Self::Literal(v) => write!(f, "{v}"),
            Self::Neg(inner) => write!(f, "-{inner}"),
            Self::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait for ColumnExpr {
            type Output = ColumnExpr;

            fn $method(self, rhs: ColumnExpr) -> ColumnExpr {
                ColumnExpr::binary($op, self, rhs)
            }
        }

        impl $trait<f64> for ColumnExpr {
            type Output = ColumnExpr;

            fn $method(self, rhs: f64) -> ColumnExpr {
                ColumnExpr::binary($op, self, lit(rhs))
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

impl Neg for ColumnExpr {
    type Output = ColumnExpr;

    fn neg(self) -> ColumnExpr {
        ColumnExpr::Neg(Box::new(self))
    }
}

/// Declarative rolling regression beta of `y` on `x`.
///
/// The expression holds no state of its own; evaluating it over a time-ordered series
/// drives a fresh [`RollingBeta`] and yields one value per row. Evaluating a grouped
/// dataset means evaluating each group's series separately.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingBetaExpr {
    x: ColumnExpr,
    y: ColumnExpr,
    window: usize,
    min_periods: usize,
    epsilon: f64,
    alias: String,
}

impl RollingBetaExpr {
    /// Creates the rolling beta of `y` on `x` over `window` rows.
    ///
    /// # Arguments
    ///
    /// * `x` - The predictor selector
    /// * `y` - The response selector
    /// * `window` - The window length in rows
    ///
    /// # Returns
    ///
    /// * `Self` - The expression
    pub fn new(x: impl Into<ColumnExpr>, y: impl Into<ColumnExpr>, window: usize) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            window,
            min_periods: DEFAULT_MIN_PERIODS,
            epsilon: DEFAULT_EPSILON,
            alias: String::from(DEFAULT_ALIAS),
        }
    }

    /// Sets the number of observations each windowed mean requires
    pub fn with_min_periods(mut self, min_periods: usize) -> Self {
        self.min_periods = min_periods;
        self
    }

    /// Sets the variance threshold below which beta is reported as zero
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Renames the output
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Returns the predictor selector
    pub fn x(&self) -> &ColumnExpr {
        &self.x
    }

    /// Returns the response selector
    pub fn y(&self) -> &ColumnExpr {
        &self.y
    }

    /// Returns the window length in rows
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Returns the number of observations each windowed mean requires
    pub const fn min_periods(&self) -> usize {
        self.min_periods
    }

    /// Returns the variance threshold below which beta is reported as zero
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Returns the output name
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Returns the distinct columns read by either selector
    pub fn required_columns(&self) -> Vec<&str> {
        let mut out = self.x.required_columns();
        for name in self.y.required_columns() {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }

    /// Returns a fresh accumulator configured like this expression
    ///
    /// # Panics
    ///
    /// Panics if the window is zero.
    pub fn accumulator(&self) -> RollingBeta<f64> {
        let mut acc = RollingBeta::with_min_periods(self.window, self.min_periods);
        acc.set_epsilon(self.epsilon);
        acc
    }

    /// Evaluates the beta over one time-ordered series.
    ///
    /// A row present in only one of `xs`, `ys` is treated as missing on the other side, so
    /// the output always has as many rows as the longer input.
    ///
    /// # Examples
    ///
    /// ```
    /// use ta_rolling_beta::RollingBetaExpr;
    ///
    /// let expr = RollingBetaExpr::new("Low", "Close", 3);
    /// let xs = [Some(1.0), Some(2.0), Some(3.0)];
    /// let ys = [Some(2.0), Some(4.0), Some(6.0)];
    ///
    /// let betas = expr.evaluate(&xs, &ys);
    /// assert_eq!(betas[0], None);
    /// assert!((betas[2].unwrap() - 2.0).abs() < 1e-9);
    /// ```
    pub fn evaluate(&self, xs: &[Option<f64>], ys: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut out = Vec::with_capacity(xs.len().max(ys.len()));
        self.evaluate_into(&mut self.accumulator(), xs, ys, &mut out);
        out
    }

    /// Evaluates one series with a reused accumulator, appending to `out`.
    ///
    /// The accumulator is reset first, so consecutive calls never share window state.
    pub fn evaluate_into(
        &self,
        acc: &mut RollingBeta<f64>,
        xs: &[Option<f64>],
        ys: &[Option<f64>],
        out: &mut Vec<Option<f64>>,
    ) {
        acc.reset();
        let rows = xs.len().max(ys.len());
        out.extend((0..rows).map(|i| {
            let x = xs.get(i).copied().flatten();
            let y = ys.get(i).copied().flatten();
            acc.next((x, y)).beta()
        }));
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString, vec::Vec};
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    struct Columns(Vec<(&'static str, Vec<Option<f64>>)>);

    impl ColumnSource for Columns {
        type Error = String;

        fn num_rows(&self) -> usize {
            self.0.first().map_or(0, |(_, v)| v.len())
        }

        fn column(&self, name: &str) -> Result<&[Option<f64>], String> {
            self.0
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.as_slice())
                .ok_or_else(|| name.to_string())
        }
    }

    fn source() -> Columns {
        Columns(vec![
            ("High", vec![Some(10.0), Some(12.0), None]),
            ("Low", vec![Some(8.0), Some(9.0), Some(7.0)]),
        ])
    }

    #[test]
    fn arithmetic_propagates_missing() {
        let expr = (col("High") + col("Low")) * 0.5;
        let values = expr.evaluate(&source()).unwrap();
        assert_eq!(values, vec![Some(9.0), Some(10.5), None]);
    }

    #[test]
    fn literal_and_negation_broadcast() {
        let values = (-col("Low") + lit(1.0)).evaluate(&source()).unwrap();
        assert_eq!(values, vec![Some(-7.0), Some(-8.0), Some(-6.0)]);
    }

    #[test]
    fn unknown_column_is_reported() {
        let err = (col("Low") / col("Volume")).evaluate(&source()).unwrap_err();
        assert_eq!(err, "Volume");
    }

    #[test]
    fn required_columns_are_distinct() {
        let expr = RollingBetaExpr::new(col("Low") - col("Open"), col("Close") / col("Low"), 5);
        assert_eq!(expr.required_columns(), vec!["Low", "Open", "Close"]);
        assert_eq!(expr.alias(), DEFAULT_ALIAS);
        assert_eq!(expr.with_alias("beta").alias(), "beta");
    }

    #[test]
    fn display_is_parenthesized() {
        let expr = col("a") * (col("b") - 2.0);
        assert_eq!(expr.to_string(), "(a * (b - 2))");
    }

    #[test]
    fn evaluate_pads_the_shorter_side() {
        let expr = RollingBetaExpr::new("x", "y", 3);
        let betas = expr.evaluate(&[Some(1.0), Some(2.0), Some(3.0)], &[Some(1.0), Some(2.0)]);
        assert_eq!(betas.len(), 3);
        assert_approx_eq!(betas[1].unwrap(), 1.0, 1e-12);
    }

    #[test]
    fn evaluate_into_resets_between_series() {
        let expr = RollingBetaExpr::new("x", "y", 3).with_epsilon(1e-9);
        let mut acc = expr.accumulator();
        let mut out = Vec::new();
        expr.evaluate_into(&mut acc, &[Some(1.0), Some(2.0)], &[Some(3.0), Some(5.0)], &mut out);
        expr.evaluate_into(&mut acc, &[Some(4.0), Some(6.0)], &[Some(1.0), Some(0.0)], &mut out);

        assert_eq!(out[0], None);
        assert_approx_eq!(out[1].unwrap(), 2.0, 1e-12);
        assert_eq!(out[2], None);
        assert_approx_eq!(out[3].unwrap(), -0.5, 1e-12);
    }
}
