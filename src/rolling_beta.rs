use num_traits::Float;

use crate::{DEFAULT_EPSILON, DEFAULT_MIN_PERIODS, RollingMean};

/// Incremental rolling regression beta of `y` on `x`.
///
/// `RollingBeta<T>` keeps four trailing means, over `x`, `y`, `x * y` and `x * x`, and
/// derives the window moments from them:
///
/// ```text
/// cov_xy = mean(x * y) - mean(x) * mean(y)
/// var_x  = mean(x * x) - mean(x)^2
/// beta   = 0                if |var_x| < epsilon
///          cov_xy / var_x   otherwise
/// ```
///
/// Each update is O(1): the oldest pair leaves the window as the new pair enters, so the
/// whole series is processed in a single forward pass. Windows are clipped at the start
/// of the series and every mean needs at least `min_periods` present observations, so the
/// first row always yields `None`.
///
/// A pair with a missing side still occupies its row of the window; it contributes to
/// whichever means its present side feeds, and never to `x * y`.
#[derive(Debug, Clone)]
pub struct RollingBeta<T> {
    /// Window length in rows
    period: usize,
    /// Trailing mean of x
    x: RollingMean<T>,
    /// Trailing mean of y
    y: RollingMean<T>,
    /// Trailing mean of x * y
    xy: RollingMean<T>,
    /// Trailing mean of x * x
    x2: RollingMean<T>,
    /// Variance threshold below which the window is degenerate
    epsilon: T,
}

impl<T: Float + Default> RollingBeta<T> {
    /// Creates a rolling beta over `period` rows requiring two observations per mean.
    ///
    /// # Arguments
    ///
    /// * `period` - The window length in rows
    ///
    /// # Returns
    ///
    /// * `Self` - The rolling beta
    pub fn new(period: usize) -> Self {
        Self::with_min_periods(period, DEFAULT_MIN_PERIODS)
    }

    /// Creates a rolling beta over `period` rows requiring `min_periods` observations.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn with_min_periods(period: usize, min_periods: usize) -> Self {
        Self {
            period,
            x: RollingMean::with_min_periods(period, min_periods),
            y: RollingMean::with_min_periods(period, min_periods),
            xy: RollingMean::with_min_periods(period, min_periods),
            x2: RollingMean::with_min_periods(period, min_periods),
            epsilon: T::from(DEFAULT_EPSILON).unwrap_or_else(T::epsilon),
        }
    }

    /// Returns the window length in rows
    #[inline]
    pub const fn period(&self) -> usize {
        self.period
    }

    /// Returns the number of observations each mean requires
    #[inline]
    pub const fn min_periods(&self) -> usize {
        self.x.min_periods()
    }

    /// Returns the variance threshold below which beta is reported as zero
    #[inline]
    pub const fn epsilon(&self) -> T {
        self.epsilon
    }

    /// Sets the variance threshold below which beta is reported as zero
    ///
    /// # Arguments
    ///
    /// * `epsilon` - The threshold, compared against `|var_x|`
    ///
    /// # Returns
    ///
    /// * `&mut Self` - The rolling beta
    pub fn set_epsilon(&mut self, epsilon: T) -> &mut Self {
        self.epsilon = epsilon;
        self
    }

    /// Clears the window, keeping period, min periods and threshold
    ///
    /// # Returns
    ///
    /// * `&mut Self` - The rolling beta
    pub fn reset(&mut self) -> &mut Self {
        self.x.reset();
        self.y.reset();
        self.xy.reset();
        self.x2.reset();
        self
    }

    /// Rebuilds all running sums from the buffered rows
    pub fn recompute(&mut self) {
        self.x.recompute();
        self.y.recompute();
        self.xy.recompute();
        self.x2.recompute();
    }

    /// Pushes the next `(x, y)` row into the window
    ///
    /// # Arguments
    ///
    /// * `pair` - The row, either side `None` when missing
    ///
    /// # Returns
    ///
    /// * `&mut Self` - The rolling beta
    pub fn next(&mut self, (x, y): (Option<T>, Option<T>)) -> &mut Self {
        self.x.next(x);
        self.y.next(y);
        self.xy.next(x.zip(y).map(|(x, y)| x * y));
        self.x2.next(x.map(|x| x * x));
        self
    }

    /// Returns `(mean_x, mean_y)` over the window
    pub fn mean(&self) -> Option<(T, T)> {
        self.x.mean().zip(self.y.mean())
    }

    /// Returns the mean of `x * y` over the window
    pub fn mean_prod(&self) -> Option<T> {
        self.xy.mean()
    }

    /// Returns the mean of `x * x` over the window
    pub fn mean_sq(&self) -> Option<T> {
        self.x2.mean()
    }

    /// Returns the covariance of `x` and `y` over the window
    ///
    /// Computed as `mean(x * y) - mean(x) * mean(y)`, with no degrees-of-freedom
    /// correction.
    ///
    /// # Returns
    ///
    /// * `Option<T>` - The covariance, or `None` if any of the means is undefined
    ///
    /// # Examples
    ///
    /// ```
    /// use ta_rolling_beta::RollingBeta;
    /// use assert_approx_eq::assert_approx_eq;
    ///
    /// let mut stats = RollingBeta::new(3);
    /// let mut results = vec![];
    /// let inputs = [(2.0, 1.0), (4.0, 3.0), (6.0, 2.0), (8.0, 5.0), (10.0, 7.0)];
    /// inputs.iter().for_each(|&(x, y)| {
    ///     stats.next((Some(x), Some(y))).cov().map(|v| results.push(v));
    /// });
    ///
    /// let expected: [f64; 4] = [1.0, 0.6667, 1.3333, 3.3333];
    /// for (i, e) in expected.iter().enumerate() {
    ///     assert_approx_eq!(e, results[i], 0.001);
    /// }
    /// ```
    pub fn cov(&self) -> Option<T> {
        let (mean_x, mean_y) = self.mean()?;
        Some(self.mean_prod()? - mean_x * mean_y)
    }

    /// Returns the variance of `x` over the window
    ///
    /// Computed as `mean(x * x) - mean(x)^2`, with no degrees-of-freedom correction.
    ///
    /// # Returns
    ///
    /// * `Option<T>` - The variance, or `None` if either mean is undefined
    pub fn variance(&self) -> Option<T> {
        let mean_x = self.x.mean()?;
        Some(self.mean_sq()? - mean_x * mean_x)
    }

    /// Returns the regression beta of `y` on `x` over the window
    ///
    /// Beta is the sensitivity of `y` to moves in `x`. A window whose `x` variance is
    /// below the threshold carries no explanatory power and reports exactly zero.
    ///
    /// # Returns
    ///
    /// * `Option<T>` - The beta, or `None` if the variance, or for a non-degenerate
    ///   window the covariance, is undefined
    ///
    /// # Examples
    ///
    /// ```
    /// use ta_rolling_beta::RollingBeta;
    /// use assert_approx_eq::assert_approx_eq;
    ///
    /// let mut stats = RollingBeta::new(3);
    /// let inputs = [
    ///      (0.015, 0.010),
    ///      (0.025, 0.015),
    ///      (-0.010, -0.005),
    ///      (0.030, 0.020),
    ///      (0.005, 0.010),
    /// ];
    ///
    /// let results: Vec<_> = inputs
    ///     .iter()
    ///     .map(|&(x, y)| stats.next((Some(x), Some(y))).beta())
    ///     .collect();
    ///
    /// assert_eq!(results[0], None);
    /// let expected: [f64; 4] = [0.5, 0.5769, 0.6053, 0.6020];
    /// for (e, r) in expected.iter().zip(&results[1..]) {
    ///     assert_approx_eq!(e, r.unwrap(), 0.001);
    /// }
    /// ```
    pub fn beta(&self) -> Option<T> {
        let var = self.variance()?;
        if var.abs() < self.epsilon {
            return Some(T::zero());
        }
        self.cov().map(|cov| cov / var)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn betas(period: usize, xs: &[f64], ys: &[f64]) -> Vec<Option<f64>> {
        let mut stats = RollingBeta::new(period);
        xs.iter()
            .zip(ys)
            .map(|(&x, &y)| stats.next((Some(x), Some(y))).beta())
            .collect()
    }

    #[test]
    fn proportional_series_has_constant_beta() {
        let results = betas(3, &[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(results[0], None);
        for r in &results[1..] {
            assert_approx_eq!(r.unwrap(), 2.0, 1e-9);
        }
    }

    #[test]
    fn constant_x_is_degenerate() {
        let results = betas(3, &[5.0; 5], &[1.0, 9.0, -3.0, 4.0, 2.0]);
        assert_eq!(results[0], None);
        for r in &results[1..] {
            assert_eq!(*r, Some(0.0));
        }
    }

    #[test]
    fn two_point_window_is_the_secant_slope() {
        let results = betas(20, &[10.0, 12.0], &[3.0, 8.0]);
        assert_eq!(results[0], None);
        assert_approx_eq!(results[1].unwrap(), 2.5, 1e-9);
    }

    #[test]
    fn matches_direct_window_computation() {
        let xs = [
            10.1, 10.4, 9.8, 10.9, 11.3, 10.7, 10.2, 11.8, 12.4, 12.1, 11.6,
        ];
        let ys = [
            10.3, 10.9, 10.0, 11.2, 11.9, 11.0, 10.4, 12.3, 12.9, 12.2, 11.9,
        ];
        let period = 4;
        let results = betas(period, &xs, &ys);

        for i in 1..xs.len() {
            let lo = (i + 1).saturating_sub(period);
            let wx = &xs[lo..=i];
            let wy = &ys[lo..=i];
            let n = wx.len() as f64;
            let mx = wx.iter().sum::<f64>() / n;
            let my = wy.iter().sum::<f64>() / n;
            let mxy = wx.iter().zip(wy).map(|(x, y)| x * y).sum::<f64>() / n;
            let mx2 = wx.iter().map(|x| x * x).sum::<f64>() / n;
            let var = mx2 - mx * mx;
            let expected = if var.abs() < 1e-6 {
                0.0
            } else {
                (mxy - mx * my) / var
            };
            assert_approx_eq!(results[i].unwrap(), expected, 1e-6);
        }
    }

    #[test]
    fn variance_has_no_bessel_correction() {
        let mut stats = RollingBeta::new(3);
        stats
            .next((Some(1.0), Some(0.0)))
            .next((Some(2.0), Some(0.0)))
            .next((Some(3.0), Some(0.0)));
        assert_approx_eq!(stats.variance().unwrap(), 2.0 / 3.0, 1e-12);
    }

    #[test]
    fn missing_y_leaves_beta_undefined() {
        let mut stats = RollingBeta::new(3);
        let results: Vec<_> = [(1.0, None), (2.0, None), (4.0, Some(1.0))]
            .iter()
            .map(|&(x, y)| stats.next((Some(x), y)).beta())
            .collect();
        assert_eq!(results, vec![None, None, None]);
    }

    #[test]
    fn degenerate_window_wins_over_missing_covariance() {
        let mut stats = RollingBeta::new(3);
        stats.next((Some(3.0), None)).next((Some(3.0), None));
        assert_eq!(stats.cov(), None);
        assert_eq!(stats.beta(), Some(0.0));
    }

    #[test]
    fn missing_row_still_ages_out_of_the_window() {
        let mut stats = RollingBeta::new(2);
        let rows = [
            (Some(1.0), Some(1.0)),
            (None, Some(2.0)),
            (Some(2.0), Some(4.0)),
            (Some(4.0), Some(8.0)),
        ];
        let results: Vec<_> = rows.iter().map(|r| stats.next(*r).beta()).collect();
        assert_eq!(&results[..3], &[None, None, None]);
        assert_approx_eq!(results[3].unwrap(), 2.0, 1e-12);
    }

    #[test]
    fn nan_input_propagates() {
        let results = betas(3, &[1.0, f64::NAN, 3.0, 4.0, 5.0], &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(results[1].unwrap().is_nan());
        assert!(results[3].unwrap().is_nan());
        assert_approx_eq!(results[4].unwrap(), 1.0, 1e-9);
    }

    #[test]
    fn custom_epsilon() {
        let mut stats = RollingBeta::new(2);
        stats.set_epsilon(1.0);
        stats.next((Some(1.0), Some(1.0))).next((Some(2.0), Some(3.0)));
        // var_x = 0.25
        assert_eq!(stats.beta(), Some(0.0));

        stats.set_epsilon(0.1);
        assert_approx_eq!(stats.beta().unwrap(), 2.0, 1e-12);
    }

    #[test]
    fn reset_starts_a_new_series() {
        let mut stats = RollingBeta::new(3);
        stats.next((Some(1.0), Some(5.0))).next((Some(2.0), Some(1.0)));
        assert!(stats.beta().is_some());

        stats.reset();
        assert_eq!(stats.next((Some(7.0), Some(7.0))).beta(), None);
        assert_eq!(stats.period(), 3);
        assert_eq!(stats.min_periods(), 2);
    }
}
