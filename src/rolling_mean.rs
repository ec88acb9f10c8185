use num_traits::Float;

use crate::{DEFAULT_MIN_PERIODS, Kbn, utils::RingBuffer};

/// Trailing-window mean over a series that may contain missing observations.
///
/// The window always spans the last `period` rows, missing or not, and the mean is taken
/// over the observations that are present. Until at least `min_periods` observations are
/// present the mean is undefined, which is how the start of a series (and any sparse
/// stretch) is handled.
///
/// Running sums use Kahan-Babuska-Neumaier compensation. Non-finite observations are kept
/// out of the running sum; while one of them is inside the window the mean is taken
/// directly over the buffer, so a `NaN` or infinity affects exactly the windows that
/// contain it.
#[derive(Debug, Clone)]
pub struct RollingMean<T> {
    /// Window length in rows
    period: usize,
    /// Observations required for a defined mean
    min_periods: usize,
    /// Rows currently inside the window
    buf: RingBuffer<Option<T>>,
    /// Compensated sum of finite observations in the window
    sum: Kbn<T>,
    /// Present observations in the window
    count: usize,
    /// Non-finite observations in the window
    non_finite: usize,
}

impl<T: Float + Default> RollingMean<T> {
    /// Creates a rolling mean over `period` rows requiring two observations.
    ///
    /// # Arguments
    ///
    /// * `period` - The window length in rows
    ///
    /// # Returns
    ///
    /// * `Self` - The rolling mean
    pub fn new(period: usize) -> Self {
        Self::with_min_periods(period, DEFAULT_MIN_PERIODS)
    }

    /// Creates a rolling mean over `period` rows requiring `min_periods` observations.
    ///
    /// `min_periods` is clamped into `1..=period`.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn with_min_periods(period: usize, min_periods: usize) -> Self {
        Self {
            period,
            min_periods: min_periods.clamp(1, period.max(1)),
            buf: RingBuffer::new(period),
            sum: Kbn::default(),
            count: 0,
            non_finite: 0,
        }
    }

    /// Returns the window length in rows
    #[inline]
    pub const fn period(&self) -> usize {
        self.period
    }

    /// Returns the number of observations required for a defined mean
    #[inline]
    pub const fn min_periods(&self) -> usize {
        self.min_periods
    }

    /// Returns the number of present observations in the window
    #[inline]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Returns the number of rows in the window, present or missing
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true once enough observations are present for a defined mean
    #[inline]
    pub const fn is_ready(&self) -> bool {
        self.count >= self.min_periods
    }

    /// Clears the window
    ///
    /// # Returns
    ///
    /// * `&mut Self` - The rolling mean
    pub fn reset(&mut self) -> &mut Self {
        self.buf.clear();
        self.sum = Kbn::default();
        self.count = 0;
        self.non_finite = 0;
        self
    }

    /// Pushes the next row into the window, evicting the oldest row once full
    ///
    /// # Arguments
    ///
    /// * `value` - The observation, `None` when missing
    ///
    /// # Returns
    ///
    /// * `&mut Self` - The rolling mean
    pub fn next(&mut self, value: Option<T>) -> &mut Self {
        if let Some(Some(evicted)) = self.buf.push(value) {
            self.count -= 1;
            if evicted.is_finite() {
                self.sum -= evicted;
            } else {
                self.non_finite -= 1;
            }
        }

        if let Some(v) = value {
            self.count += 1;
            if v.is_finite() {
                self.sum += v;
            } else {
                self.non_finite += 1;
            }
        }
        self
    }

    /// Rebuilds the running sum from the buffered rows, discarding any rounding drift
    /// accumulated by repeated add/evict cycles
    pub fn recompute(&mut self) {
        self.sum = Kbn::default();
        self.count = 0;
        self.non_finite = 0;
        for v in self.buf.iter().flatten().copied() {
            self.count += 1;
            if v.is_finite() {
                self.sum += v;
            } else {
                self.non_finite += 1;
            }
        }
    }

    /// Returns the sum of the present observations in the window
    ///
    /// # Returns
    ///
    /// * `Option<T>` - The sum, or `None` if fewer than `min_periods` observations are present
    pub fn sum(&self) -> Option<T> {
        if !self.is_ready() {
            return None;
        }
        if self.non_finite > 0 {
            return Some(
                self.buf
                    .iter()
                    .flatten()
                    .copied()
                    .fold(T::zero(), |acc, v| acc + v),
            );
        }
        Some(self.sum.total())
    }

    /// Returns the mean of the present observations in the window
    ///
    /// # Returns
    ///
    /// * `Option<T>` - The mean, or `None` if fewer than `min_periods` observations are present
    ///
    /// # Examples
    ///
    /// ```
    /// use ta_rolling_beta::RollingMean;
    /// use assert_approx_eq::assert_approx_eq;
    ///
    /// let mut mean = RollingMean::<f64>::new(3);
    /// let inputs = [Some(1.0), Some(2.0), None, Some(6.0), Some(8.0)];
    /// let results: Vec<_> = inputs.iter().map(|v| mean.next(*v).mean()).collect();
    ///
    /// assert_eq!(results[0], None);
    /// let expected: [f64; 4] = [1.5, 1.5, 4.0, 7.0];
    /// for (e, r) in expected.iter().zip(&results[1..]) {
    ///     assert_approx_eq!(e, r.unwrap(), 1e-12);
    /// }
    /// ```
    pub fn mean(&self) -> Option<T> {
        self.sum()
            .zip(T::from(self.count))
            .map(|(sum, n)| sum / n)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn means(period: usize, inputs: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut stats = RollingMean::new(period);
        inputs.iter().map(|v| stats.next(*v).mean()).collect()
    }

    #[test]
    fn mean_is_clipped_at_series_start() {
        let results = means(3, &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        assert_eq!(results[0], None);
        assert_approx_eq!(results[1].unwrap(), 1.5, 1e-12);
        assert_approx_eq!(results[2].unwrap(), 2.0, 1e-12);
        assert_approx_eq!(results[3].unwrap(), 3.0, 1e-12);
    }

    #[test]
    fn missing_rows_occupy_the_window() {
        let results = means(2, &[Some(1.0), None, Some(3.0), Some(5.0)]);
        assert_eq!(results, vec![None, None, None, Some(4.0)]);
    }

    #[test]
    fn min_periods_is_clamped_to_period() {
        let stats = RollingMean::<f64>::with_min_periods(3, 10);
        assert_eq!(stats.min_periods(), 3);
        let stats = RollingMean::<f64>::with_min_periods(3, 0);
        assert_eq!(stats.min_periods(), 1);
    }

    #[test]
    fn nan_only_affects_windows_containing_it() {
        let results = means(2, &[Some(1.0), Some(f64::NAN), Some(3.0), Some(5.0)]);
        assert!(results[1].unwrap().is_nan());
        assert!(results[2].unwrap().is_nan());
        assert_approx_eq!(results[3].unwrap(), 4.0, 1e-12);
    }

    #[test]
    fn infinity_propagates_then_leaves() {
        let results = means(2, &[Some(f64::INFINITY), Some(1.0), Some(3.0)]);
        assert_eq!(results[1], Some(f64::INFINITY));
        assert_approx_eq!(results[2].unwrap(), 2.0, 1e-12);
    }

    #[test]
    fn large_magnitudes_stay_accurate() {
        let inputs: Vec<_> = (0..10_000)
            .map(|i| Some(1_000_000.0 + (i % 7) as f64 * 0.1))
            .collect();
        let mut stats = RollingMean::new(5);
        inputs.iter().for_each(|v| {
            stats.next(*v);
        });
        let incremental = stats.mean().unwrap();
        stats.recompute();
        assert_approx_eq!(incremental, stats.mean().unwrap(), 1e-9);
    }

    #[test]
    fn reset_clears_state() {
        let mut stats = RollingMean::new(3);
        stats.next(Some(1.0)).next(Some(2.0));
        assert!(stats.is_ready());

        stats.reset();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.len(), 0);
        assert_eq!(stats.next(Some(5.0)).mean(), None);
        assert_approx_eq!(stats.next(Some(7.0)).mean().unwrap(), 6.0, 1e-12);
    }
}
