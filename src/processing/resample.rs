//! Irregular-to-uniform resampling
//!
//! Sensor records arrive with jittered, unordered timestamps. Spectral
//! analysis needs evenly spaced samples, so each metric's series is sorted,
//! re-based to start at zero and linearly interpolated onto a grid with the
//! same number of points as there were valid samples.

use super::ProcessingError;

/// Span substituted when every sample shares one timestamp.
pub const DEGENERATE_SPAN: f64 = 1e-6;

/// Minimum number of samples needed to build a uniform series.
pub const MIN_SAMPLES: usize = 2;

/// One `(time, value)` observation of a single metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Timestamp in seconds
    pub time: f64,
    /// Observed value
    pub value: f64,
}

impl Sample {
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

/// Evenly spaced series produced by [`resample_uniform`].
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSeries {
    /// Grid points, starting at 0 and ending at the input span
    pub times: Vec<f64>,
    /// Interpolated values at each grid point
    pub values: Vec<f64>,
}

impl UniformSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Spacing between the first two grid points (1.0 for a single point).
    pub fn sample_spacing(&self) -> f64 {
        match self.times.as_slice() {
            [first, second, ..] => second - first,
            _ => 1.0,
        }
    }
}

/// Resample an unordered sample series onto a uniform grid.
///
/// The output has exactly `samples.len()` points spanning `[0, span]`, where
/// `span` is the distance between the earliest and latest timestamp. Grid
/// points are filled by piecewise-linear interpolation between the bracketing
/// samples; nothing is extrapolated.
///
/// # Errors
/// [`ProcessingError::InsufficientData`] for fewer than two samples.
pub fn resample_uniform(samples: &[Sample]) -> Result<UniformSeries, ProcessingError> {
    let n = samples.len();
    if n < MIN_SAMPLES {
        return Err(ProcessingError::InsufficientData {
            needed: MIN_SAMPLES,
            available: n,
        });
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.time.total_cmp(&b.time));

    let origin = sorted[0].time;
    let times: Vec<f64> = sorted.iter().map(|s| s.time - origin).collect();
    let values: Vec<f64> = sorted.iter().map(|s| s.value).collect();

    let mut span = times[n - 1];
    if span <= 0.0 {
        span = DEGENERATE_SPAN;
    }

    let last = (n - 1) as f64;
    let grid: Vec<f64> = (0..n)
        .map(|i| if i == n - 1 { span } else { span * i as f64 / last })
        .collect();

    let interpolated = grid
        .iter()
        .map(|&g| interpolate_at(&times, &values, g))
        .collect();

    Ok(UniformSeries {
        times: grid,
        values: interpolated,
    })
}

/// Value at `t` on the polyline through `(times[i], values[i])`.
///
/// `times` must be sorted ascending. Points before the first sample take the
/// first value; points after the last take the last value.
fn interpolate_at(times: &[f64], values: &[f64], t: f64) -> f64 {
    let j = times.partition_point(|&x| x < t);
    if j == 0 {
        return values[0];
    }
    if j == times.len() {
        return values[values.len() - 1];
    }
    if times[j] == t {
        return values[j];
    }

    // times[j - 1] < t < times[j], so the bracket is never zero-width
    let (t0, t1) = (times[j - 1], times[j]);
    let (v0, v1) = (values[j - 1], values[j]);
    let alpha = (t - t0) / (t1 - t0);
    v0 + alpha * (v1 - v0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(points: &[(f64, f64)]) -> Vec<Sample> {
        points.iter().map(|&(t, v)| Sample::new(t, v)).collect()
    }

    #[test]
    fn test_rejects_short_series() {
        let err = resample_uniform(&samples(&[(1.0, 2.0)])).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::InsufficientData {
                needed: 2,
                available: 1
            }
        ));
        assert!(resample_uniform(&[]).is_err());
    }

    #[test]
    fn test_length_and_endpoints_preserved() {
        let input = samples(&[(10.0, 1.0), (10.3, 4.0), (11.9, -2.0), (12.5, 7.5), (14.0, 3.25)]);
        let out = resample_uniform(&input).unwrap();

        assert_eq!(out.len(), input.len());
        assert_eq!(out.times.len(), input.len());
        assert_eq!(out.values[0], 1.0);
        assert_eq!(out.values[4], 3.25);
        assert_eq!(out.times[0], 0.0);
        assert_eq!(out.times[4], 4.0);
    }

    #[test]
    fn test_linear_interpolation_between_brackets() {
        // Grid for span 3 with 3 points: 0, 1.5, 3
        let input = samples(&[(0.0, 0.0), (1.0, 10.0), (3.0, 30.0)]);
        let out = resample_uniform(&input).unwrap();

        assert_eq!(out.times, vec![0.0, 1.5, 3.0]);
        // 1.5 sits between t=1 (10) and t=3 (30)
        assert!((out.values[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_order_independent() {
        let ordered = samples(&[(0.0, 5.0), (0.7, 1.0), (2.2, 9.0), (3.1, 4.0), (5.0, 2.0)]);
        let mut shuffled = ordered.clone();
        shuffled.reverse();
        shuffled.swap(1, 3);

        let a = resample_uniform(&ordered).unwrap();
        let b = resample_uniform(&shuffled).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_timestamps_rebased_to_zero() {
        let input = samples(&[(1_700_000_000.0, 1.0), (1_700_000_004.0, 2.0)]);
        let out = resample_uniform(&input).unwrap();
        assert_eq!(out.times, vec![0.0, 4.0]);
        assert_eq!(out.sample_spacing(), 4.0);
    }

    #[test]
    fn test_degenerate_span_uses_nominal_width() {
        let input = samples(&[(5.0, 1.0), (5.0, 2.0), (5.0, 3.0)]);
        let out = resample_uniform(&input).unwrap();

        assert_eq!(out.len(), 3);
        assert!(out.sample_spacing() > 0.0);
        assert!((out.times[2] - DEGENERATE_SPAN).abs() < f64::EPSILON);
        assert!(out.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_even_input_reproduced() {
        let input: Vec<Sample> = (0..20)
            .map(|i| Sample::new(i as f64 * 0.5, (i * i) as f64))
            .collect();
        let out = resample_uniform(&input).unwrap();
        for (expected, got) in input.iter().zip(&out.values) {
            assert!((expected.value - got).abs() < 1e-9);
        }
    }
}
