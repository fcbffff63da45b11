//! Spectral analysis of uniformly sampled series
//!
//! Normalizes a uniform series to zero mean and unit variance and computes its
//! one-sided magnitude spectrum with a pre-planned real-to-complex FFT.
//!
//! # Features
//!
//! - Single-pass moments (mean, population standard deviation, min, max)
//! - Epsilon-guarded normalization so constant signals never divide by zero
//! - Planner reuse across metrics of the same batch
//! - Dominant frequency extraction that skips the DC bin
//!
//! # Example
//!
//! ```ignore
//! let moments = SeriesMoments::compute(&series.values).unwrap();
//! let signal = normalize(&series.values, &moments)?;
//! let spectrum = SpectrumAnalyzer::new().compute(&signal, series.sample_spacing())?;
//! let peak = spectrum.dominant_frequency();
//! ```

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex64;
use std::sync::Arc;

use super::ProcessingError;

/// Added to the standard deviation before dividing during normalization.
pub const NORMALIZATION_EPSILON: f64 = 1e-12;

// ============================================================================
// Moments
// ============================================================================

/// Descriptive statistics of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesMoments {
    pub mean: f64,
    /// Population standard deviation (divides by N)
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesMoments {
    /// Compute moments in one pass. Returns `None` for an empty slice.
    ///
    /// Variance is `E[x²] - E[x]²`, clamped at zero before the square root.
    pub fn compute(values: &[f64]) -> Option<Self> {
        let first = *values.first()?;
        let n = values.len() as f64;

        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut min = first;
        let mut max = first;
        for &x in values {
            sum += x;
            sum_sq += x * x;
            min = min.min(x);
            max = max.max(x);
        }

        let mean = sum / n;
        let variance = sum_sq / n - mean * mean;
        // A flat series has no spread even when the sums round unevenly
        let std_dev = if min == max || variance <= 0.0 {
            0.0
        } else {
            variance.sqrt()
        };

        Some(Self {
            mean,
            std_dev,
            min,
            max,
        })
    }
}

/// Scale `values` to zero mean and unit variance.
///
/// # Errors
/// [`ProcessingError::Allocation`] if the output buffer cannot be reserved.
pub fn normalize(values: &[f64], moments: &SeriesMoments) -> Result<Vec<f64>, ProcessingError> {
    let denom = moments.std_dev + NORMALIZATION_EPSILON;
    let mut signal = try_alloc(values.len(), 0.0, "normalized signal")?;
    for (out, &x) in signal.iter_mut().zip(values) {
        *out = (x - moments.mean) / denom;
    }
    Ok(signal)
}

// ============================================================================
// Magnitude Spectrum
// ============================================================================

/// One-sided magnitude spectrum: bins `0..=N/2` of an N-point transform.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeSpectrum {
    /// Bin centre frequencies (Hz)
    pub frequencies: Vec<f64>,
    /// `|X[k]|` for each bin, unscaled
    pub magnitudes: Vec<f64>,
}

impl MagnitudeSpectrum {
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Frequency of the largest-magnitude bin above DC.
    ///
    /// Ties resolve to the lowest frequency. `None` when the spectrum has
    /// fewer than two bins.
    pub fn dominant_frequency(&self) -> Option<f64> {
        if self.magnitudes.len() < 2 {
            return None;
        }

        let mut best_idx = 1;
        let mut best_mag = f64::NEG_INFINITY;
        for (k, &mag) in self.magnitudes.iter().enumerate().skip(1) {
            if mag > best_mag {
                best_mag = mag;
                best_idx = k;
            }
        }
        self.frequencies.get(best_idx).copied()
    }

    /// Magnitudes of the first `count` bins (fewer if the spectrum is shorter).
    pub fn prefix(&self, count: usize) -> Vec<f64> {
        self.magnitudes.iter().take(count).copied().collect()
    }
}

// ============================================================================
// Spectrum Analyzer (planner reused across calls)
// ============================================================================

/// Real-input FFT front end.
///
/// Keeps a planner so repeated transforms of the same length (the three
/// metrics of one batch usually share a length) reuse the cached plan.
pub struct SpectrumAnalyzer {
    planner: RealFftPlanner<f64>,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
        }
    }

    /// Compute the one-sided magnitude spectrum of `signal`.
    ///
    /// `sample_spacing` is the time between consecutive samples; bin `k`
    /// maps to `k / (sample_spacing * N)` Hz.
    ///
    /// # Errors
    /// - [`ProcessingError::InsufficientData`] for an empty signal
    /// - [`ProcessingError::Allocation`] if working buffers cannot be reserved
    /// - [`ProcessingError::Transform`] if the FFT rejects its buffers
    pub fn compute(
        &mut self,
        signal: &[f64],
        sample_spacing: f64,
    ) -> Result<MagnitudeSpectrum, ProcessingError> {
        let n = signal.len();
        if n == 0 {
            return Err(ProcessingError::InsufficientData {
                needed: 1,
                available: 0,
            });
        }

        let fft: Arc<dyn RealToComplex<f64>> = self.planner.plan_fft_forward(n);

        let mut input = try_alloc(n, 0.0, "fft input")?;
        input.copy_from_slice(signal);
        let zero = Complex64::new(0.0, 0.0);
        let mut output = try_alloc(fft.complex_len(), zero, "fft output")?;
        let mut scratch = try_alloc(fft.get_scratch_len(), zero, "fft scratch")?;

        fft.process_with_scratch(&mut input, &mut output, &mut scratch)
            .map_err(|e| ProcessingError::Transform(e.to_string()))?;

        let resolution = 1.0 / (sample_spacing * n as f64);
        let frequencies = (0..output.len()).map(|k| k as f64 * resolution).collect();
        let magnitudes = output.iter().map(|c| c.norm()).collect();

        Ok(MagnitudeSpectrum {
            frequencies,
            magnitudes,
        })
    }
}

/// Compute a magnitude spectrum with a throwaway planner.
pub fn compute_fft(
    signal: &[f64],
    sample_spacing: f64,
) -> Result<MagnitudeSpectrum, ProcessingError> {
    SpectrumAnalyzer::new().compute(signal, sample_spacing)
}

/// Allocate a buffer of `len` copies of `fill` without aborting on OOM.
fn try_alloc<T: Clone>(len: usize, fill: T, what: &str) -> Result<Vec<T>, ProcessingError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| ProcessingError::Allocation(format!("{what} ({len} elements): {e}")))?;
    buf.resize(len, fill);
    Ok(buf)
}

// ============================================================================
// Tests
// ============================================================================
