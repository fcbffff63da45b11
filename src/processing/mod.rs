//! Signal processing module - resampling and spectral statistics per metric
//!
//! ```text
//! Vec<Sample> --resample_uniform--> UniformSeries --moments/normalize--> signal
//!             --SpectrumAnalyzer--> MagnitudeSpectrum --> Stats
//! ```

mod fft;
mod resample;

pub use fft::*;
pub use resample::{resample_uniform, Sample, UniformSeries, DEGENERATE_SPAN, MIN_SAMPLES};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::defaults::SPECTRUM_PREFIX_BINS;
use crate::types::Stats;

/// Errors in signal processing
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Insufficient data: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Buffer allocation failed: {0}")]
    Allocation(String),

    #[error("FFT error: {0}")]
    Transform(String),
}

/// Turns a metric's sample series into [`Stats`].
///
/// One analyzer serves every metric of a batch so the FFT plan cache is
/// shared between them.
pub struct SignalAnalyzer {
    spectrum: SpectrumAnalyzer,
    spectrum_bins: usize,
}

impl Default for SignalAnalyzer {
    fn default() -> Self {
        Self::new(SPECTRUM_PREFIX_BINS)
    }
}

impl SignalAnalyzer {
    /// Create an analyzer that keeps `spectrum_bins` magnitudes per metric.
    pub fn new(spectrum_bins: usize) -> Self {
        Self {
            spectrum: SpectrumAnalyzer::new(),
            spectrum_bins,
        }
    }

    /// Analyze one metric. Never fails: an unusable series yields
    /// [`Stats::undefined`].
    pub fn analyze(&mut self, samples: &[Sample]) -> Stats {
        match self.try_analyze(samples) {
            Ok(stats) => stats,
            Err(ProcessingError::InsufficientData { needed, available }) => {
                debug!(needed, available, "Too few samples, stats undefined");
                Stats::undefined()
            }
            Err(e) => {
                warn!(error = %e, "Spectral analysis failed, stats undefined");
                Stats::undefined()
            }
        }
    }

    /// Analyze one metric, surfacing why it could not be analyzed.
    pub fn try_analyze(&mut self, samples: &[Sample]) -> Result<Stats, ProcessingError> {
        let series = resample_uniform(samples)?;
        let moments = SeriesMoments::compute(&series.values).ok_or(
            ProcessingError::InsufficientData {
                needed: MIN_SAMPLES,
                available: 0,
            },
        )?;

        let signal = normalize(&series.values, &moments)?;
        let spectrum = self.spectrum.compute(&signal, series.sample_spacing())?;

        Ok(Stats {
            dominant_freq_hz: spectrum.dominant_frequency(),
            spectrum: spectrum.prefix(self.spectrum_bins),
            mean: Some(moments.mean),
            std_dev: Some(moments.std_dev),
            min: Some(moments.min),
            max: Some(moments.max),
        })
    }
}
