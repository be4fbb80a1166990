//! Digital Filter Implementations
//!
//! Two realisations of a `FilterSpec`:
//! - spectral: FFT, mask the rejected bins, inverse FFT (zero phase, idempotent)
//! - butterworth: IIR second-order sections (biquads), run forward and backward

use crate::error::{AnalysisError, Result};
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::f64::consts::PI;

// Thread-local FFT planner, reused across channels processed on the same worker
thread_local! {
    static FFT_PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

/// Filter kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Reject `[low, high]`
    Notch,
    /// Keep `[low, high]`
    BandPass,
    /// Keep everything at or above `low`
    HighPass,
    /// Keep everything at or below `high`
    LowPass,
}

/// Named filter with its frequency edges in Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub name: String,
    pub kind: FilterKind,
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl FilterSpec {
    pub fn notch(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            kind: FilterKind::Notch,
            low: Some(low),
            high: Some(high),
        }
    }

    pub fn band_pass(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            kind: FilterKind::BandPass,
            low: Some(low),
            high: Some(high),
        }
    }

    pub fn high_pass(name: impl Into<String>, low: f64) -> Self {
        Self {
            name: name.into(),
            kind: FilterKind::HighPass,
            low: Some(low),
            high: None,
        }
    }

    pub fn low_pass(name: impl Into<String>, high: f64) -> Self {
        Self {
            name: name.into(),
            kind: FilterKind::LowPass,
            low: None,
            high: Some(high),
        }
    }

    fn require(&self, edge: Option<f64>, which: &str) -> Result<f64> {
        edge.ok_or_else(|| {
            AnalysisError::Filter(format!(
                "{} filter '{}' requires a {} cutoff",
                self.kind_label(),
                self.name,
                which
            ))
        })
    }

    fn kind_label(&self) -> &'static str {
        match self.kind {
            FilterKind::Notch => "Notch",
            FilterKind::BandPass => "Band-pass",
            FilterKind::HighPass => "High-pass",
            FilterKind::LowPass => "Low-pass",
        }
    }

    /// Check the edges against each other and against the Nyquist limit.
    pub fn validate(&self, sample_rate: f64) -> Result<()> {
        let nyquist = sample_rate / 2.0;

        let (low, high) = match self.kind {
            FilterKind::Notch | FilterKind::BandPass => (
                Some(self.require(self.low, "low")?),
                Some(self.require(self.high, "high")?),
            ),
            FilterKind::HighPass => (Some(self.require(self.low, "low")?), self.high),
            FilterKind::LowPass => (self.low, Some(self.require(self.high, "high")?)),
        };

        for edge in [low, high].into_iter().flatten() {
            if !edge.is_finite() || edge < 0.0 {
                return Err(AnalysisError::Filter(format!(
                    "Filter '{}' has invalid cutoff {} Hz",
                    self.name, edge
                )));
            }
            if edge >= nyquist {
                return Err(AnalysisError::Filter(format!(
                    "Filter '{}': cutoff frequency ({} Hz) must be less than Nyquist ({} Hz) at {} Hz sampling",
                    self.name, edge, nyquist, sample_rate
                )));
            }
        }

        if let (Some(low), Some(high)) = (low, high) {
            if low >= high {
                return Err(AnalysisError::Filter(format!(
                    "Filter '{}': low cutoff ({} Hz) must be less than high cutoff ({} Hz)",
                    self.name, low, high
                )));
            }
        }

        Ok(())
    }

    /// Whether a component at `freq` survives this filter (ideal response).
    pub fn passes(&self, freq: f64) -> bool {
        let above_low = self.low.map_or(true, |low| freq >= low);
        let below_high = self.high.map_or(true, |high| freq <= high);
        match self.kind {
            FilterKind::Notch => !(above_low && below_high),
            FilterKind::BandPass | FilterKind::HighPass | FilterKind::LowPass => {
                above_low && below_high
            }
        }
    }
}

/// How filter specs are realised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FilterDesign {
    Spectral,
    Butterworth { order: usize },
}

impl Default for FilterDesign {
    fn default() -> Self {
        Self::Spectral
    }
}

/// Apply the ideal response of all `specs` in a single FFT round trip.
///
/// Masks multiply, so this equals applying the specs one after another.
pub fn spectral_filter(signal: &[f64], sample_rate: f64, specs: &[FilterSpec]) -> Vec<f64> {
    let n = signal.len();
    if n == 0 || specs.is_empty() {
        return signal.to_vec();
    }

    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();

    FFT_PLANNER.with(|planner| {
        let mut planner = planner.borrow_mut();
        let forward = planner.plan_fft_forward(n);
        forward.process(&mut buffer);

        for (k, bin) in buffer.iter_mut().enumerate() {
            // Negative-frequency bins mirror their positive counterpart
            let mirrored = if k <= n / 2 { k } else { n - k };
            let freq = mirrored as f64 * sample_rate / n as f64;
            if !specs.iter().all(|spec| spec.passes(freq)) {
                *bin = Complex::new(0.0, 0.0);
            }
        }

        let inverse = planner.plan_fft_inverse(n);
        inverse.process(&mut buffer);
    });

    let scale = 1.0 / n as f64;
    buffer.iter().map(|c| c.re * scale).collect()
}

/// Second-order section (biquad) coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// State for a single biquad section (Direct Form II Transposed)
#[derive(Debug, Clone, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

/// Single biquad filter section
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.state = BiquadState::default();
    }
}

/// Cascaded second-order sections filter
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<BiquadFilter>,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>) -> Self {
        Self {
            sections: sections.into_iter().map(BiquadFilter::new).collect(),
        }
    }

    /// Chain another cascade after this one.
    pub fn then(mut self, other: SosFilter) -> Self {
        self.sections.extend(other.sections);
        self
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(input, |acc, section| section.process(acc))
    }

    /// Causal pass over a signal (original unchanged)
    pub fn filter(&mut self, signal: &[f64]) -> Vec<f64> {
        signal.iter().map(|&s| self.process(s)).collect()
    }

    /// Zero-phase forward-backward pass with odd-reflection padding at both ends.
    pub fn filtfilt(&mut self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n < 2 {
            return signal.to_vec();
        }

        let pad = (3 * (2 * self.sections.len() + 1)).min(n - 1);
        let first = signal[0];
        let last = signal[n - 1];

        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        extended.extend_from_slice(signal);
        extended.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        self.reset();
        let mut forward = self.filter(&extended);
        forward.reverse();
        self.reset();
        let mut backward = self.filter(&forward);
        backward.reverse();

        backward[pad..pad + n].to_vec()
    }

    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

/// Butterworth filter designer (bilinear transform)
pub struct ButterworthFilter;

impl ButterworthFilter {
    pub fn lowpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff, sample_rate);
        SosFilter::new(Self::design(wn, order, false))
    }

    pub fn highpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff, sample_rate);
        SosFilter::new(Self::design(wn, order, true))
    }

    /// Bandpass as a highpass/lowpass cascade
    pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> SosFilter {
        Self::highpass(low, sample_rate, order).then(Self::lowpass(high, sample_rate, order))
    }

    fn prewarp(freq: f64, sample_rate: f64) -> f64 {
        (PI * freq / sample_rate).tan()
    }

    fn design(wn: f64, order: usize, highpass: bool) -> Vec<BiquadCoeffs> {
        let order = order.max(1);
        let num_sections = (order + 1) / 2;
        let mut sections = Vec::with_capacity(num_sections);

        for k in 0..num_sections {
            if order % 2 == 1 && k == num_sections - 1 {
                // Real pole: H(s) = 1 / (s + 1)
                let a1 = (wn - 1.0) / (wn + 1.0);
                let coeffs = if highpass {
                    let g = 1.0 / (1.0 + wn);
                    BiquadCoeffs { b0: g, b1: -g, b2: 0.0, a1, a2: 0.0 }
                } else {
                    let g = wn / (1.0 + wn);
                    BiquadCoeffs { b0: g, b1: g, b2: 0.0, a1, a2: 0.0 }
                };
                sections.push(coeffs);
                continue;
            }

            // Conjugate pole pair: H(s) = 1 / (s^2 + alpha*s + 1)
            let theta = PI * (2.0 * k as f64 + 1.0) / (2.0 * order as f64);
            let alpha = 2.0 * theta.sin();
            let wn2 = wn * wn;
            let denom = 1.0 + alpha * wn + wn2;
            let a1 = 2.0 * (wn2 - 1.0) / denom;
            let a2 = (1.0 - alpha * wn + wn2) / denom;

            let (b0, b1, b2) = if highpass {
                (1.0 / denom, -2.0 / denom, 1.0 / denom)
            } else {
                (wn2 / denom, 2.0 * wn2 / denom, wn2 / denom)
            };
            sections.push(BiquadCoeffs { b0, b1, b2, a1, a2 });
        }

        sections
    }
}

/// Notch (band-reject) filter for removing specific frequencies
pub struct NotchFilter;

impl NotchFilter {
    /// Design a notch filter to remove a specific frequency
    ///
    /// # Arguments
    /// * `center_freq` - Frequency to remove (Hz)
    /// * `sample_rate` - Sampling rate (Hz)
    /// * `q_factor` - Quality factor (higher = narrower notch)
    pub fn design(center_freq: f64, sample_rate: f64, q_factor: f64) -> SosFilter {
        let w0 = 2.0 * PI * center_freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q_factor);
        let a0 = 1.0 + alpha;

        SosFilter::new(vec![BiquadCoeffs {
            b0: 1.0 / a0,
            b1: -2.0 * cos_w0 / a0,
            b2: 1.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }])
    }
}

/// Build the IIR cascade for a validated spec.
pub fn create_sos_filter(spec: &FilterSpec, sample_rate: f64, order: usize) -> Result<SosFilter> {
    spec.validate(sample_rate)?;

    // validate() guarantees the required edges are present
    let low = spec.low.unwrap_or(0.0);
    let high = spec.high.unwrap_or(0.0);

    Ok(match spec.kind {
        FilterKind::LowPass => ButterworthFilter::lowpass(high, sample_rate, order),
        FilterKind::HighPass => match spec.high {
            Some(high) => ButterworthFilter::bandpass(low, high, sample_rate, order),
            None => ButterworthFilter::highpass(low, sample_rate, order),
        },
        FilterKind::BandPass => {
            if low > 0.0 {
                ButterworthFilter::bandpass(low, high, sample_rate, order)
            } else {
                ButterworthFilter::lowpass(high, sample_rate, order)
            }
        }
        FilterKind::Notch => {
            let center = (low + high) / 2.0;
            let q = center / (high - low);
            NotchFilter::design(center, sample_rate, q)
        }
    })
}
