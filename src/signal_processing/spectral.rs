//! Welch power spectral density estimation.

use crate::error::{AnalysisError, Result};
use crate::recording::Recording;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::f64::consts::PI;

thread_local! {
    static FFT_PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

/// Parameters for Welch's method (Hamming window, constant detrend,
/// one-sided density scaling).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WelchParams {
    /// Segment (and FFT) length in samples
    pub n_fft: usize,
    /// Samples shared between consecutive segments
    pub n_overlap: usize,
}

impl Default for WelchParams {
    fn default() -> Self {
        Self {
            n_fft: 256,
            n_overlap: 0,
        }
    }
}

impl WelchParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_fft == 0 {
            return Err(AnalysisError::Data(
                "Welch segment length must be positive".to_string(),
            ));
        }
        if self.n_overlap >= self.n_fft {
            return Err(AnalysisError::Data(format!(
                "Welch overlap ({}) must be smaller than the segment length ({})",
                self.n_overlap, self.n_fft
            )));
        }
        Ok(())
    }
}

/// PSD of one channel: ascending frequency axis with aligned power values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralEstimate {
    pub channel: String,
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
}

impl SpectralEstimate {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Welch PSD of a single signal.
///
/// The segment length is clamped to the signal length so short recordings
/// still produce a (coarser) estimate.
pub fn welch(
    signal: &[f64],
    sample_rate: f64,
    params: &WelchParams,
) -> Result<(Vec<f64>, Vec<f64>)> {
    params.validate()?;
    if signal.is_empty() {
        return Err(AnalysisError::Data("Cannot estimate PSD of an empty channel".to_string()));
    }

    let seg_len = params.n_fft.min(signal.len());
    let overlap = params.n_overlap.min(seg_len - 1);
    let step = seg_len - overlap;
    let num_segments = (signal.len() - seg_len) / step + 1;

    let window = hamming(seg_len);
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let n_freqs = seg_len / 2 + 1;
    let mut accumulated = vec![0.0; n_freqs];

    FFT_PLANNER.with(|planner| {
        let fft = planner.borrow_mut().plan_fft_forward(seg_len);
        let mut buffer = vec![Complex::new(0.0, 0.0); seg_len];

        for segment_idx in 0..num_segments {
            let segment = &signal[segment_idx * step..segment_idx * step + seg_len];
            let mean = segment.iter().sum::<f64>() / seg_len as f64;

            for ((slot, &x), &w) in buffer.iter_mut().zip(segment).zip(&window) {
                *slot = Complex::new((x - mean) * w, 0.0);
            }
            fft.process(&mut buffer);

            for (acc, c) in accumulated.iter_mut().zip(&buffer[..n_freqs]) {
                *acc += c.norm_sqr();
            }
        }
    });

    let scale = 1.0 / (sample_rate * window_power * num_segments as f64);
    let power: Vec<f64> = accumulated
        .iter()
        .enumerate()
        .map(|(k, &p)| {
            // One-sided: fold negative frequencies, except DC and (even) Nyquist
            let is_nyquist = seg_len % 2 == 0 && k == seg_len / 2;
            if k == 0 || is_nyquist {
                p * scale
            } else {
                2.0 * p * scale
            }
        })
        .collect();

    let frequencies = (0..n_freqs)
        .map(|k| k as f64 * sample_rate / seg_len as f64)
        .collect();

    Ok((frequencies, power))
}

/// One estimate per channel, in channel order.
pub fn estimate_psd(recording: &Recording, params: &WelchParams) -> Result<Vec<SpectralEstimate>> {
    params.validate()?;
    let sample_rate = recording.sample_rate();

    let estimates = recording
        .channel_names()
        .par_iter()
        .zip(recording.data().par_iter())
        .map(|(name, samples)| {
            let (frequencies, power) = welch(samples, sample_rate, params).map_err(|e| {
                AnalysisError::Data(format!("Channel '{}': {}", name, e))
            })?;
            Ok(SpectralEstimate {
                channel: name.clone(),
                frequencies,
                power,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        channels = estimates.len(),
        bins = estimates.first().map(SpectralEstimate::len).unwrap_or(0),
        "PSD estimated"
    );

    Ok(estimates)
}

/// Cross-channel mean curve. All estimates must share one frequency axis.
pub fn mean_spectrum(estimates: &[SpectralEstimate]) -> Result<SpectralEstimate> {
    let first = estimates
        .first()
        .ok_or_else(|| AnalysisError::Data("No spectral estimates to average".to_string()))?;

    if let Some(other) = estimates
        .iter()
        .find(|e| e.frequencies.len() != first.frequencies.len())
    {
        return Err(AnalysisError::Data(format!(
            "Channel '{}' has {} frequency bins, expected {}",
            other.channel,
            other.frequencies.len(),
            first.frequencies.len()
        )));
    }

    let n = estimates.len() as f64;
    let power = (0..first.len())
        .map(|k| estimates.iter().map(|e| e.power[k]).sum::<f64>() / n)
        .collect();

    Ok(SpectralEstimate {
        channel: "mean".to_string(),
        frequencies: first.frequencies.clone(),
        power,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_peak_at_signal_frequency() {
        let (freqs, power) = welch(&sine(10.0, 256.0, 2560), 256.0, &WelchParams::default()).unwrap();

        assert_eq!(freqs.len(), 129);
        assert_eq!(freqs.len(), power.len());
        assert!(freqs.windows(2).all(|w| w[0] < w[1]));

        let peak_idx = power
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(freqs[peak_idx], 10.0);
    }

    #[test]
    fn test_density_scaling_preserves_variance() {
        // Parseval: the integral of a one-sided density equals the signal variance.
        let signal = sine(16.0, 256.0, 4096);
        let (freqs, power) = welch(&signal, 256.0, &WelchParams::default()).unwrap();
        let df = freqs[1] - freqs[0];
        let integral: f64 = power.iter().sum::<f64>() * df;
        assert!((integral - 0.5).abs() < 0.02, "integral = {}", integral);
    }

    #[test]
    fn test_short_signal_uses_shorter_segment() {
        let (freqs, _) = welch(&sine(10.0, 256.0, 100), 256.0, &WelchParams::default()).unwrap();
        assert_eq!(freqs.len(), 51);
    }

    #[test]
    fn test_deterministic() {
        let signal = sine(7.0, 256.0, 1000);
        let params = WelchParams { n_fft: 128, n_overlap: 64 };
        let a = welch(&signal, 256.0, &params).unwrap();
        let b = welch(&signal, 256.0, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_channel_is_data_error() {
        assert!(matches!(
            welch(&[], 256.0, &WelchParams::default()),
            Err(AnalysisError::Data(_))
        ));
    }

    #[test]
    fn test_invalid_params() {
        let params = WelchParams { n_fft: 64, n_overlap: 64 };
        assert!(welch(&[0.0; 100], 256.0, &params).is_err());
    }

    #[test]
    fn test_mean_spectrum() {
        let a = SpectralEstimate {
            channel: "a".to_string(),
            frequencies: vec![0.0, 1.0],
            power: vec![1.0, 3.0],
        };
        let b = SpectralEstimate {
            channel: "b".to_string(),
            frequencies: vec![0.0, 1.0],
            power: vec![3.0, 5.0],
        };
        let mean = mean_spectrum(&[a, b]).unwrap();
        assert_eq!(mean.power, vec![2.0, 4.0]);
        assert!(mean_spectrum(&[]).is_err());
    }
}
