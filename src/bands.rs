//! Band Aggregator: PSD → absolute and relative power per EEG band.

use crate::error::{AnalysisError, Result};
use crate::signal_processing::SpectralEstimate;
use serde::{Deserialize, Serialize};

/// Name of the whole-range entry appended to the band summaries.
pub const FULL_RANGE: &str = "Full";

/// Named frequency range `[low, high]` in Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandDefinition {
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl BandDefinition {
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({}-{} Hz)", self.name, self.low, self.high)
    }
}

/// Delta, Theta, Alpha, Beta, Gamma: contiguous over 0.5–45 Hz.
pub fn canonical_bands() -> Vec<BandDefinition> {
    vec![
        BandDefinition::new("Delta", 0.5, 4.0),
        BandDefinition::new("Theta", 4.0, 8.0),
        BandDefinition::new("Alpha", 8.0, 13.0),
        BandDefinition::new("Beta", 13.0, 30.0),
        BandDefinition::new("Gamma", 30.0, 45.0),
    ]
}

/// Bands must be non-empty, ascending, contiguous and non-overlapping.
pub fn validate_bands(bands: &[BandDefinition]) -> Result<()> {
    if bands.is_empty() {
        return Err(AnalysisError::Data("At least one band is required".to_string()));
    }
    for band in bands {
        if !(band.low.is_finite() && band.high.is_finite()) || band.low < 0.0 || band.low >= band.high {
            return Err(AnalysisError::Data(format!(
                "Band '{}' has an invalid range {}-{} Hz",
                band.name, band.low, band.high
            )));
        }
    }
    for pair in bands.windows(2) {
        if (pair[0].high - pair[1].low).abs() > 1e-9 {
            return Err(AnalysisError::Data(format!(
                "Bands '{}' and '{}' are not contiguous ({} Hz vs {} Hz)",
                pair[0].name, pair[1].name, pair[0].high, pair[1].low
            )));
        }
    }
    Ok(())
}

/// Trapezoidal integral of the piecewise-linear curve `(freqs, power)` over
/// `[low, high]`. Only the part of the range covered by `freqs` contributes.
pub fn integrate(freqs: &[f64], power: &[f64], low: f64, high: f64) -> f64 {
    let n = freqs.len().min(power.len());
    if n < 2 || low >= high {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n - 1 {
        let (f0, f1) = (freqs[i], freqs[i + 1]);
        let a = f0.max(low);
        let b = f1.min(high);
        if b <= a || f1 <= f0 {
            continue;
        }
        let interp = |f: f64| power[i] + (power[i + 1] - power[i]) * (f - f0) / (f1 - f0);
        total += 0.5 * (interp(a) + interp(b)) * (b - a);
    }
    total
}

/// Power of one channel in each band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelBandPower {
    pub channel: String,
    pub absolute: Vec<f64>,
    pub relative: Vec<f64>,
    /// Integral over `[first band low, last band high]`
    pub total: f64,
}

/// Band powers per channel and averaged across channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandPowerResult {
    pub bands: Vec<BandDefinition>,
    pub channels: Vec<ChannelBandPower>,
    pub mean_absolute: Vec<f64>,
    pub mean_relative: Vec<f64>,
    pub mean_total: f64,
}

impl BandPowerResult {
    /// Band names followed by the full-range entry.
    pub fn freq_bands(&self) -> Vec<String> {
        self.bands
            .iter()
            .map(|b| b.name.clone())
            .chain(std::iter::once(FULL_RANGE.to_string()))
            .collect()
    }

    /// Mean absolute powers followed by the full-range total.
    pub fn average_power(&self) -> Vec<f64> {
        let mut values = self.mean_absolute.clone();
        values.push(self.mean_total);
        values
    }

    /// Mean relative powers followed by 1.0 for the full range.
    pub fn relative_power(&self) -> Vec<f64> {
        let mut values = self.mean_relative.clone();
        values.push(1.0);
        values
    }

    /// Band with the greatest mean relative power.
    pub fn dominant_band(&self) -> Option<&BandDefinition> {
        self.mean_relative
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| &self.bands[idx])
    }
}

fn channel_power(estimate: &SpectralEstimate, bands: &[BandDefinition]) -> ChannelBandPower {
    let absolute: Vec<f64> = bands
        .iter()
        .map(|b| integrate(&estimate.frequencies, &estimate.power, b.low, b.high))
        .collect();
    let band_sum: f64 = absolute.iter().sum();
    let relative = if band_sum > 0.0 {
        absolute.iter().map(|p| p / band_sum).collect()
    } else {
        vec![0.0; absolute.len()]
    };

    let (low, high) = match (bands.first(), bands.last()) {
        (Some(first), Some(last)) => (first.low, last.high),
        _ => (0.0, 0.0),
    };

    ChannelBandPower {
        channel: estimate.channel.clone(),
        absolute,
        relative,
        total: integrate(&estimate.frequencies, &estimate.power, low, high),
    }
}

fn column_mean(rows: &[Vec<f64>], width: usize) -> Vec<f64> {
    let n = rows.len().max(1) as f64;
    (0..width)
        .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
        .collect()
}

/// Integrate every estimate over every band.
pub fn aggregate(estimates: &[SpectralEstimate], bands: &[BandDefinition]) -> Result<BandPowerResult> {
    validate_bands(bands)?;
    if estimates.is_empty() {
        return Err(AnalysisError::Data(
            "No spectral estimates to aggregate".to_string(),
        ));
    }

    let channels: Vec<ChannelBandPower> = estimates.iter().map(|e| channel_power(e, bands)).collect();

    let absolute: Vec<Vec<f64>> = channels.iter().map(|c| c.absolute.clone()).collect();
    let relative: Vec<Vec<f64>> = channels.iter().map(|c| c.relative.clone()).collect();
    let mean_total = channels.iter().map(|c| c.total).sum::<f64>() / channels.len() as f64;

    let result = BandPowerResult {
        bands: bands.to_vec(),
        mean_absolute: column_mean(&absolute, bands.len()),
        mean_relative: column_mean(&relative, bands.len()),
        mean_total,
        channels,
    };

    tracing::debug!(
        channels = result.channels.len(),
        dominant = result.dominant_band().map(|b| b.name.as_str()).unwrap_or("-"),
        "Band powers aggregated"
    );

    Ok(result)
}
