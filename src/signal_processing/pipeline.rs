//! Filter Stage
//!
//! Applies an ordered list of filter specs to every channel of a recording.
//! Channels are processed in parallel; output keeps channel order.

use super::filters::{create_sos_filter, spectral_filter, FilterDesign, FilterSpec};
use crate::error::{AnalysisError, Result};
use crate::recording::Recording;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default line-noise notch: 48–52 Hz.
pub fn default_notch() -> FilterSpec {
    line_noise_notch(50.0, 4.0)
}

/// Default drift / muscle-artifact band-pass: 0.1–45 Hz.
pub fn default_band_pass() -> FilterSpec {
    FilterSpec::band_pass("Bandpass", 0.1, 45.0)
}

/// Notch of `width` Hz centred on the mains frequency.
pub fn line_noise_notch(line_frequency: f64, width: f64) -> FilterSpec {
    let half = width / 2.0;
    FilterSpec::notch(
        format!("Notch {} Hz", line_frequency),
        line_frequency - half,
        line_frequency + half,
    )
}

/// Specs and realisation used by the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterChain {
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub design: FilterDesign,
}

impl Default for FilterChain {
    fn default() -> Self {
        Self {
            filters: vec![default_notch(), default_band_pass()],
            design: FilterDesign::default(),
        }
    }
}

/// Apply `specs` in order to every channel, returning a new recording.
///
/// All specs are validated against the recording's Nyquist frequency before
/// any channel is touched.
pub fn apply_filters(
    recording: &Recording,
    specs: &[FilterSpec],
    design: FilterDesign,
) -> Result<Recording> {
    let sample_rate = recording.sample_rate();
    for spec in specs {
        spec.validate(sample_rate)?;
    }
    if specs.is_empty() {
        return Ok(recording.clone());
    }

    let start = Instant::now();

    let filtered = match design {
        FilterDesign::Spectral => recording
            .data()
            .par_iter()
            .map(|channel| spectral_filter(channel, sample_rate, specs))
            .collect::<Vec<_>>(),
        FilterDesign::Butterworth { order } => {
            if order == 0 {
                return Err(AnalysisError::Filter(
                    "Butterworth order must be at least 1".to_string(),
                ));
            }
            let chains = specs
                .iter()
                .map(|spec| create_sos_filter(spec, sample_rate, order))
                .collect::<Result<Vec<_>>>()?;

            recording
                .data()
                .par_iter()
                .map(|channel| {
                    chains.iter().fold(channel.clone(), |signal, chain| {
                        // Each worker owns its own filter state
                        chain.clone().filtfilt(&signal)
                    })
                })
                .collect::<Vec<_>>()
        }
    };

    tracing::debug!(
        channels = recording.num_channels(),
        filters = specs.len(),
        ?design,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Filters applied"
    );

    recording.with_data(filtered)
}
