//! Analysis orchestrator: one upload in, one report out.
//!
//! load → crop → filter → PSD → band aggregation → plots. Each stage returns a
//! new value; the first error aborts the run with nothing returned.

use crate::bands::{aggregate, canonical_bands, BandDefinition, BandPowerResult};
use crate::error::Result;
use crate::loader::load_recording;
use crate::plots::{render_plots, PlotUrls};
use crate::recording::RecordingSummary;
use crate::signal_processing::{apply_filters, estimate_psd, mean_spectrum, FilterChain, WelchParams};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

pub const SUCCESS_MESSAGE: &str = "File processed successfully";

/// Everything that parameterises a run besides the upload itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub filters: FilterChain,
    /// Length of the analysed window in seconds
    pub window_seconds: f64,
    pub welch: WelchParams,
    pub bands: Vec<BandDefinition>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            filters: FilterChain::default(),
            window_seconds: 60.0,
            welch: WelchParams::default(),
            bands: canonical_bands(),
        }
    }
}

/// Band powers of a single channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelReport {
    pub name: String,
    pub absolute_power: Vec<f64>,
    pub relative_power: Vec<f64>,
    pub total_power: f64,
}

/// The time window that was actually analysed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub num_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub freq_bands: Vec<String>,
    pub average_power: Vec<f64>,
    pub relative_power: Vec<f64>,
    pub channels: Vec<ChannelReport>,
    pub sample_rate: f64,
    pub window: AnalysisWindow,
    pub recording: RecordingSummary,
    pub plot_urls: PlotUrls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_id: String,
    pub message: String,
    pub results: AnalysisResults,
}

impl AnalysisResults {
    fn assemble(
        bands: &BandPowerResult,
        sample_rate: f64,
        window: AnalysisWindow,
        recording: RecordingSummary,
        plot_urls: PlotUrls,
    ) -> Self {
        let channels = bands
            .channels
            .iter()
            .map(|c| ChannelReport {
                name: c.channel.clone(),
                absolute_power: c.absolute.clone(),
                relative_power: c.relative.clone(),
                total_power: c.total,
            })
            .collect();

        Self {
            freq_bands: bands.freq_bands(),
            average_power: bands.average_power(),
            relative_power: bands.relative_power(),
            channels,
            sample_rate,
            window,
            recording,
            plot_urls,
        }
    }
}

impl AnalysisReport {
    /// Replace the served URLs with the paths the figures were written to.
    pub fn with_plot_paths(mut self, figures_dir: &Path) -> Self {
        self.results.plot_urls = PlotUrls::in_directory(figures_dir, &self.analysis_id);
        self
    }
}

/// Run the full pipeline on an uploaded file.
///
/// Blocking and CPU-bound; async callers should run it on a blocking thread.
pub fn run_analysis(
    bytes: &[u8],
    filename: &str,
    start_time: f64,
    config: &AnalysisConfig,
    figures_dir: &Path,
    analysis_id: &str,
) -> Result<AnalysisReport> {
    let started = Instant::now();

    let recording = load_recording(bytes, filename)?;
    let summary = recording.summary();
    let window = recording.crop(start_time, config.window_seconds)?;
    let filtered = apply_filters(&window, &config.filters.filters, config.filters.design)?;
    let estimates = estimate_psd(&filtered, &config.welch)?;
    let bands = aggregate(&estimates, &config.bands)?;
    let mean_psd = mean_spectrum(&estimates)?;
    let plot_urls = render_plots(figures_dir, analysis_id, &mean_psd, &bands)?;

    let analysed = AnalysisWindow {
        start_seconds: start_time,
        duration_seconds: filtered.duration(),
        num_samples: filtered.num_samples(),
    };

    tracing::info!(
        analysis_id,
        file = filename,
        channels = filtered.num_channels(),
        window_seconds = analysed.duration_seconds,
        dominant = bands.dominant_band().map(|b| b.name.as_str()).unwrap_or("-"),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Analysis complete"
    );

    Ok(AnalysisReport {
        analysis_id: analysis_id.to_string(),
        message: SUCCESS_MESSAGE.to_string(),
        results: AnalysisResults::assemble(
            &bands,
            filtered.sample_rate(),
            analysed,
            summary,
            plot_urls,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.window_seconds, 60.0);
        assert_eq!(config.welch.n_fft, 256);
        assert_eq!(config.bands.len(), 5);
        assert_eq!(config.filters.filters.len(), 2);
    }

    #[test]
    fn test_rejects_wrong_extension_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let figures = dir.path().join("figures");
        let err = run_analysis(
            b"test",
            "test.txt",
            0.0,
            &AnalysisConfig::default(),
            &figures,
            "id",
        )
        .unwrap_err();

        assert!(matches!(err, AnalysisError::Load(_)));
        assert!(!figures.exists());
    }
}
