//! Plot Renderer: SVG figures for one analysis.

use crate::bands::BandPowerResult;
use crate::error::{AnalysisError, Result};
use crate::signal_processing::SpectralEstimate;
use plotters::coord::ranged1d::SegmentValue;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;

/// URL prefix under which the figures directory is served.
pub const FIGURES_URL_PREFIX: &str = "/static/figures";

type DrawResult = std::result::Result<(), Box<dyn Error>>;

/// The four figures produced per analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    FrequencyBands,
    AveragePower,
    RelativePower,
    FullSpectrum,
}

impl PlotKind {
    pub const ALL: [PlotKind; 4] = [
        PlotKind::FrequencyBands,
        PlotKind::AveragePower,
        PlotKind::RelativePower,
        PlotKind::FullSpectrum,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            PlotKind::FrequencyBands => "frequency_bands",
            PlotKind::AveragePower => "avg_power",
            PlotKind::RelativePower => "rel_power",
            PlotKind::FullSpectrum => "full_spectrum",
        }
    }

    pub fn file_name(&self, analysis_id: &str) -> String {
        format!("{}_{}.svg", analysis_id, self.suffix())
    }
}

/// URL paths of the rendered figures, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotUrls {
    pub frequency_bands_plot: String,
    pub average_power_plot: String,
    pub relative_power_plot: String,
    pub full_spectrum_plot: String,
}

impl PlotUrls {
    pub fn for_analysis(analysis_id: &str) -> Self {
        Self::from_fn(|kind| format!("{}/{}", FIGURES_URL_PREFIX, kind.file_name(analysis_id)))
    }

    /// Filesystem paths of the figures inside `figures_dir`, for local runs
    /// where nothing serves `/static`.
    pub fn in_directory(figures_dir: &Path, analysis_id: &str) -> Self {
        Self::from_fn(|kind| {
            figures_dir
                .join(kind.file_name(analysis_id))
                .display()
                .to_string()
        })
    }

    fn from_fn(location: impl Fn(PlotKind) -> String) -> Self {
        Self {
            frequency_bands_plot: location(PlotKind::FrequencyBands),
            average_power_plot: location(PlotKind::AveragePower),
            relative_power_plot: location(PlotKind::RelativePower),
            full_spectrum_plot: location(PlotKind::FullSpectrum),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [
            self.frequency_bands_plot.as_str(),
            self.average_power_plot.as_str(),
            self.relative_power_plot.as_str(),
            self.full_spectrum_plot.as_str(),
        ]
        .into_iter()
    }
}

/// Write all four figures into `figures_dir` and return their URLs.
pub fn render_plots(
    figures_dir: &Path,
    analysis_id: &str,
    mean_psd: &SpectralEstimate,
    bands: &BandPowerResult,
) -> Result<PlotUrls> {
    std::fs::create_dir_all(figures_dir).map_err(|e| {
        AnalysisError::Disk(format!(
            "Cannot create figures directory {}: {}",
            figures_dir.display(),
            e
        ))
    })?;

    for kind in PlotKind::ALL {
        let path = figures_dir.join(kind.file_name(analysis_id));
        let drawn = match kind {
            PlotKind::FrequencyBands => draw_frequency_bands(&path, mean_psd, bands),
            PlotKind::AveragePower => draw_bar_chart(
                &path,
                "Average Absolute Band Power",
                "Power",
                &bands.freq_bands(),
                &bands.average_power(),
                &BLUE,
            ),
            PlotKind::RelativePower => draw_bar_chart(
                &path,
                "Relative Band Power",
                "Fraction of total power",
                &bands.freq_bands(),
                &bands.relative_power(),
                &GREEN,
            ),
            PlotKind::FullSpectrum => draw_full_spectrum(&path, mean_psd),
        };
        drawn.map_err(|e| {
            AnalysisError::Disk(format!("Cannot write {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "Figure written");
    }

    Ok(PlotUrls::for_analysis(analysis_id))
}

fn upper_bound(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.filter(|v| v.is_finite()).fold(0.0f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// One panel per band with the mean PSD restricted to that band.
fn draw_frequency_bands(path: &Path, psd: &SpectralEstimate, bands: &BandPowerResult) -> DrawResult {
    let n = bands.bands.len().max(1);
    let root = SVGBackend::new(path, (400 * n as u32, 360)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, n));

    for (panel, band) in panels.iter().zip(&bands.bands) {
        let points: Vec<(f64, f64)> = psd
            .frequencies
            .iter()
            .zip(&psd.power)
            .filter(|(f, _)| **f >= band.low && **f <= band.high)
            .map(|(&f, &p)| (f, p))
            .collect();
        let y_max = upper_bound(points.iter().map(|(_, p)| *p));

        let mut chart = ChartBuilder::on(panel)
            .caption(band.label(), ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(60)
            .build_cartesian_2d(band.low..band.high, 0.0..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Frequency (Hz)")
            .y_desc("Power/Frequency")
            .draw()?;

        chart.draw_series(LineSeries::new(points, &BLUE))?;
    }

    root.present()?;
    Ok(())
}

fn draw_bar_chart(
    path: &Path,
    title: &str,
    y_desc: &str,
    labels: &[String],
    values: &[f64],
    color: &RGBColor,
) -> DrawResult {
    let root = SVGBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let n = values.len().max(1) as i32;
    let y_max = upper_bound(values.iter().copied());

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(14)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d((0..n - 1).into_segmented(), 0.0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Frequency band")
        .y_desc(y_desc)
        .x_labels(labels.len())
        .x_label_formatter(&|x| match x {
            SegmentValue::CenterOf(idx) => labels
                .get(*idx as usize)
                .cloned()
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(idx, &value)| {
        let x = idx as i32;
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(x), 0.0), (SegmentValue::Exact(x + 1), value)],
            color.filled(),
        );
        bar.set_margin(0, 0, 12, 12);
        bar
    }))?;

    root.present()?;
    Ok(())
}

/// Log-log mean PSD over the analysed range.
fn draw_full_spectrum(path: &Path, psd: &SpectralEstimate) -> DrawResult {
    let root = SVGBackend::new(path, (900, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    // Log axes cannot show DC or empty bins
    let points: Vec<(f64, f64)> = psd
        .frequencies
        .iter()
        .zip(&psd.power)
        .filter(|(f, p)| **f > 0.0 && **p > 0.0 && p.is_finite())
        .map(|(&f, &p)| (f, p))
        .collect();

    let (f_min, f_max) = match (points.first(), points.last()) {
        (Some(first), Some(last)) if last.0 > first.0 => (first.0, last.0),
        _ => (0.1, 100.0),
    };
    let p_min = points.iter().map(|(_, p)| *p).fold(f64::INFINITY, f64::min);
    let p_max = points.iter().map(|(_, p)| *p).fold(0.0f64, f64::max);
    let (p_min, p_max) = if p_min.is_finite() && p_max > p_min {
        (p_min * 0.5, p_max * 2.0)
    } else {
        (1e-6, 1.0)
    };

    let mut chart = ChartBuilder::on(&root)
        .caption("Mean Power Spectral Density", ("sans-serif", 22))
        .margin(14)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d((f_min..f_max).log_scale(), (p_min..p_max).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("Frequency (Hz)")
        .y_desc("Power/Frequency")
        .y_label_formatter(&|y| format!("{:.0e}", y))
        .draw()?;

    chart.draw_series(LineSeries::new(points, &RED))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::{aggregate, canonical_bands};

    fn estimate() -> SpectralEstimate {
        let frequencies: Vec<f64> = (0..=128).map(|k| k as f64).collect();
        let power = frequencies.iter().map(|f| 1.0 / (1.0 + f)).collect();
        SpectralEstimate {
            channel: "mean".to_string(),
            frequencies,
            power,
        }
    }

    #[test]
    fn test_urls_follow_naming_scheme() {
        let urls = PlotUrls::for_analysis("abc");
        assert_eq!(urls.frequency_bands_plot, "/static/figures/abc_frequency_bands.svg");
        assert_eq!(urls.average_power_plot, "/static/figures/abc_avg_power.svg");
        assert_eq!(urls.relative_power_plot, "/static/figures/abc_rel_power.svg");
        assert_eq!(urls.full_spectrum_plot, "/static/figures/abc_full_spectrum.svg");
        assert_eq!(urls.iter().count(), 4);
    }

    #[test]
    fn test_render_writes_all_figures() {
        let dir = tempfile::tempdir().unwrap();
        let figures = dir.path().join("figures");
        let psd = estimate();
        let bands = aggregate(std::slice::from_ref(&psd), &canonical_bands()).unwrap();

        render_plots(&figures, "test-id", &psd, &bands).unwrap();

        for kind in PlotKind::ALL {
            let path = figures.join(kind.file_name("test-id"));
            let content = std::fs::read_to_string(&path).unwrap();
            assert!(content.contains("<svg"), "{} is not an SVG", path.display());
        }
    }

    #[test]
    fn test_unwritable_directory_is_disk_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let psd = estimate();
        let bands = aggregate(std::slice::from_ref(&psd), &canonical_bands()).unwrap();

        let err = render_plots(&blocker.join("figures"), "id", &psd, &bands).unwrap_err();
        assert!(matches!(err, AnalysisError::Disk(_)));
    }
}
