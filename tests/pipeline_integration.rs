mod common;

use brainwave_analyzer::analysis::{run_analysis, AnalysisConfig};
use brainwave_analyzer::bands::{aggregate, canonical_bands};
use brainwave_analyzer::loader::load_recording;
use brainwave_analyzer::signal_processing::{
    apply_filters, estimate_psd, FilterChain, FilterDesign, WelchParams,
};
use brainwave_analyzer::AnalysisError;
use common::{
    alpha_beta_recording, build_edf, build_edf_with_layout, build_edf_with_records, empty_recording,
    TestSignal,
};
use tempfile::TempDir;

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(idx, _)| idx)
        .unwrap()
}

#[test]
fn test_alpha_dominates_pure_10hz_channel() {
    let recording = load_recording(&alpha_beta_recording(), "alpha.edf").unwrap();
    assert_eq!(recording.channel_names(), &["Fp1", "Fp2"]);
    assert_eq!(recording.sample_rate(), 256.0);
    assert_eq!(recording.num_samples(), 2560);

    let window = recording.crop(0.0, 60.0).unwrap();
    assert_eq!(window.num_samples(), 2560);

    let chain = FilterChain::default();
    let filtered = apply_filters(&window, &chain.filters, chain.design).unwrap();
    let estimates = estimate_psd(&filtered, &WelchParams::default()).unwrap();
    let result = aggregate(&estimates, &canonical_bands()).unwrap();

    let fp1 = &result.channels[0];
    let alpha = result.bands.iter().position(|b| b.name == "Alpha").unwrap();
    assert_eq!(argmax(&fp1.relative), alpha);
    for (idx, &value) in fp1.relative.iter().enumerate() {
        if idx != alpha {
            assert!(fp1.relative[alpha] > value);
        }
    }

    let fp2 = &result.channels[1];
    let beta = result.bands.iter().position(|b| b.name == "Beta").unwrap();
    assert_eq!(argmax(&fp2.relative), beta);
}

#[test]
fn test_band_powers_are_consistent() {
    let recording = load_recording(&alpha_beta_recording(), "alpha.edf").unwrap();
    let estimates = estimate_psd(&recording, &WelchParams::default()).unwrap();
    let result = aggregate(&estimates, &canonical_bands()).unwrap();

    for channel in &result.channels {
        let sum: f64 = channel.absolute.iter().sum();
        assert!((sum - channel.total).abs() <= 1e-9 * channel.total.max(1.0));
        let relative: f64 = channel.relative.iter().sum();
        assert!((relative - 1.0).abs() < 1e-6);
    }
}

#[test]
fn test_full_run_writes_report_and_figures() {
    let dir = TempDir::new().unwrap();
    let figures = dir.path().join("figures");

    let report = run_analysis(
        &alpha_beta_recording(),
        "alpha.edf",
        0.0,
        &AnalysisConfig::default(),
        &figures,
        "run-1",
    )
    .unwrap();

    assert_eq!(report.analysis_id, "run-1");
    assert_eq!(report.message, "File processed successfully");
    assert_eq!(
        report.results.freq_bands,
        vec!["Delta", "Theta", "Alpha", "Beta", "Gamma", "Full"]
    );
    assert_eq!(report.results.average_power.len(), 6);
    assert_eq!(report.results.relative_power[5], 1.0);
    assert_eq!(report.results.channels.len(), 2);
    assert_eq!(report.results.window.num_samples, 2560);
    assert_eq!(report.results.window.duration_seconds, 10.0);

    for url in report.results.plot_urls.iter() {
        let name = url.trim_start_matches("/static/figures/");
        assert!(figures.join(name).exists(), "missing {}", name);
    }
}

#[test]
fn test_local_run_reports_figure_paths() {
    let dir = TempDir::new().unwrap();
    let report = run_analysis(
        &alpha_beta_recording(),
        "alpha.edf",
        0.0,
        &AnalysisConfig::default(),
        dir.path(),
        "local",
    )
    .unwrap()
    .with_plot_paths(dir.path());

    assert_eq!(
        report.results.plot_urls.average_power_plot,
        dir.path().join("local_avg_power.svg").display().to_string()
    );
    for path in report.results.plot_urls.iter() {
        assert!(std::path::Path::new(path).exists(), "missing {}", path);
    }
}

#[test]
fn test_butterworth_design_end_to_end() {
    let dir = TempDir::new().unwrap();
    let mut config = AnalysisConfig::default();
    config.filters.design = FilterDesign::Butterworth { order: 4 };

    let report = run_analysis(
        &alpha_beta_recording(),
        "alpha.edf",
        0.0,
        &config,
        dir.path(),
        "bw",
    )
    .unwrap();

    let fp1 = &report.results.channels[0];
    assert_eq!(argmax(&fp1.relative_power), 2);
}

#[test]
fn test_zero_channel_file_is_load_error() {
    let dir = TempDir::new().unwrap();
    let figures = dir.path().join("figures");
    let err = run_analysis(
        &empty_recording(),
        "empty.edf",
        0.0,
        &AnalysisConfig::default(),
        &figures,
        "empty",
    )
    .unwrap_err();

    assert!(matches!(err, AnalysisError::Load(_)));
    assert!(!figures.exists());
}

#[test]
fn test_annotation_channels_are_skipped() {
    let bytes = build_edf(
        &[
            TestSignal::sine("Cz", 10.0, 50.0, 128.0, 4),
            TestSignal {
                label: "EDF Annotations".to_string(),
                samples: vec![0.0; 512],
            },
        ],
        128,
    );
    let recording = load_recording(&bytes, "annotated.edf").unwrap();
    assert_eq!(recording.channel_names(), &["Cz"]);
}

#[test]
fn test_mixed_sampling_rates_are_load_error() {
    let bytes = build_edf_with_layout(
        &[
            TestSignal::sine("Cz", 10.0, 50.0, 256.0, 2),
            TestSignal::sine("Pz", 10.0, 50.0, 128.0, 2),
        ],
        &[256, 128],
        None,
    );
    let err = load_recording(&bytes, "mixed.edf").unwrap_err();
    assert!(matches!(err, AnalysisError::Load(ref msg) if msg.contains("mixed sampling rates")));
}

#[test]
fn test_header_byte_count_mismatch_is_load_error() {
    let mut bytes = alpha_beta_recording();
    bytes[184..192].copy_from_slice(b"1024    ");
    let err = load_recording(&bytes, "bad-header.edf").unwrap_err();
    assert!(matches!(err, AnalysisError::Load(_)));
}

#[test]
fn test_unknown_record_count() {
    let bytes = build_edf_with_records(
        &[TestSignal::sine("Cz", 10.0, 50.0, 128.0, 3)],
        128,
        Some("-1"),
    );
    let recording = load_recording(&bytes, "stream.edf").unwrap();
    assert_eq!(recording.num_samples(), 384);
}

#[test]
fn test_sample_values_round_trip_within_quantization() {
    let signal = TestSignal::sine("Cz", 10.0, 50.0, 128.0, 2);
    let expected = signal.samples.clone();
    let recording = load_recording(&build_edf(&[signal], 128), "cz.edf").unwrap();

    let step = 1000.0 / 65535.0;
    for (a, b) in recording.data()[0].iter().zip(&expected) {
        assert!((a - b).abs() <= step);
    }
}

#[test]
fn test_start_time_past_end_is_data_error() {
    let dir = TempDir::new().unwrap();
    let err = run_analysis(
        &alpha_beta_recording(),
        "alpha.edf",
        30.0,
        &AnalysisConfig::default(),
        dir.path(),
        "late",
    )
    .unwrap_err();
    assert!(matches!(err, AnalysisError::Data(_)));
}

#[test]
fn test_low_sample_rate_rejects_line_noise_notch() {
    let dir = TempDir::new().unwrap();
    let bytes = build_edf(&[TestSignal::sine("Cz", 5.0, 50.0, 64.0, 10)], 64);
    let err = run_analysis(
        &bytes,
        "slow.edf",
        0.0,
        &AnalysisConfig::default(),
        dir.path(),
        "slow",
    )
    .unwrap_err();
    assert!(matches!(err, AnalysisError::Filter(_)));
}
