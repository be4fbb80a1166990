//! File Loader: raw upload bytes → `Recording`.

use crate::edf::EdfReader;
use crate::error::{AnalysisError, Result};
use crate::recording::Recording;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Extensions the loader accepts.
pub fn supported_extensions() -> Vec<&'static str> {
    vec!["edf"]
}

/// Check the filename hint against the supported extensions.
pub fn is_supported(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| supported_extensions().contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode an uploaded EDF file into a recording.
///
/// Annotation channels are dropped; the remaining data channels must share
/// one sampling rate.
pub fn load_recording(bytes: &[u8], filename: &str) -> Result<Recording> {
    if !is_supported(filename) {
        return Err(AnalysisError::Load(
            "Only .edf files are supported".to_string(),
        ));
    }

    let reader = EdfReader::parse(bytes)?;
    let record_duration = reader.header.duration_of_data_record;

    let data_indices: Vec<usize> = reader
        .signal_headers
        .iter()
        .enumerate()
        .filter(|(_, sh)| !sh.is_annotation())
        .map(|(idx, _)| idx)
        .collect();

    if data_indices.is_empty() {
        return Err(AnalysisError::Load(format!(
            "'{}' contains no data channels",
            filename
        )));
    }

    let sample_rate = reader.signal_headers[data_indices[0]].sample_frequency(record_duration);
    if let Some(&mismatch) = data_indices.iter().find(|&&idx| {
        let rate = reader.signal_headers[idx].sample_frequency(record_duration);
        (rate - sample_rate).abs() > f64::EPSILON * sample_rate.max(1.0)
    }) {
        let sh = &reader.signal_headers[mismatch];
        return Err(AnalysisError::Load(format!(
            "Channel '{}' is sampled at {} Hz but '{}' at {} Hz; mixed sampling rates are not supported",
            sh.label,
            sh.sample_frequency(record_duration),
            reader.signal_headers[data_indices[0]].label,
            sample_rate
        )));
    }
    if sample_rate <= 0.0 {
        return Err(AnalysisError::Load(
            "Data channels declare zero samples per record".to_string(),
        ));
    }

    let labels: Vec<String> = data_indices
        .iter()
        .map(|&idx| reader.signal_headers[idx].label.clone())
        .collect();
    let channel_names = disambiguate_labels(labels);

    let data = reader.read_physical_signals(&data_indices)?;

    tracing::debug!(
        file = filename,
        channels = channel_names.len(),
        sample_rate,
        duration = reader.total_duration(),
        "Recording loaded"
    );

    let mut recording = Recording::new(sample_rate, channel_names, data)
        .map_err(|e| AnalysisError::Load(e.to_string()))?
        .with_source(filename);
    recording.start_date = Some(reader.header.start_date.clone()).filter(|s| !s.is_empty());
    recording.start_time = Some(reader.header.start_time.clone()).filter(|s| !s.is_empty());

    if recording.num_samples() == 0 {
        return Err(AnalysisError::Load(format!(
            "'{}' contains no samples",
            filename
        )));
    }

    Ok(recording)
}

/// Make channel labels unique: repeated labels get a numeric suffix and blank
/// ones become `Ch<n>`. Generated names never collide with a label already in
/// the file.
fn disambiguate_labels(labels: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in &labels {
        *counts.entry(label.clone()).or_default() += 1;
    }

    let mut taken: HashSet<String> = labels
        .iter()
        .filter(|label| !label.is_empty() && counts[*label] == 1)
        .cloned()
        .collect();
    let mut suffixes: HashMap<String, usize> = HashMap::new();

    labels
        .into_iter()
        .enumerate()
        .map(|(idx, label)| {
            if !label.is_empty() && counts[&label] == 1 {
                return label;
            }

            let base = if label.is_empty() {
                let fallback = format!("Ch{}", idx + 1);
                if taken.insert(fallback.clone()) {
                    return fallback;
                }
                fallback
            } else {
                label
            };

            let n = suffixes.entry(base.clone()).or_default();
            loop {
                *n += 1;
                let candidate = format!("{}-{}", base, n);
                if taken.insert(candidate.clone()) {
                    return candidate;
                }
            }
        })
        .collect()
}
