//! In-memory EEG recording: a channels × samples matrix plus metadata.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Immutable channel × sample matrix. Every pipeline stage builds a new one.
#[derive(Debug, Clone)]
pub struct Recording {
    sample_rate: f64,
    channel_names: Vec<String>,
    data: Vec<Vec<f64>>,
    pub source_file: String,
    pub start_date: Option<String>,
    pub start_time: Option<String>,
}

/// Summary of a recording as reported back to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub source_file: String,
    pub channels: Vec<String>,
    pub sample_rate: f64,
    pub num_samples: usize,
    pub duration_seconds: f64,
}

impl Recording {
    /// Build a recording, enforcing the matrix invariants.
    pub fn new(
        sample_rate: f64,
        channel_names: Vec<String>,
        data: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(AnalysisError::Data(format!(
                "Sampling rate must be positive, got {}",
                sample_rate
            )));
        }
        if channel_names.len() != data.len() {
            return Err(AnalysisError::Data(format!(
                "{} channel names for {} data rows",
                channel_names.len(),
                data.len()
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = channel_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(AnalysisError::Data(format!(
                "Duplicate channel name '{}'",
                dup
            )));
        }

        if let Some(first) = data.first() {
            let expected = first.len();
            if let Some((idx, row)) = data.iter().enumerate().find(|(_, r)| r.len() != expected) {
                return Err(AnalysisError::Data(format!(
                    "Channel '{}' has {} samples, expected {}",
                    channel_names[idx],
                    row.len(),
                    expected
                )));
            }
        }

        Ok(Self {
            sample_rate,
            channel_names,
            data,
            source_file: String::new(),
            start_date: None,
            start_time: None,
        })
    }

    pub fn with_source(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = source_file.into();
        self
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    pub fn num_channels(&self) -> usize {
        self.channel_names.len()
    }

    pub fn num_samples(&self) -> usize {
        self.data.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate
    }

    /// Same metadata, new sample values. Row layout must match.
    pub fn with_data(&self, data: Vec<Vec<f64>>) -> Result<Self> {
        let mut next = Self::new(self.sample_rate, self.channel_names.clone(), data)?;
        next.source_file = self.source_file.clone();
        next.start_date = self.start_date.clone();
        next.start_time = self.start_time.clone();
        Ok(next)
    }

    /// Window `[start_s, start_s + duration_s)`, clamped to the available samples.
    pub fn crop(&self, start_s: f64, duration_s: f64) -> Result<Self> {
        if !start_s.is_finite() || start_s < 0.0 {
            return Err(AnalysisError::Data(format!(
                "Start time must be a non-negative number of seconds, got {}",
                start_s
            )));
        }
        if !(duration_s.is_finite() && duration_s > 0.0) {
            return Err(AnalysisError::Data(format!(
                "Window duration must be positive, got {}",
                duration_s
            )));
        }

        let total = self.num_samples();
        let start = (start_s * self.sample_rate).round() as usize;
        if start >= total {
            return Err(AnalysisError::Data(format!(
                "Start time {:.2}s is beyond the end of the recording ({:.2}s)",
                start_s,
                self.duration()
            )));
        }
        let len = (duration_s * self.sample_rate).round() as usize;
        if len == 0 {
            return Err(AnalysisError::Data(format!(
                "Window of {}s is shorter than one sample at {} Hz",
                duration_s, self.sample_rate
            )));
        }
        let end = start.saturating_add(len).min(total);

        let data = self
            .data
            .iter()
            .map(|row| row[start..end].to_vec())
            .collect();
        self.with_data(data)
    }

    pub fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            source_file: self.source_file.clone(),
            channels: self.channel_names.clone(),
            sample_rate: self.sample_rate,
            num_samples: self.num_samples(),
            duration_seconds: self.duration(),
        }
    }
}
