// EDF (European Data Format) decoding from an in-memory upload
// Specification: https://www.edfplus.info/specs/edf.html

use rayon::prelude::*;
use std::io::{Cursor, Read};
use thiserror::Error;

/// Size of the fixed part of the header, and of each per-signal header block.
pub const HEADER_BLOCK_BYTES: usize = 256;

/// Label used by EDF+ for the annotation channel.
pub const ANNOTATIONS_LABEL: &str = "EDF Annotations";

#[derive(Error, Debug)]
pub enum EdfError {
    #[error("File is too short: {0}")]
    Truncated(String),

    #[error("Invalid header field '{field}': '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("Inconsistent header: {0}")]
    Inconsistent(String),

    #[error("Signal index {0} out of bounds")]
    SignalOutOfBounds(usize),
}

#[derive(Debug, Clone)]
pub struct EdfHeader {
    pub version: String,              // 8 bytes: version of this data format (0)
    pub patient_id: String,           // 80 bytes: local patient identification
    pub recording_id: String,         // 80 bytes: local recording identification
    pub start_date: String,           // 8 bytes: startdate of recording (dd.mm.yy)
    pub start_time: String,           // 8 bytes: starttime of recording (hh.mm.ss)
    pub header_bytes: usize,          // 8 bytes: number of bytes in header record
    pub reserved: String,             // 44 bytes: "EDF+C" / "EDF+D" for EDF+
    pub num_data_records: i64,        // 8 bytes: number of data records (-1 if unknown)
    pub duration_of_data_record: f64, // 8 bytes: duration of a data record, in seconds
    pub num_signals: usize,           // 4 bytes: number of signals (channels)
}

#[derive(Debug, Clone)]
pub struct EdfSignalHeader {
    pub label: String,                 // 16 bytes
    pub transducer_type: String,       // 80 bytes
    pub physical_dimension: String,    // 8 bytes (e.g. uV)
    pub physical_minimum: f64,         // 8 bytes
    pub physical_maximum: f64,         // 8 bytes
    pub digital_minimum: i64,          // 8 bytes
    pub digital_maximum: i64,          // 8 bytes
    pub prefiltering: String,          // 80 bytes
    pub num_samples_per_record: usize, // 8 bytes
    pub reserved: String,              // 32 bytes
}

impl EdfSignalHeader {
    pub fn sample_frequency(&self, record_duration: f64) -> f64 {
        self.num_samples_per_record as f64 / record_duration
    }

    pub fn gain(&self) -> f64 {
        (self.physical_maximum - self.physical_minimum)
            / (self.digital_maximum - self.digital_minimum) as f64
    }

    pub fn offset(&self) -> f64 {
        self.physical_maximum - self.gain() * self.digital_maximum as f64
    }

    pub fn is_annotation(&self) -> bool {
        self.label == ANNOTATIONS_LABEL
    }
}

/// Parsed view over the bytes of an EDF file.
pub struct EdfReader<'a> {
    pub header: EdfHeader,
    pub signal_headers: Vec<EdfSignalHeader>,
    data: &'a [u8],
    num_records: usize,
}

impl<'a> EdfReader<'a> {
    /// Parse the header block and signal headers; the data section is validated
    /// against the declared record layout but not decoded yet.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, EdfError> {
        if bytes.len() < HEADER_BLOCK_BYTES {
            return Err(EdfError::Truncated(format!(
                "{} bytes, expected at least {}",
                bytes.len(),
                HEADER_BLOCK_BYTES
            )));
        }

        let mut cursor = Cursor::new(bytes);
        let header = Self::read_header(&mut cursor)?;

        let expected_header_bytes = HEADER_BLOCK_BYTES * (header.num_signals + 1);
        if header.header_bytes != expected_header_bytes {
            return Err(EdfError::Inconsistent(format!(
                "header declares {} bytes but {} signals require {}",
                header.header_bytes, header.num_signals, expected_header_bytes
            )));
        }
        if bytes.len() < header.header_bytes {
            return Err(EdfError::Truncated(format!(
                "header declares {} bytes, file has {}",
                header.header_bytes,
                bytes.len()
            )));
        }

        let signal_headers = Self::read_signal_headers(&mut cursor, header.num_signals)?;
        let data = &bytes[header.header_bytes..];

        let record_size = signal_headers
            .iter()
            .map(|sh| sh.num_samples_per_record * 2)
            .sum::<usize>();

        let num_records = if header.num_data_records < 0 {
            if header.num_data_records != -1 {
                return Err(EdfError::InvalidField {
                    field: "num_data_records",
                    value: header.num_data_records.to_string(),
                });
            }
            // Unknown record count: derive it from the data section.
            if record_size == 0 {
                0
            } else {
                data.len() / record_size
            }
        } else {
            header.num_data_records as usize
        };

        let required = num_records
            .checked_mul(record_size)
            .ok_or_else(|| EdfError::Inconsistent("record layout overflows".to_string()))?;
        if data.len() < required {
            return Err(EdfError::Inconsistent(format!(
                "header declares {} records of {} bytes ({} bytes) but data section has {} bytes",
                num_records,
                record_size,
                required,
                data.len()
            )));
        }

        tracing::debug!(
            num_records,
            record_size,
            num_signals = header.num_signals,
            "EDF header parsed"
        );

        Ok(Self {
            header,
            signal_headers,
            data: &data[..required],
            num_records,
        })
    }

    pub fn num_records(&self) -> usize {
        self.num_records
    }

    pub fn total_duration(&self) -> f64 {
        self.num_records as f64 * self.header.duration_of_data_record
    }

    fn read_fixed_string<R: Read>(reader: &mut R, size: usize) -> Result<String, EdfError> {
        let mut buffer = vec![0u8; size];
        reader
            .read_exact(&mut buffer)
            .map_err(|e| EdfError::Truncated(format!("failed to read header field: {}", e)))?;
        Ok(String::from_utf8_lossy(&buffer).trim().to_string())
    }

    fn read_number<R: Read, T: std::str::FromStr>(
        reader: &mut R,
        size: usize,
        field: &'static str,
    ) -> Result<T, EdfError> {
        let value = Self::read_fixed_string(reader, size)?;
        value
            .parse::<T>()
            .map_err(|_| EdfError::InvalidField { field, value })
    }

    fn read_header<R: Read>(reader: &mut R) -> Result<EdfHeader, EdfError> {
        let version = Self::read_fixed_string(reader, 8)?;
        let patient_id = Self::read_fixed_string(reader, 80)?;
        let recording_id = Self::read_fixed_string(reader, 80)?;
        let start_date = Self::read_fixed_string(reader, 8)?;
        let start_time = Self::read_fixed_string(reader, 8)?;
        let header_bytes = Self::read_number(reader, 8, "header_bytes")?;
        let reserved = Self::read_fixed_string(reader, 44)?;
        let num_data_records = Self::read_number(reader, 8, "num_data_records")?;
        let duration_of_data_record: f64 =
            Self::read_number(reader, 8, "duration_of_data_record")?;
        let num_signals = Self::read_number(reader, 4, "num_signals")?;

        if !(duration_of_data_record.is_finite() && duration_of_data_record > 0.0) {
            return Err(EdfError::InvalidField {
                field: "duration_of_data_record",
                value: duration_of_data_record.to_string(),
            });
        }

        Ok(EdfHeader {
            version,
            patient_id,
            recording_id,
            start_date,
            start_time,
            header_bytes,
            reserved,
            num_data_records,
            duration_of_data_record,
            num_signals,
        })
    }

    fn read_signal_headers<R: Read>(
        reader: &mut R,
        num_signals: usize,
    ) -> Result<Vec<EdfSignalHeader>, EdfError> {
        // Fields are stored column-wise: all labels, then all transducers, ...
        let mut read_column = |size: usize| -> Result<Vec<String>, EdfError> {
            (0..num_signals)
                .map(|_| Self::read_fixed_string(reader, size))
                .collect()
        };

        let labels = read_column(16)?;
        let transducer_types = read_column(80)?;
        let physical_dimensions = read_column(8)?;
        let physical_minimums = read_column(8)?;
        let physical_maximums = read_column(8)?;
        let digital_minimums = read_column(8)?;
        let digital_maximums = read_column(8)?;
        let prefilterings = read_column(80)?;
        let num_samples = read_column(8)?;
        let reserveds = read_column(32)?;

        fn parse<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, EdfError> {
            value.parse::<T>().map_err(|_| EdfError::InvalidField {
                field,
                value: value.to_string(),
            })
        }

        let mut signal_headers = Vec::with_capacity(num_signals);
        for i in 0..num_signals {
            let header = EdfSignalHeader {
                label: labels[i].clone(),
                transducer_type: transducer_types[i].clone(),
                physical_dimension: physical_dimensions[i].clone(),
                physical_minimum: parse(&physical_minimums[i], "physical_minimum")?,
                physical_maximum: parse(&physical_maximums[i], "physical_maximum")?,
                digital_minimum: parse(&digital_minimums[i], "digital_minimum")?,
                digital_maximum: parse(&digital_maximums[i], "digital_maximum")?,
                prefiltering: prefilterings[i].clone(),
                num_samples_per_record: parse(&num_samples[i], "num_samples_per_record")?,
                reserved: reserveds[i].clone(),
            };

            if header.digital_maximum <= header.digital_minimum {
                return Err(EdfError::Inconsistent(format!(
                    "signal '{}' has digital range {}..{}",
                    header.label, header.digital_minimum, header.digital_maximum
                )));
            }
            signal_headers.push(header);
        }

        Ok(signal_headers)
    }

    /// Byte offset of `signal_index` inside a single data record.
    fn signal_offset_in_record(&self, signal_index: usize) -> usize {
        self.signal_headers[..signal_index]
            .iter()
            .map(|sh| sh.num_samples_per_record * 2)
            .sum()
    }

    fn record_size(&self) -> usize {
        self.signal_headers
            .iter()
            .map(|sh| sh.num_samples_per_record * 2)
            .sum()
    }

    /// Decode one signal across all data records, in physical units.
    pub fn read_physical_signal(&self, signal_index: usize) -> Result<Vec<f64>, EdfError> {
        let signal_header = self
            .signal_headers
            .get(signal_index)
            .ok_or(EdfError::SignalOutOfBounds(signal_index))?;

        let gain = signal_header.gain();
        let offset = signal_header.offset();
        let samples_per_record = signal_header.num_samples_per_record;
        let record_size = self.record_size();
        let signal_offset = self.signal_offset_in_record(signal_index);

        let mut samples = Vec::with_capacity(self.num_records * samples_per_record);
        for record_idx in 0..self.num_records {
            let start = record_idx * record_size + signal_offset;
            let end = start + samples_per_record * 2;
            samples.extend(
                self.data[start..end]
                    .chunks_exact(2)
                    .map(|b| gain * i16::from_le_bytes([b[0], b[1]]) as f64 + offset),
            );
        }

        Ok(samples)
    }

    /// Decode the given signals in parallel, preserving the requested order.
    pub fn read_physical_signals(&self, indices: &[usize]) -> Result<Vec<Vec<f64>>, EdfError> {
        indices
            .par_iter()
            .map(|&idx| self.read_physical_signal(idx))
            .collect()
    }
}
