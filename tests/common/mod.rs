#![allow(dead_code)]

use std::f64::consts::PI;

/// One channel of a synthetic EDF file.
pub struct TestSignal {
    pub label: String,
    pub samples: Vec<f64>,
}

impl TestSignal {
    pub fn sine(label: &str, freq: f64, amplitude: f64, sample_rate: f64, seconds: usize) -> Self {
        let n = sample_rate as usize * seconds;
        Self {
            label: label.to_string(),
            samples: (0..n)
                .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sample_rate).sin())
                .collect(),
        }
    }
}

const PHYSICAL_MIN: f64 = -500.0;
const PHYSICAL_MAX: f64 = 500.0;
const DIGITAL_MIN: i64 = -32768;
const DIGITAL_MAX: i64 = 32767;

fn field(value: &str, size: usize) -> Vec<u8> {
    let mut buffer = vec![b' '; size];
    buffer[..value.len()].copy_from_slice(value.as_bytes());
    buffer
}

/// Serialize signals as an EDF file with 1-second records.
///
/// All signals are written with `sample_rate` samples per record.
pub fn build_edf(signals: &[TestSignal], sample_rate: usize) -> Vec<u8> {
    build_edf_with_records(signals, sample_rate, None)
}

/// Like [`build_edf`], optionally overriding the declared record count.
pub fn build_edf_with_records(
    signals: &[TestSignal],
    sample_rate: usize,
    declared_records: Option<&str>,
) -> Vec<u8> {
    build_edf_with_layout(signals, &vec![sample_rate; signals.len()], declared_records)
}

/// Serialize signals with their own samples-per-record each. The record count
/// follows from the first signal.
pub fn build_edf_with_layout(
    signals: &[TestSignal],
    samples_per_record: &[usize],
    declared_records: Option<&str>,
) -> Vec<u8> {
    assert_eq!(signals.len(), samples_per_record.len());
    let ns = signals.len();
    let num_records = signals
        .first()
        .map(|s| s.samples.len() / samples_per_record[0])
        .unwrap_or(0);
    let records = declared_records
        .map(str::to_string)
        .unwrap_or_else(|| num_records.to_string());

    let mut bytes = Vec::new();
    bytes.extend(field("0", 8));
    bytes.extend(field("X X X X", 80));
    bytes.extend(field("Startdate 01-JAN-2024 X X X", 80));
    bytes.extend(field("01.01.24", 8));
    bytes.extend(field("10.00.00", 8));
    bytes.extend(field(&(256 * (ns + 1)).to_string(), 8));
    bytes.extend(field("", 44));
    bytes.extend(field(&records, 8));
    bytes.extend(field("1", 8));
    bytes.extend(field(&ns.to_string(), 4));

    // Signal headers are stored field by field across all signals
    let column = |bytes: &mut Vec<u8>, value: &dyn Fn(usize, &TestSignal) -> String, size: usize| {
        for (idx, signal) in signals.iter().enumerate() {
            bytes.extend(field(&value(idx, signal), size));
        }
    };
    column(&mut bytes, &|_, s| s.label.clone(), 16);
    column(&mut bytes, &|_, _| "AgAgCl electrode".to_string(), 80);
    column(&mut bytes, &|_, _| "uV".to_string(), 8);
    column(&mut bytes, &|_, _| PHYSICAL_MIN.to_string(), 8);
    column(&mut bytes, &|_, _| PHYSICAL_MAX.to_string(), 8);
    column(&mut bytes, &|_, _| DIGITAL_MIN.to_string(), 8);
    column(&mut bytes, &|_, _| DIGITAL_MAX.to_string(), 8);
    column(&mut bytes, &|_, _| "".to_string(), 80);
    column(&mut bytes, &|idx, _| samples_per_record[idx].to_string(), 8);
    column(&mut bytes, &|_, _| "".to_string(), 32);

    let gain = (PHYSICAL_MAX - PHYSICAL_MIN) / (DIGITAL_MAX - DIGITAL_MIN) as f64;
    let offset = PHYSICAL_MAX - gain * DIGITAL_MAX as f64;

    for record in 0..num_records {
        for (signal, &per_record) in signals.iter().zip(samples_per_record) {
            for &x in &signal.samples[record * per_record..(record + 1) * per_record] {
                let digital = ((x - offset) / gain)
                    .round()
                    .clamp(DIGITAL_MIN as f64, DIGITAL_MAX as f64) as i16;
                bytes.extend_from_slice(&digital.to_le_bytes());
            }
        }
    }

    bytes
}

/// Two channels at 256 Hz for 10 s: 10 Hz on the first, 20 Hz on the second.
pub fn alpha_beta_recording() -> Vec<u8> {
    build_edf(
        &[
            TestSignal::sine("Fp1", 10.0, 50.0, 256.0, 10),
            TestSignal::sine("Fp2", 20.0, 50.0, 256.0, 10),
        ],
        256,
    )
}

/// Header for a file that declares no signals at all.
pub fn empty_recording() -> Vec<u8> {
    build_edf(&[], 256)
}
