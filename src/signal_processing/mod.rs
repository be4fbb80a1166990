//! Signal Processing Module
//!
//! Frequency-domain processing of EEG recordings:
//! - filter specs and their spectral / Butterworth realisations
//! - the filter stage applied to whole recordings
//! - Welch power spectral density estimation

mod filters;
mod pipeline;
mod spectral;

pub use filters::{
    create_sos_filter, spectral_filter, BiquadCoeffs, BiquadFilter, ButterworthFilter,
    FilterDesign, FilterKind, FilterSpec, NotchFilter, SosFilter,
};
pub use pipeline::{
    apply_filters, default_band_pass, default_notch, line_noise_notch, FilterChain,
};
pub use spectral::{estimate_psd, mean_spectrum, welch, SpectralEstimate, WelchParams};
