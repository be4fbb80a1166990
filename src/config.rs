use crate::analysis::AnalysisConfig;
use crate::bands::canonical_bands;
use crate::signal_processing::{
    default_band_pass, line_noise_notch, FilterChain, FilterDesign, FilterSpec, WelchParams,
};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost)
    pub bind_addr: String,
    /// Directory served under /static; figures go to its `figures` subdirectory
    pub static_directory: PathBuf,
    /// Maximum upload file size in bytes (default 100MB)
    pub max_upload_size: usize,
    /// CORS allowed origins (comma-separated in env var)
    pub cors_origins: Vec<String>,
    /// Pipeline settings applied to every upload
    pub analysis: AnalysisConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_addr: "0.0.0.0".to_string(),
            static_directory: PathBuf::from("static"),
            max_upload_size: 100 * 1024 * 1024,
            cors_origins: default_cors_origins(),
            analysis: AnalysisConfig::default(),
        }
    }
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:8501".to_string(),
        "http://127.0.0.1:8501".to_string(),
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("BRAINWAVE_PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidPort)?,
            None => defaults.port,
        };

        Ok(Self {
            port,
            bind_addr: lookup("BRAINWAVE_BIND_ADDR").unwrap_or(defaults.bind_addr),
            static_directory: lookup("STATIC_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_directory),
            max_upload_size: parse_or(&lookup, "MAX_UPLOAD_SIZE", defaults.max_upload_size)?,
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            analysis: analysis_from_lookup(&lookup)?,
        })
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Where rendered figures are written
    pub fn figures_directory(&self) -> PathBuf {
        self.static_directory.join("figures")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}={}", key, raw))),
        None => Ok(default),
    }
}

/// Pipeline settings: filter edges, filter design, window and Welch parameters.
pub fn analysis_from_lookup<F>(lookup: &F) -> Result<AnalysisConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let line_frequency: f64 = parse_or(lookup, "LINE_FREQUENCY", 50.0)?;
    let notch_width: f64 = parse_or(lookup, "NOTCH_WIDTH", 4.0)?;
    let default_bp = default_band_pass();
    let highpass: f64 = parse_or(lookup, "HIGHPASS_FREQUENCY", default_bp.low.unwrap_or(0.1))?;
    let lowpass: f64 = parse_or(lookup, "LOWPASS_FREQUENCY", default_bp.high.unwrap_or(45.0))?;

    if !(notch_width > 0.0) || notch_width >= 2.0 * line_frequency {
        return Err(ConfigError::InvalidValue(format!(
            "NOTCH_WIDTH={} must be positive and narrower than twice LINE_FREQUENCY",
            notch_width
        )));
    }
    if !(highpass >= 0.0 && highpass < lowpass) {
        return Err(ConfigError::InvalidValue(format!(
            "HIGHPASS_FREQUENCY ({}) must be non-negative and below LOWPASS_FREQUENCY ({})",
            highpass, lowpass
        )));
    }

    let design = match lookup("FILTER_DESIGN").map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("spectral") => FilterDesign::Spectral,
        Some("butterworth") => FilterDesign::Butterworth {
            order: parse_or(lookup, "FILTER_ORDER", 4)?,
        },
        Some(other) => {
            return Err(ConfigError::InvalidValue(format!(
                "FILTER_DESIGN={} (expected 'spectral' or 'butterworth')",
                other
            )))
        }
    };
    if let FilterDesign::Butterworth { order: 0 } = design {
        return Err(ConfigError::InvalidValue("FILTER_ORDER must be at least 1".to_string()));
    }

    let window_seconds: f64 = parse_or(lookup, "ANALYSIS_WINDOW_SECONDS", 60.0)?;
    if !(window_seconds > 0.0 && window_seconds.is_finite()) {
        return Err(ConfigError::InvalidValue(format!(
            "ANALYSIS_WINDOW_SECONDS={} must be positive",
            window_seconds
        )));
    }

    let welch = WelchParams {
        n_fft: parse_or(lookup, "WELCH_N_FFT", 256)?,
        n_overlap: parse_or(lookup, "WELCH_N_OVERLAP", 0)?,
    };
    welch
        .validate()
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    Ok(AnalysisConfig {
        filters: FilterChain {
            filters: vec![
                line_noise_notch(line_frequency, notch_width),
                FilterSpec::band_pass("Bandpass", highpass, lowpass),
            ],
            design,
        },
        window_seconds,
        welch,
        bands: canonical_bands(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
