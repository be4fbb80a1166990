use thiserror::Error;

/// Errors produced by the analysis pipeline.
///
/// Every variant is terminal for the request that produced it.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to load recording: {0}")]
    Load(String),

    #[error("Filter cannot be applied: {0}")]
    Filter(String),

    #[error("Invalid data: {0}")]
    Data(String),

    #[error("Failed to write output: {0}")]
    Disk(String),
}

impl AnalysisError {
    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Load(_) => "load_error",
            AnalysisError::Filter(_) => "filter_error",
            AnalysisError::Data(_) => "data_error",
            AnalysisError::Disk(_) => "disk_error",
        }
    }
}

impl From<crate::edf::EdfError> for AnalysisError {
    fn from(err: crate::edf::EdfError) -> Self {
        AnalysisError::Load(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
