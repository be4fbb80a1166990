pub mod analysis;
pub mod bands;
pub mod cli;
pub mod config;
pub mod edf;
pub mod error;
pub mod handlers;
pub mod loader;
pub mod plots;
pub mod recording;
pub mod router;
pub mod signal_processing;
pub mod state;

pub use analysis::{run_analysis, AnalysisConfig, AnalysisReport};
pub use config::ServerConfig;
pub use error::{AnalysisError, Result};
pub use recording::Recording;
pub use router::create_router;
pub use state::AppState;
