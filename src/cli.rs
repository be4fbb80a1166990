use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Brain Wave Analyzer - EEG band power service
#[derive(Parser)]
#[command(name = "brainwave-analyzer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default)
    Serve,

    /// Analyze a local EDF file without starting the server
    Analyze {
        /// Path to the .edf recording
        file: PathBuf,

        /// Start of the analysed window, in seconds
        #[arg(short, long, default_value = "0")]
        start_time: f64,

        /// Directory for the rendered figures
        #[arg(short, long, default_value = "figures")]
        output_dir: PathBuf,

        /// Print the full JSON report
        #[arg(long)]
        json: bool,
    },
}
