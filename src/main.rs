use anyhow::Context;
use brainwave_analyzer::{
    analysis::{run_analysis, AnalysisReport},
    cli::{Cli, Commands},
    config::ServerConfig,
    create_router,
    state::AppState,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brainwave_analyzer=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env()?;

    match cli.command {
        Some(Commands::Analyze {
            file,
            start_time,
            output_dir,
            json,
        }) => analyze_file(&config, &file, start_time, &output_dir, json),
        Some(Commands::Serve) | None => serve(config).await,
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    info!("🚀 Starting Brain Wave Analyzer v{}", VERSION);
    info!("📋 Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    info!("   Static directory: {:?}", config.static_directory);
    info!("   Max upload size: {} bytes", config.max_upload_size);
    info!("   CORS origins: {:?}", config.cors_origins);
    info!("   Filter design: {:?}", config.analysis.filters.design);
    info!("   Analysis window: {} s", config.analysis.window_seconds);

    let figures_dir = config.figures_directory();
    tokio::fs::create_dir_all(&figures_dir)
        .await
        .with_context(|| format!("creating figures directory {:?}", figures_dir))?;

    let addr: SocketAddr = config.bind_address().parse()?;
    let app = create_router(Arc::new(AppState::new(config)));

    info!("🎧 Listening on http://{}", addr);
    info!("🔑 Health endpoint: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn analyze_file(
    config: &ServerConfig,
    file: &Path,
    start_time: f64,
    output_dir: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let analysis_id = Uuid::new_v4().to_string();

    let report = run_analysis(
        &bytes,
        &filename,
        start_time,
        &config.analysis,
        output_dir,
        &analysis_id,
    )?
    .with_plot_paths(output_dir);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_band_table(&report, output_dir);
    }

    Ok(())
}

fn print_band_table(report: &AnalysisReport, output_dir: &Path) {
    let results = &report.results;
    println!(
        "Analysis {} ({} channels, {} Hz, {:.1} s from {:.1} s)",
        report.analysis_id,
        results.channels.len(),
        results.sample_rate,
        results.window.duration_seconds,
        results.window.start_seconds
    );
    println!("{:<10} {:>16} {:>12}", "Band", "Avg power", "Relative");
    println!("{}", "-".repeat(40));
    for ((band, power), relative) in results
        .freq_bands
        .iter()
        .zip(&results.average_power)
        .zip(&results.relative_power)
    {
        println!("{:<10} {:>16.6e} {:>12.4}", band, power, relative);
    }
    println!("Figures written to {}", output_dir.display());
}
