use axum::{
    extract::{rejection::QueryRejection, Multipart, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiError;
use crate::analysis::{run_analysis, AnalysisReport};
use crate::loader::is_supported;
use crate::state::AppState;

/// Query parameters of the analyze endpoint
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AnalyzeParams {
    /// Offset of the analysed window, in seconds from the start of the recording
    #[serde(default)]
    pub start_time: Option<f64>,
}

/// Upload an EDF file and run the full analysis on it
pub async fn analyze_edf(
    State(state): State<Arc<AppState>>,
    params: Result<Query<AnalyzeParams>, QueryRejection>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisReport>, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        ApiError::bad_request(format!("Invalid query parameters: {}", rejection.body_text()))
    })?;
    let mut upload: Option<(String, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), format!("Invalid multipart data: {}", e.body_text())))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !is_supported(&filename) {
            return Err(ApiError::bad_request("Only .edf files are supported"));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), format!("Failed to read file: {}", e.body_text())))?;

        if data.len() > state.config.max_upload_size {
            return Err(ApiError::new(
                axum::http::StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "File too large. Maximum size: {} bytes",
                    state.config.max_upload_size
                ),
            ));
        }

        tracing::info!("File uploaded: {} ({} bytes)", filename, data.len());
        upload = Some((filename, data));
    }

    let (filename, data) = upload.ok_or_else(|| ApiError::unprocessable("No file uploaded"))?;

    let analysis_id = Uuid::new_v4().to_string();
    let start_time = params.start_time.unwrap_or(0.0);
    let config = state.config.analysis.clone();
    let figures_dir = state.figures_directory();

    let report = tokio::task::spawn_blocking(move || {
        run_analysis(&data, &filename, start_time, &config, &figures_dir, &analysis_id)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Analysis task failed: {}", e)))??;

    Ok(Json(report))
}
