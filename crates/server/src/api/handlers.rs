use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use heics_core::{OutputFormat, SanitizedConfig};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// One catalog entry as offered to clients.
#[derive(Debug, Serialize)]
pub struct FormatEntry {
    pub format: OutputFormat,
    pub label: &'static str,
    pub extension: &'static str,
    pub mime_type: &'static str,
    pub description: &'static str,
    /// Whether the local engine build can encode this format.
    pub available: bool,
    /// Whether this format is used when a request names none.
    pub default: bool,
}

#[derive(Debug, Serialize)]
pub struct FormatsResponse {
    pub formats: Vec<FormatEntry>,
    /// Whether transparency survives conversion on this build.
    pub preserves_alpha: bool,
}

/// GET /api/v1/formats
pub async fn list_formats(State(state): State<Arc<AppState>>) -> Json<FormatsResponse> {
    let capabilities = state.capabilities();
    let default_format = state.config().conversion.format;

    let formats = OutputFormat::ALL
        .into_iter()
        .map(|format| {
            let descriptor = format.describe();
            FormatEntry {
                format,
                label: descriptor.label,
                extension: descriptor.extension,
                mime_type: descriptor.mime_type,
                description: descriptor.description,
                available: capabilities.supports(format),
                default: format == default_format,
            }
        })
        .collect();

    Json(FormatsResponse {
        formats,
        preserves_alpha: capabilities.preserves_alpha(),
    })
}
