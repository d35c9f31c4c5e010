//! Conversion endpoints.
//!
//! Both endpoints funnel into [`run_conversion`], which bounds concurrency
//! with the session semaphore and the request timeout. A timed-out
//! conversion is dropped together with its session and engine.

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection,
        rejection::{BytesRejection, QueryRejection},
        Multipart, Query, State,
    },
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{error, warn};

use heics_core::converter::{download_name, is_supported_input_name};
use heics_core::{
    ConversionDefaults, ConversionOutput, ConversionRequest, ConverterError, OutputFormat,
};

use super::ErrorResponse;
use crate::metrics::{CONVERSIONS_IN_FLIGHT, CONVERSION_TIMEOUTS_TOTAL};
use crate::state::AppState;

/// Input name assumed when the client sends none.
pub const FALLBACK_INPUT_NAME: &str = "sticker.heics";

pub const STREAM_HYPOTHESIS_HEADER: HeaderName = HeaderName::from_static("x-stream-hypothesis");
pub const CONVERSION_ATTEMPTS_HEADER: HeaderName =
    HeaderName::from_static("x-conversion-attempts");

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Query parameters of `POST /api/v1/convert`.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertParams {
    pub format: Option<String>,
    pub constrain_128: Option<bool>,
    pub cap_fps_10: Option<bool>,
    pub filename: Option<String>,
}

impl ConvertParams {
    /// Fills unset values from the configured defaults.
    pub fn resolve(
        &self,
        defaults: &ConversionDefaults,
    ) -> Result<(String, ConversionRequest), ApiError> {
        let input_name = resolve_input_name(self.filename.as_deref())?;

        let format = match self.format.as_deref() {
            Some(raw) => raw
                .parse::<OutputFormat>()
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?,
            None => defaults.format,
        };

        let mut options = defaults.options();
        if let Some(constrain) = self.constrain_128 {
            options.constrain_to_128px = constrain;
        }
        if let Some(cap) = self.cap_fps_10 {
            options.cap_frame_rate_10 = cap;
        }

        Ok((input_name, ConversionRequest::new(format, options)))
    }
}

/// Keeps only the final path component and checks the extension.
fn resolve_input_name(raw: Option<&str>) -> Result<String, ApiError> {
    let name = raw
        .map(str::trim)
        .and_then(|n| n.rsplit(['/', '\\']).next())
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_INPUT_NAME);

    if !is_supported_input_name(name) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Unsupported file '{}': expected a .heic or .heics file", name),
        ));
    }
    Ok(name.to_string())
}

/// Parses a form checkbox value.
fn parse_flag(field: &str, value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        other => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid value '{}' for {}", other, field),
        )),
    }
}

/// Maps a conversion failure onto an HTTP status.
pub fn error_status(error: &ConverterError) -> StatusCode {
    match error {
        ConverterError::Exhausted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ConverterError::Acquisition { .. } | ConverterError::FfmpegNotFound { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ConverterError::InvalidInput { .. } | ConverterError::UnsupportedFormat { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /api/v1/convert
///
/// Converts the raw request body.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ConvertParams>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|e| api_error(e.status(), e.body_text()))?;
    let body = body.map_err(|e| api_error(e.status(), e.body_text()))?;

    let (input_name, request) = params.resolve(&state.config().conversion)?;
    run_conversion(&state, &input_name, request, body).await
}

/// POST /api/v1/convert/upload
///
/// Converts a file uploaded as `multipart/form-data`.
pub async fn convert_upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart.map_err(|e| api_error(e.status(), e.body_text()))?;

    let mut params = ConvertParams::default();
    let mut data: Option<Bytes> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(api_error(e.status(), e.body_text())),
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                params.filename = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    api_error(e.status(), format!("Failed to read file: {}", e.body_text()))
                })?;
                data = Some(bytes);
            }
            "format" | "constrain_128" | "cap_fps_10" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| api_error(e.status(), e.body_text()))?;
                match name.as_str() {
                    "format" if !text.trim().is_empty() => {
                        params.format = Some(text.trim().to_string())
                    }
                    "constrain_128" => params.constrain_128 = Some(parse_flag(&name, &text)?),
                    "cap_fps_10" => params.cap_fps_10 = Some(parse_flag(&name, &text)?),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No file provided"))?;
    let (input_name, request) = params.resolve(&state.config().conversion)?;
    run_conversion(&state, &input_name, request, data).await
}

/// Runs one conversion session under the concurrency and time limits.
async fn run_conversion(
    state: &AppState,
    input_name: &str,
    request: ConversionRequest,
    input: Bytes,
) -> Result<Response, ApiError> {
    if input.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Request body is empty"));
    }

    let timeout = state.request_timeout();
    let deadline = Instant::now() + timeout;
    let format = request.format;

    // Waiting for a free session counts against the request deadline.
    let _permit = match timeout_at(deadline, state.sessions().acquire()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => {
            return Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Conversion service is shutting down",
            ))
        }
        Err(_) => return Err(timed_out(input_name, format, timeout)),
    };

    CONVERSIONS_IN_FLIGHT.inc();
    let result = timeout_at(deadline, state.converter().convert(&input, request)).await;
    CONVERSIONS_IN_FLIGHT.dec();

    match result {
        Ok(Ok(output)) => Ok(success_response(input_name, format, output)),
        Ok(Err(e)) => {
            let status = error_status(&e);
            let retryable = e.is_retryable();
            if status.is_server_error() {
                error!(input = %input_name, format = %format, retryable, error = %e, "Conversion failed");
            } else {
                warn!(input = %input_name, format = %format, retryable, error = %e, "Conversion rejected");
            }
            Err(api_error(status, e.to_string()))
        }
        Err(_) => Err(timed_out(input_name, format, timeout)),
    }
}

fn timed_out(input_name: &str, format: OutputFormat, timeout: Duration) -> ApiError {
    CONVERSION_TIMEOUTS_TOTAL.inc();
    warn!(
        input = %input_name,
        format = %format,
        timeout_secs = timeout.as_secs(),
        "Conversion timed out"
    );
    api_error(
        StatusCode::GATEWAY_TIMEOUT,
        format!("Conversion timed out after {}s", timeout.as_secs()),
    )
}

fn success_response(input_name: &str, format: OutputFormat, output: ConversionOutput) -> Response {
    let disposition = content_disposition(&download_name(input_name, format));
    let hypothesis = output.hypothesis.label();
    let attempts = output.attempts;
    let mime_type = output.descriptor.mime_type;

    let mut response = (StatusCode::OK, output.bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime_type));
    headers.insert(CONVERSION_ATTEMPTS_HEADER, HeaderValue::from(attempts));
    if let Ok(value) = HeaderValue::from_str(&hypothesis) {
        headers.insert(STREAM_HYPOTHESIS_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_control() || c == '"' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}
