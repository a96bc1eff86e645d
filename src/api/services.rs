use std::collections::BTreeMap;

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::Value;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{info, warn};

use super::{
    error::ApiError,
    models::{
        ApiResponse, ControlRequest, FileUpdateRequest, GalleryQuery, HealthResponse,
        SaveResultRequest,
    },
    state::AppState,
    utils::parse_json,
};
use crate::control::ControlAction;
use crate::storage::{Category, PathMapping, SaveStatus, StorageError, save_artifact};

/// Restart or stop the worker (POST /api/system/control)
///
/// Termination is only scheduled here; the acknowledgement is sent first and
/// the server drains it before the process exits with the matching code.
pub async fn control(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let request: ControlRequest = parse_json(&headers, &body)?;
    let action: ControlAction = request.action.as_deref().unwrap_or_default().parse()?;

    let signal = action.signal();
    info!(%signal, "Control action accepted");
    state.exit.schedule(signal);

    let msg = match action {
        ControlAction::Restart => "System is restarting...",
        ControlAction::Exit => "System is shutting down...",
    };
    Ok(Json(ApiResponse::message(msg)))
}

/// Current category → directory mapping (GET /api/system/paths)
pub async fn get_paths(State(state): State<AppState>) -> Json<ApiResponse<PathMapping>> {
    Json(ApiResponse::data(state.store.paths()))
}

/// Replace the category → directory mapping (POST /api/system/paths)
pub async fn set_paths(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let payload: Value = parse_json(&headers, &body)?;
    let mapping = parse_mapping(payload)?;

    state.store.set_paths(mapping).await?;
    state.store.prepare().await;

    Ok(Json(ApiResponse::message("Path configuration saved")))
}

/// Accepts `{category: path}` with recognized categories and string paths.
fn parse_mapping(payload: Value) -> Result<PathMapping, ApiError> {
    let object = match payload {
        Value::Null => return Err(StorageError::EmptyMapping.into()),
        Value::Object(object) => object,
        _ => {
            return Err(ApiError::InvalidPayload(
                "expected an object of category paths".into(),
            ));
        }
    };

    let mut mapping = PathMapping::new();
    for (key, value) in object {
        let category: Category = key.parse()?;
        let Value::String(path) = value else {
            return Err(ApiError::InvalidPayload(format!(
                "path for '{}' must be a string",
                category
            )));
        };
        mapping.insert(category.as_str().to_string(), path);
    }

    Ok(mapping)
}

/// Files of one category, newest first (GET /api/gallery/files?type=...)
pub async fn gallery_files(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let category: Category = query.kind.as_deref().unwrap_or("images").parse()?;
    let entries = state.store.list_entries(category).await?;
    let count = entries.len();

    Ok(Json(ApiResponse::data(entries).with_count(count)))
}

/// Stream a stored output (GET /<proxy-prefix>/<category>/<file>)
pub async fn serve_output(
    State(state): State<AppState>,
    Path((category, file_name)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound(format!("{}/{}", category, file_name));

    let parsed: Category = category.parse().map_err(|_| not_found())?;
    let path = state
        .store
        .open_file(parsed, &file_name)
        .await
        .map_err(|e| {
            if !matches!(e, StorageError::NotFound(_)) {
                warn!(%category, file = %file_name, error = %e, "Rejected file request");
            }
            not_found()
        })?;

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let mut response = response.map(Body::new);
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    Ok(response)
}

/// Cache a remote result locally (POST /api/save_result)
pub async fn save_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let request: SaveResultRequest = parse_json(&headers, &body)?;
    let url = request
        .file_url
        .filter(|url| !url.is_empty())
        .ok_or(ApiError::MissingParameter("fileUrl"))?;

    let saved = save_artifact(&state.store, &state.remote, &url, request.file_name.as_deref())
        .await
        .inspect_err(|_| state.metrics.forward_failed())?;

    match saved.status {
        SaveStatus::Exist => state.metrics.artifact_reused(),
        SaveStatus::Downloaded => state.metrics.artifact_downloaded(),
    }

    Ok(Json(ApiResponse {
        local_path: Some(saved.local_ref),
        ..ApiResponse::message(saved.status.as_str())
    }))
}

/// Overwrite a stored text output (POST /api/file/update)
pub async fn update_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse>, ApiError> {
    let request: FileUpdateRequest = parse_json(&headers, &body)?;
    let reference = request
        .file_path
        .filter(|path| !path.is_empty())
        .ok_or(ApiError::MissingParameter("filePath"))?;
    let content = request.content.ok_or(ApiError::MissingParameter("content"))?;

    state.store.update_content(&reference, &content).await?;
    state.metrics.file_updated();

    Ok(Json(ApiResponse::message("Saved")))
}

/// Liveness plus per-category writability (GET /health)
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let unwritable = state.store.unwritable();
    let storage: BTreeMap<Category, bool> = Category::ALL
        .into_iter()
        .map(|category| (category, !unwritable.contains(&category)))
        .collect();

    let status = if unwritable.is_empty() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        metrics: state.metrics.snapshot(),
        storage,
    })
}
