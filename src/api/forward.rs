//! Pass-through endpoints of the remote AI-application API.
//!
//! Bodies are forwarded untouched apart from `taskId`, which the remote
//! client rewrites as a string in both directions. Remote failures come back
//! as the usual `{"code":-1}` envelope.

use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::{HeaderMap, Uri},
};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{info, warn};

use super::{
    error::ApiError,
    models::WebappQuery,
    state::AppState,
    utils::parse_optional_json,
};
use crate::remote::RemoteError;
use crate::storage::Category;

/// POST endpoints proxied to the same path on the remote backend.
pub const FORWARDED_POST: &[&str] = &[
    "/uc/openapi/accountStatus",
    "/task/openapi/ai-app/run",
    "/task/openapi/status",
    "/task/openapi/cancel",
    "/task/openapi/outputs",
];

pub const WEBAPP_INFO: &str = "/api/webapp/apiCallDemo";
pub const UPLOAD: &str = "/task/openapi/upload";

/// Forward a JSON POST to the remote path matching the request path.
pub async fn forward_post(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let payload: Option<Value> = parse_optional_json(&headers, &body)?;
    let response = state.remote.post_json(uri.path(), payload).await;

    Ok(Json(record(&state, uri.path(), response)?))
}

/// Application metadata (GET /api/webapp/apiCallDemo?apiKey=&webappId=)
pub async fn webapp_info(
    State(state): State<AppState>,
    Query(query): Query<WebappQuery>,
) -> Result<Json<Value>, ApiError> {
    let api_key = query.api_key.unwrap_or_default();
    let webapp_id = query.webapp_id.unwrap_or_default();

    let response = state
        .remote
        .get_json(WEBAPP_INFO, &[("apiKey", api_key.as_str()), ("webappId", webapp_id.as_str())])
        .await;

    Ok(Json(record(&state, WEBAPP_INFO, response)?))
}

/// Stage an input file locally, then forward it (POST /task/openapi/upload)
///
/// Multipart fields: `file`, `apiKey`, `fileType` (`IMAGE`, `VIDEO`,
/// `AUDIO`, anything else is filed under `others`) and `nodeId`.
pub async fn upload_resource(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload = None;
    let mut api_key = String::new();
    let mut file_type = String::new();
    let mut node_id = String::new();

    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(invalid_multipart)?;
                upload = Some((file_name, content_type, data));
            }
            Some("apiKey") => api_key = field.text().await.map_err(invalid_multipart)?,
            Some("fileType") => file_type = field.text().await.map_err(invalid_multipart)?,
            Some("nodeId") => node_id = field.text().await.map_err(invalid_multipart)?,
            _ => {}
        }
    }

    let Some((file_name, content_type, data)) = upload else {
        return Err(ApiError::MissingParameter("file"));
    };
    if file_name.is_empty() {
        return Err(ApiError::MissingParameter("file name"));
    }

    let category = Category::from_upload_kind(&file_type);
    let staged = state.store.stage_upload(category, &file_name, &data).await?;
    info!(%category, file = %file_name, size = data.len(), path = %staged.display(), "Upload staged");

    let mut part = Part::bytes(data.to_vec()).file_name(file_name.clone());
    if let Some(content_type) = content_type {
        part = part.mime_str(&content_type).map_err(RemoteError::from)?;
    }

    let form = Form::new()
        .text("apiKey", api_key)
        .text("fileType", file_type)
        .text("nodeId", node_id)
        .text("fileName", file_name)
        .part("file", part);

    let response = state.remote.post_multipart(UPLOAD, form).await;
    Ok(Json(record(&state, UPLOAD, response)?))
}

fn record(
    state: &AppState,
    endpoint: &str,
    response: Result<Value, RemoteError>,
) -> Result<Value, ApiError> {
    match response {
        Ok(body) => {
            state.metrics.request_forwarded();
            Ok(body)
        }
        Err(e) => {
            state.metrics.forward_failed();
            warn!(%endpoint, error = %e, transient = e.is_transient(), "Remote call failed");
            Err(e.into())
        }
    }
}

fn invalid_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::InvalidPayload(e.body_text())
}
