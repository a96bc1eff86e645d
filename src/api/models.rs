//! Wire types of the dashboard API.
//!
//! Every JSON endpoint answers with the same envelope:
//!
//! ```json
//! { "code": 0, "msg": "success", "data": ..., "count": 3, "localPath": "/outputs_proxy/images/a.png" }
//! ```
//!
//! `code` is `0` on success and `-1` on failure; the other fields are present
//! only when the endpoint has something to put in them. Request bodies use
//! the camelCase names the dashboard sends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::observability::MetricsSnapshot;
use crate::storage::Category;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(
        rename = "localPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub local_path: Option<String>,
}

pub const CODE_OK: i32 = 0;
pub const CODE_ERROR: i32 = -1;

impl ApiResponse {
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            code: CODE_OK,
            msg: Some(msg.into()),
            data: None,
            count: None,
            local_path: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            code: CODE_ERROR,
            ..Self::message(msg)
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            code: CODE_OK,
            msg: None,
            data: Some(data),
            count: None,
            local_path: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlRequest {
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResultRequest {
    #[serde(default)]
    pub file_url: Option<String>,
    /// Overrides the name taken from the URL.
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdateRequest {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleryQuery {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebappQuery {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub webapp_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub metrics: MetricsSnapshot,
    /// Category → whether its output directory could be created.
    pub storage: BTreeMap<Category, bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::message("done")).unwrap();
        assert_eq!(body, json!({"code": 0, "msg": "done"}));

        let body = serde_json::to_value(ApiResponse::error("empty")).unwrap();
        assert_eq!(body, json!({"code": -1, "msg": "empty"}));
    }

    #[test]
    fn envelope_with_data_and_count() {
        let body = serde_json::to_value(ApiResponse::data(vec![1, 2]).with_count(2)).unwrap();
        assert_eq!(body, json!({"code": 0, "data": [1, 2], "count": 2}));
    }

    #[test]
    fn save_result_request_uses_camel_case() {
        let request: SaveResultRequest =
            serde_json::from_value(json!({"fileUrl": "https://cdn/x.png", "fileType": "png"}))
                .unwrap();
        assert_eq!(request.file_url.as_deref(), Some("https://cdn/x.png"));
        assert!(request.file_name.is_none());
    }
}
