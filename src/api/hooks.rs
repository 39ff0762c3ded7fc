//! Webhook receiver.

use axum::{
    extract::{rejection::JsonRejection, Path},
    Json,
};
use serde_json::{Map, Value};

use super::{success, ApiResult};

/// POST /hooks/{hook} - Log an incoming record and echo it back.
pub async fn receive_hook(
    Path(hook): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Map<String, Value>> {
    let Json(record) = payload?;
    let logged = serde_json::Value::Object(record.clone());
    tracing::info!(hook = %hook, record = %logged, "hook received");

    success(record)
}
