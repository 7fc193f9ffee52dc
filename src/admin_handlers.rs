use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use crate::messages::{DictResponse, ResponseItem};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DirectParams {
    pub query: String,
}

/// Drop and re-create the working keyspace. Operator reset for stale
/// decrements left by an incomplete rollback.
pub async fn clean(State(state): State<AppState>) -> Json<ResponseItem> {
    match state.store.clean().await {
        Ok(()) => Json(ResponseItem::info("Cleaned the database")),
        Err(err) => {
            error!(error = %err, "keyspace reset failed");
            Json(ResponseItem::exception(err.to_string()))
        }
    }
}

/// Execute a raw statement. Admin/debug only.
pub async fn direct(
    State(state): State<AppState>,
    Query(params): Query<DirectParams>,
) -> Json<DictResponse> {
    match state.store.raw_query(&params.query).await {
        Ok(content) => Json(DictResponse {
            status: ResponseItem::info("-"),
            content,
        }),
        Err(err) => {
            error!(error = %err, query = %params.query, "direct query failed");
            Json(DictResponse {
                status: ResponseItem::exception(err.to_string()),
                content: Value::Null,
            })
        }
    }
}
