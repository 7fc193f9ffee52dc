use axum::extract::State;
use axum::Json;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::coordinator::{self, WorkflowOutcome};
use crate::messages::{validate_entries, ReserveRequest, ResponseItem, UpdateRequest};
use crate::metrics::WORKFLOW_OUTCOMES;
use crate::AppState;

pub async fn reserve(
    State(state): State<AppState>,
    Json(payload): Json<ReserveRequest>,
) -> Json<ResponseItem> {
    if let Err(msg) = validate_entries(&payload.entries) {
        debug!(account = %payload.account_name, %msg, "rejected reserve request");
        WORKFLOW_OUTCOMES
            .with_label_values(&["reserve", "rejected"])
            .inc();
        return Json(ResponseItem::error(msg));
    }

    let store = state.store.clone();
    // The workflow runs on its own task: a dropped connection must not cancel
    // it between a catalog decrement and the line inserts.
    let outcome = tokio::spawn(async move {
        coordinator::reserve(store.as_ref(), &payload.account_name, &payload.entries).await
    })
    .await
    .unwrap_or_else(|err| WorkflowOutcome::Failed(format!("reserve task aborted: {err}")));

    Json(respond("reserve", outcome, |id| {
        format!("Reserved successfully: {id}")
    }))
}

pub async fn update(
    State(state): State<AppState>,
    Json(payload): Json<UpdateRequest>,
) -> Json<ResponseItem> {
    let Ok(reservation_id) = Uuid::parse_str(&payload.id) else {
        debug!(id = %payload.id, "rejected update request");
        WORKFLOW_OUTCOMES
            .with_label_values(&["update", "rejected"])
            .inc();
        return Json(ResponseItem::error("Invalid UUID"));
    };
    if let Err(msg) = validate_entries(&payload.entries) {
        debug!(reservation_id = %reservation_id, %msg, "rejected update request");
        WORKFLOW_OUTCOMES
            .with_label_values(&["update", "rejected"])
            .inc();
        return Json(ResponseItem::error(msg));
    }

    let store = state.store.clone();
    let outcome = tokio::spawn(async move {
        coordinator::update(store.as_ref(), reservation_id, &payload.entries).await
    })
    .await
    .unwrap_or_else(|err| WorkflowOutcome::Failed(format!("update task aborted: {err}")));

    Json(respond("update", outcome, |id| {
        format!("Updated reservation successfully: {id}")
    }))
}

fn respond(
    workflow: &'static str,
    outcome: WorkflowOutcome,
    success_msg: impl Fn(Uuid) -> String,
) -> ResponseItem {
    match outcome {
        WorkflowOutcome::Committed(id) => {
            info!(workflow, reservation_id = %id, "workflow committed");
            WORKFLOW_OUTCOMES
                .with_label_values(&[workflow, "committed"])
                .inc();
            ResponseItem::info(success_msg(id))
        }
        WorkflowOutcome::Rejected(msg) => {
            debug!(workflow, %msg, "workflow rejected");
            WORKFLOW_OUTCOMES
                .with_label_values(&[workflow, "rejected"])
                .inc();
            ResponseItem::error(msg)
        }
        WorkflowOutcome::Failed(msg) => {
            error!(workflow, %msg, "workflow failed");
            WORKFLOW_OUTCOMES
                .with_label_values(&[workflow, "failed"])
                .inc();
            ResponseItem::exception(msg)
        }
    }
}
