use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use crate::messages::{
    MedicineEntry, MedicineResponse, ReservationEntryItem, ReservationResponse,
    ReservationsResponse, ResponseItem,
};
use crate::store::{InventoryStore, ReservationLine, StoreError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct IdParams {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct NameParams {
    pub name: String,
}

pub async fn query(State(state): State<AppState>, Query(params): Query<IdParams>) -> Response {
    let Ok(reservation_id) = Uuid::parse_str(&params.id) else {
        return Json(ResponseItem::error("Invalid UUID")).into_response();
    };
    match state.store.lines_by_reservation(reservation_id).await {
        Ok(lines) if lines.is_empty() => {
            Json(ResponseItem::error("No such reservation")).into_response()
        }
        Ok(lines) => {
            let mut groups = group_reservations(lines);
            let reservation = groups.swap_remove(0);
            Json(ReservationResponse {
                status: ok(),
                reservation,
            })
            .into_response()
        }
        Err(err) => exception(err).into_response(),
    }
}

pub async fn query_account(
    State(state): State<AppState>,
    Query(params): Query<NameParams>,
) -> Response {
    match state.store.lines_by_account(&params.name).await {
        Ok(lines) if lines.is_empty() => {
            Json(ResponseItem::error("No reservations found")).into_response()
        }
        Ok(lines) => Json(ReservationsResponse {
            status: ok(),
            reservations: group_reservations(lines),
        })
        .into_response(),
        Err(err) => exception(err).into_response(),
    }
}

pub async fn query_all(State(state): State<AppState>) -> Response {
    match state.store.all_lines().await {
        Ok(lines) => Json(ReservationsResponse {
            status: ok(),
            reservations: group_reservations(lines),
        })
        .into_response(),
        Err(err) => exception(err).into_response(),
    }
}

pub async fn medicine(
    State(state): State<AppState>,
    Query(params): Query<NameParams>,
) -> Json<MedicineResponse> {
    match state.store.fetch_medicine(&params.name).await {
        Ok(Some(row)) => Json(MedicineResponse {
            status: ok(),
            medicine: row,
        }),
        Ok(None) => Json(MedicineResponse {
            status: ok(),
            medicine: Value::Null,
        }),
        Err(err) => {
            error!(error = %err, medicine = %params.name, "catalog lookup failed");
            Json(MedicineResponse {
                status: ResponseItem::exception(err.to_string()),
                medicine: Value::Null,
            })
        }
    }
}

/// Collapse line rows into one item per `reservation_id`, keeping the
/// store-returned order of first appearance. All lines of a reservation share
/// one account, so the first row names it.
pub fn group_reservations(lines: Vec<ReservationLine>) -> Vec<ReservationEntryItem> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut groups: HashMap<Uuid, ReservationEntryItem> = HashMap::new();
    for line in lines {
        let item = groups.entry(line.reservation_id).or_insert_with(|| {
            order.push(line.reservation_id);
            ReservationEntryItem {
                id: line.reservation_id.to_string(),
                account_name: line.account_name.clone(),
                entries: Vec::new(),
            }
        });
        item.entries.push(MedicineEntry {
            name: line.medicine,
            count: line.count,
        });
    }
    order
        .into_iter()
        .filter_map(|id| groups.remove(&id))
        .collect()
}

fn ok() -> ResponseItem {
    ResponseItem::info("-")
}

fn exception(err: StoreError) -> Json<ResponseItem> {
    error!(error = %err, "query against the store failed");
    Json(ResponseItem::exception(err.to_string()))
}
