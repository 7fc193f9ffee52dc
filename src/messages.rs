use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicineEntry {
    pub name: String,
    pub count: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub account_name: String,
    pub entries: Vec<MedicineEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub id: String,
    pub entries: Vec<MedicineEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Info,
    Error,
    Exception,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseItem {
    #[serde(rename = "type")]
    pub kind: ResponseType,
    #[serde(default = "default_msg")]
    pub msg: String,
}

fn default_msg() -> String {
    "-".to_owned()
}

impl ResponseItem {
    pub fn info(msg: impl Into<String>) -> Self {
        Self { kind: ResponseType::Info, msg: msg.into() }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self { kind: ResponseType::Error, msg: msg.into() }
    }

    pub fn exception(msg: impl Into<String>) -> Self {
        Self { kind: ResponseType::Exception, msg: msg.into() }
    }
}

/// One reservation as seen by the query routes: all lines sharing a
/// `reservation_id`, collapsed to `(name, count)` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationEntryItem {
    pub id: String,
    pub account_name: String,
    pub entries: Vec<MedicineEntry>,
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    #[serde(flatten)]
    pub status: ResponseItem,
    #[serde(flatten)]
    pub reservation: ReservationEntryItem,
}

#[derive(Debug, Serialize)]
pub struct ReservationsResponse {
    #[serde(flatten)]
    pub status: ResponseItem,
    pub reservations: Vec<ReservationEntryItem>,
}

#[derive(Debug, Serialize)]
pub struct MedicineResponse {
    #[serde(flatten)]
    pub status: ResponseItem,
    pub medicine: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct DictResponse {
    #[serde(flatten)]
    pub status: ResponseItem,
    pub content: serde_json::Value,
}

/// Decode-time validation shared by `/reserve` and `/update`.
///
/// Duplicate names are rejected here because two CAS updates on the same
/// catalog row from within one workflow would serialise incorrectly.
pub fn validate_entries(entries: &[MedicineEntry]) -> Result<(), String> {
    if entries.is_empty() {
        return Err("Reservation must include at least one medicine".to_owned());
    }
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.count <= 0 {
            return Err(format!(
                "Count for medicine '{}' must be positive",
                entry.name
            ));
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(format!(
                "Duplicate medicine '{}' in reservation request",
                entry.name
            ));
        }
    }
    Ok(())
}
