use reservation_service::messages::{
    validate_entries, MedicineEntry, ReservationEntryItem, ReservationResponse,
    ReservationsResponse, ResponseItem, ResponseType,
};
use reservation_service::query_handlers::group_reservations;
use reservation_service::store::ReservationLine;
use serde_json::json;
use uuid::Uuid;

fn line(reservation_id: Uuid, account_name: &str, medicine: &str, count: i32) -> ReservationLine {
    ReservationLine {
        reservation_id,
        line_id: Uuid::new_v4(),
        account_name: account_name.to_owned(),
        medicine: medicine.to_owned(),
        count,
    }
}

#[test]
fn grouping_keeps_first_seen_order_and_account_of_first_row() {
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let lines = vec![
        line(first, "alice", "paracetamol", 2),
        line(second, "bob", "aspirin", 1),
        line(first, "alice", "ibuprofen", 4),
    ];

    let grouped = group_reservations(lines);
    assert_eq!(grouped.len(), 2);

    assert_eq!(grouped[0].id, first.to_string());
    assert_eq!(grouped[0].account_name, "alice");
    assert_eq!(
        grouped[0].entries,
        vec![
            MedicineEntry { name: "paracetamol".to_owned(), count: 2 },
            MedicineEntry { name: "ibuprofen".to_owned(), count: 4 },
        ]
    );

    assert_eq!(grouped[1].id, second.to_string());
    assert_eq!(grouped[1].account_name, "bob");
}

#[test]
fn grouping_empty_input_yields_no_reservations() {
    assert!(group_reservations(Vec::new()).is_empty());
}

#[test]
fn response_item_serializes_with_lowercase_type() {
    let value = serde_json::to_value(ResponseItem::info("Reserved successfully: abc")).unwrap();
    assert_eq!(
        value,
        json!({"type": "info", "msg": "Reserved successfully: abc"})
    );

    let value = serde_json::to_value(ResponseItem::exception("boom")).unwrap();
    assert_eq!(value["type"], "exception");
}

#[test]
fn response_item_msg_defaults_to_dash() {
    let item: ResponseItem = serde_json::from_str(r#"{"type": "error"}"#).unwrap();
    assert_eq!(item.kind, ResponseType::Error);
    assert_eq!(item.msg, "-");
}

#[test]
fn reservation_response_flattens_the_envelope() {
    let id = Uuid::new_v4();
    let response = ReservationResponse {
        status: ResponseItem::info("-"),
        reservation: ReservationEntryItem {
            id: id.to_string(),
            account_name: "alice".to_owned(),
            entries: vec![MedicineEntry { name: "paracetamol".to_owned(), count: 4 }],
        },
    };

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["type"], "info");
    assert_eq!(value["id"], id.to_string());
    assert_eq!(value["account_name"], "alice");
    assert_eq!(value["entries"][0], json!({"name": "paracetamol", "count": 4}));
}

#[test]
fn reservations_response_nests_the_groups() {
    let response = ReservationsResponse {
        status: ResponseItem::info("-"),
        reservations: Vec::new(),
    };
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["type"], "info");
    assert_eq!(value["reservations"], json!([]));
}

#[test]
fn entry_validation_rejects_bad_requests() {
    assert!(validate_entries(&[]).is_err());

    let err = validate_entries(&[MedicineEntry { name: "a".to_owned(), count: 0 }]).unwrap_err();
    assert_eq!(err, "Count for medicine 'a' must be positive");

    let err = validate_entries(&[
        MedicineEntry { name: "a".to_owned(), count: 1 },
        MedicineEntry { name: "b".to_owned(), count: 2 },
        MedicineEntry { name: "a".to_owned(), count: 3 },
    ])
    .unwrap_err();
    assert_eq!(err, "Duplicate medicine 'a' in reservation request");

    assert!(validate_entries(&[
        MedicineEntry { name: "a".to_owned(), count: 1 },
        MedicineEntry { name: "b".to_owned(), count: 2 },
    ])
    .is_ok());
}
