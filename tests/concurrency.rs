
use std::sync::Arc;

use reservation_service::coordinator::{self, WorkflowOutcome};
use reservation_service::messages::MedicineEntry;
use reservation_service::query_handlers::group_reservations;
use reservation_service::store::InventoryStore;
use test_utils::MockStore;

fn entry(name: &str, count: i32) -> MedicineEntry {
    MedicineEntry {
        name: name.to_owned(),
        count,
    }
}

#[tokio::test]
async fn twenty_concurrent_reservers_drain_the_catalog_exactly() {
    let store = Arc::new(MockStore::with_catalog(&[("x", 100)]));

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            coordinator::reserve(store.as_ref(), &format!("account-{i}"), &[entry("x", 5)]).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            WorkflowOutcome::Committed(id) => ids.push(id),
            other => panic!("expected every reserver to land, got {other:?}"),
        }
    }

    assert_eq!(ids.len(), 20);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20, "reservation ids must be distinct");
    assert_eq!(store.catalog_count("x"), Some(0));

    let reservations = group_reservations(store.all_lines().await.unwrap());
    assert_eq!(reservations.len(), 20);
}

#[tokio::test]
async fn contended_scarce_stock_admits_exactly_the_stock() {
    let store = Arc::new(MockStore::with_catalog(&[("x", 3)]));

    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            coordinator::reserve(store.as_ref(), &format!("account-{i}"), &[entry("x", 1)]).await
        }));
    }

    let mut committed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            WorkflowOutcome::Committed(_) => committed += 1,
            WorkflowOutcome::Rejected(_) => rejected += 1,
            WorkflowOutcome::Failed(msg) => panic!("unexpected fault: {msg}"),
        }
    }

    assert_eq!(committed, 3);
    assert_eq!(rejected, 7);
    assert_eq!(store.catalog_count("x"), Some(0));
    assert_eq!(store.total_reserved("x"), 3);
}

#[tokio::test]
async fn stock_is_conserved_under_concurrent_reservers() {
    let store = Arc::new(MockStore::with_catalog(&[("x", 60)]));

    let mut handles = Vec::new();
    for i in 0..12 {
        let store = store.clone();
        let amount = (i % 5) + 1;
        handles.push(tokio::spawn(async move {
            coordinator::reserve(store.as_ref(), &format!("account-{i}"), &[entry("x", amount)])
                .await
        }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            WorkflowOutcome::Failed(msg) => panic!("unexpected fault: {msg}"),
            _ => {}
        }
    }

    let on_shelf = store.catalog_count("x").unwrap();
    let reserved = store.total_reserved("x");
    assert_eq!(on_shelf + reserved, 60);
    assert!(on_shelf >= 0);
}
