use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::messages::MedicineEntry;
use crate::store::{CasOutcome, InventoryStore, ReservationLine, StoreError};

/// Attempts per catalog row before a contended CAS is given up on. Raced
/// decrements re-read and retry, so under plain contention every reserver
/// eventually lands; the limit only cuts off pathological interleavings.
const CAS_RETRY_LIMIT: usize = 64;

/// What a workflow produced. Business rejections and store faults travel as
/// data so the handler decides the envelope; nothing here crosses the HTTP
/// boundary as an error.
#[derive(Debug)]
pub enum WorkflowOutcome {
    Committed(Uuid),
    Rejected(String),
    Failed(String),
}

/// Multi-item reservation over single-row CAS.
///
/// Counts are read up front at the strongest consistency, then decremented
/// sequentially in entry order. A definitive shortfall, an exhausted race, or
/// a fault after the first applied decrement rolls the earlier ones back
/// before responding.
pub async fn reserve<S: InventoryStore + ?Sized>(
    store: &S,
    account_name: &str,
    entries: &[MedicineEntry],
) -> WorkflowOutcome {
    let names: Vec<String> = entries.iter().map(|entry| entry.name.clone()).collect();
    let counts = match store.read_counts(&names).await {
        Ok(counts) => counts,
        Err(err) => return WorkflowOutcome::Failed(err.to_string()),
    };

    // Existence pass before any write: a missing medicine aborts with the
    // catalog untouched.
    let mut current_counts = Vec::with_capacity(entries.len());
    for (entry, count) in entries.iter().zip(counts) {
        match count {
            Some(current) => current_counts.push(current),
            None => {
                return WorkflowOutcome::Rejected(format!(
                    "Medicine {} does not exist",
                    entry.name
                ))
            }
        }
    }

    let mut applied: Vec<(String, i32)> = Vec::with_capacity(entries.len());
    for (entry, mut current) in entries.iter().zip(current_counts) {
        let mut attempts = 0;
        loop {
            if entry.count > current {
                let msg = format!(
                    "Cannot reserve '{}': requested {} units while there are only {}",
                    entry.name, entry.count, current
                );
                return abort(store, &applied, msg, false).await;
            }
            match store
                .cas_set_count(&entry.name, current, current - entry.count)
                .await
            {
                Ok(CasOutcome::Applied) => {
                    applied.push((entry.name.clone(), entry.count));
                    break;
                }
                Ok(CasOutcome::NotApplied { current: observed }) => {
                    attempts += 1;
                    if attempts >= CAS_RETRY_LIMIT {
                        let msg =
                            format!("Concurrent update on '{}', reservation aborted", entry.name);
                        return abort(store, &applied, msg, false).await;
                    }
                    debug!(medicine = %entry.name, attempts, "conditional decrement lost a race, retrying");
                    current = match refreshed_count(store, &entry.name, observed).await {
                        Ok(Some(value)) => value,
                        Ok(None) => {
                            let msg = format!("Medicine {} does not exist", entry.name);
                            return abort(store, &applied, msg, false).await;
                        }
                        Err(err) => return abort(store, &applied, err.to_string(), true).await,
                    };
                }
                Err(err) => return abort(store, &applied, err.to_string(), true).await,
            }
        }
    }

    let reservation_id = Uuid::new_v4();
    for entry in entries {
        let line = ReservationLine {
            reservation_id,
            line_id: Uuid::new_v4(),
            account_name: account_name.to_owned(),
            medicine: entry.name.clone(),
            count: entry.count,
        };
        if let Err(err) = store.insert_line(&line).await {
            // Remove whatever part of the reservation landed before undoing
            // the decrements.
            if let Err(cleanup) = store.delete_reservation(reservation_id).await {
                warn!(reservation_id = %reservation_id, error = %cleanup,
                    "could not remove partial reservation");
            }
            return abort(store, &applied, err.to_string(), true).await;
        }
    }

    debug!(reservation_id = %reservation_id, account = %account_name, "reservation committed");
    WorkflowOutcome::Committed(reservation_id)
}

/// Replace the line set of an existing reservation, adjusting the catalog by
/// the per-medicine delta `new - previously_reserved`.
///
/// Medicines dropped from the reservation take part as zero-count items, so
/// their stock returns to the catalog through the same CAS pass.
pub async fn update<S: InventoryStore + ?Sized>(
    store: &S,
    reservation_id: Uuid,
    entries: &[MedicineEntry],
) -> WorkflowOutcome {
    let existing = match store.lines_by_reservation(reservation_id).await {
        Ok(lines) => lines,
        Err(err) => return WorkflowOutcome::Failed(err.to_string()),
    };
    if existing.is_empty() {
        return WorkflowOutcome::Rejected("No such reservation".to_owned());
    }
    let account_name = existing[0].account_name.clone();
    let prev: HashMap<&str, i32> = existing
        .iter()
        .map(|line| (line.medicine.as_str(), line.count))
        .collect();

    let mut work: Vec<(String, i32)> = entries
        .iter()
        .map(|entry| (entry.name.clone(), entry.count))
        .collect();
    for line in &existing {
        if !entries.iter().any(|entry| entry.name == line.medicine) {
            work.push((line.medicine.clone(), 0));
        }
    }

    let names: Vec<String> = work.iter().map(|(name, _)| name.clone()).collect();
    let counts = match store.read_counts(&names).await {
        Ok(counts) => counts,
        Err(err) => return WorkflowOutcome::Failed(err.to_string()),
    };
    let mut current_counts = Vec::with_capacity(work.len());
    for ((name, _), count) in work.iter().zip(counts) {
        match count {
            Some(current) => current_counts.push(current),
            None => return WorkflowOutcome::Rejected(format!("Medicine {name} does not exist")),
        }
    }

    let mut applied: Vec<(String, i32)> = Vec::with_capacity(work.len());
    for ((name, new_count), mut current) in work.iter().zip(current_counts) {
        let previously = prev.get(name.as_str()).copied().unwrap_or(0);
        let mut attempts = 0;
        loop {
            // Stock this reservation may claim: what is on the shelf plus
            // what it already holds.
            let limit = current + previously;
            if *new_count > limit {
                let msg = format!(
                    "Cannot reserve '{name}': requested {new_count} units while there are only {limit}"
                );
                return abort(store, &applied, msg, false).await;
            }
            match store.cas_set_count(name, current, limit - *new_count).await {
                Ok(CasOutcome::Applied) => {
                    // The decrement relative to the pre-update state; negative
                    // when the update shrinks a line and stock flows back.
                    let delta = *new_count - previously;
                    if delta != 0 {
                        applied.push((name.clone(), delta));
                    }
                    break;
                }
                Ok(CasOutcome::NotApplied { current: observed }) => {
                    attempts += 1;
                    if attempts >= CAS_RETRY_LIMIT {
                        let msg = format!("Concurrent update on '{name}', update aborted");
                        return abort(store, &applied, msg, false).await;
                    }
                    debug!(medicine = %name, attempts, "conditional adjustment lost a race, retrying");
                    current = match refreshed_count(store, name, observed).await {
                        Ok(Some(value)) => value,
                        Ok(None) => {
                            let msg = format!("Medicine {name} does not exist");
                            return abort(store, &applied, msg, false).await;
                        }
                        Err(err) => return abort(store, &applied, err.to_string(), true).await,
                    };
                }
                Err(err) => return abort(store, &applied, err.to_string(), true).await,
            }
        }
    }

    if let Err(err) = store.delete_reservation(reservation_id).await {
        return abort(store, &applied, err.to_string(), true).await;
    }
    for entry in entries {
        let line = ReservationLine {
            reservation_id,
            line_id: Uuid::new_v4(),
            account_name: account_name.clone(),
            medicine: entry.name.clone(),
            count: entry.count,
        };
        if let Err(err) = store.insert_line(&line).await {
            // Put the old line set back before undoing the stock deltas.
            let _ = store.delete_reservation(reservation_id).await;
            for old in &existing {
                if store.insert_line(old).await.is_err() {
                    warn!(reservation_id = %reservation_id,
                        "could not restore previous reservation lines");
                    break;
                }
            }
            return abort(store, &applied, err.to_string(), true).await;
        }
    }

    debug!(reservation_id = %reservation_id, "reservation updated");
    WorkflowOutcome::Committed(reservation_id)
}

/// The count to retry a contended CAS against: the value the conditional
/// response reported, or a fresh strong read when it reported none.
async fn refreshed_count<S: InventoryStore + ?Sized>(
    store: &S,
    name: &str,
    observed: Option<i32>,
) -> Result<Option<i32>, StoreError> {
    if let Some(value) = observed {
        return Ok(Some(value));
    }
    let key = [name.to_owned()];
    Ok(store.read_counts(&key).await?.into_iter().next().flatten())
}

/// Undo the applied decrements, then report the original abort reason.
/// An incomplete rollback escalates to a fault: the catalog keeps the stale
/// decrement and the operator reset is `/clean`.
async fn abort<S: InventoryStore + ?Sized>(
    store: &S,
    applied: &[(String, i32)],
    msg: String,
    failed: bool,
) -> WorkflowOutcome {
    if let Err(err) = roll_back(store, applied).await {
        warn!(error = %err, "rollback incomplete after aborted workflow");
        return WorkflowOutcome::Failed(format!("{msg}; rollback incomplete: {err}"));
    }
    if failed {
        WorkflowOutcome::Failed(msg)
    } else {
        WorkflowOutcome::Rejected(msg)
    }
}

async fn roll_back<S: InventoryStore + ?Sized>(
    store: &S,
    applied: &[(String, i32)],
) -> Result<(), StoreError> {
    for (name, delta) in applied.iter().rev() {
        restore_count(store, name, *delta).await?;
    }
    Ok(())
}

/// Re-credit `delta` units by CAS, re-reading on every miss.
async fn restore_count<S: InventoryStore + ?Sized>(
    store: &S,
    name: &str,
    delta: i32,
) -> Result<(), StoreError> {
    let key = [name.to_owned()];
    for _ in 0..CAS_RETRY_LIMIT {
        let current = store.read_counts(&key).await?.into_iter().next().flatten();
        let Some(current) = current else {
            warn!(medicine = %name, "catalog row vanished during rollback");
            return Ok(());
        };
        let restored = current + delta;
        if restored < 0 {
            // A shrinking update credited stock that another reserver has
            // already taken; the credit cannot be withdrawn any more.
            return Err(StoreError::Backend(format!(
                "cannot roll back '{name}' by {delta}: catalog holds only {current}"
            )));
        }
        match store.cas_set_count(name, current, restored).await? {
            CasOutcome::Applied => return Ok(()),
            CasOutcome::NotApplied { .. } => continue,
        }
    }
    Err(StoreError::Backend(format!(
        "rollback of '{name}' exhausted {CAS_RETRY_LIMIT} attempts"
    )))
}
