//! Reconciler merge and bracket-ordering tests

use bibliotek_client::error::CoreError;
use bibliotek_client::models::{
    ChangeEvent, ChangeKind, LifecycleState, LoanPatch, LoanRecord, MutationKind,
};
use bibliotek_client::services::Reconciler;
use bibliotek_client::store::{LoanStore, StoreScope};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

fn active_loan(version: i64) -> LoanRecord {
    LoanRecord {
        id: Uuid::new_v4(),
        subject_id: Uuid::new_v4(),
        holder_id: Uuid::new_v4(),
        borrowed_at: now() - Duration::days(7),
        due_at: now() + Duration::days(7),
        returned_at: None,
        lifecycle_state: LifecycleState::Active,
        version,
        fine_due: None,
        subject_title: Some("Dune".to_string()),
        holder_name: Some("Paul".to_string()),
    }
}

fn setup(record: &LoanRecord) -> std::sync::Arc<Reconciler> {
    let store = LoanStore::new(StoreScope::Holder(record.holder_id));
    let reconciler = Reconciler::new(store);
    reconciler.refresh_full(vec![record.clone()]);
    reconciler
}

fn update_event(id: Uuid, version: i64, patch: LoanPatch) -> ChangeEvent {
    ChangeEvent {
        record_id: id,
        kind: ChangeKind::Update,
        version,
        patch,
        record: None,
    }
}

#[test]
fn test_optimistic_return_marks_record_returned() {
    let record = active_loan(1);
    let reconciler = setup(&record);

    let guess = reconciler
        .apply_optimistic(record.id, MutationKind::Return)
        .expect("optimistic apply");
    assert_eq!(guess.lifecycle_state, LifecycleState::Returned);
    assert!(guess.returned_at.is_some());
    // The guess never invents a fine
    assert!(guess.fine_due.is_none());

    let stored = reconciler.store().record(record.id).expect("record");
    assert_eq!(stored, guess);
}

#[test]
fn test_second_optimistic_call_conflicts_and_changes_nothing() {
    let record = active_loan(1);
    let reconciler = setup(&record);

    reconciler
        .apply_optimistic(record.id, MutationKind::Return)
        .expect("first apply");
    let before = reconciler.store().record(record.id).expect("record");

    let err = reconciler
        .apply_optimistic(record.id, MutationKind::Return)
        .expect_err("second apply must fail");
    assert!(matches!(err, CoreError::ConflictingMutation(id) if id == record.id));
    assert_eq!(reconciler.store().record(record.id), Some(before));
}

#[test]
fn test_rollback_restores_pre_mutation_record_exactly() {
    let record = active_loan(4);
    let reconciler = setup(&record);

    reconciler
        .apply_optimistic(record.id, MutationKind::Return)
        .expect("optimistic apply");
    reconciler.rollback(record.id);

    let restored = reconciler.store().record(record.id).expect("record");
    assert_eq!(restored, record);
    assert_eq!(restored.lifecycle_state, LifecycleState::Active);
    assert!(restored.returned_at.is_none());
    assert!(!reconciler.is_pending(record.id));
}

#[test]
fn test_confirm_is_idempotent() {
    let record = active_loan(1);
    let reconciler = setup(&record);

    reconciler
        .apply_optimistic(record.id, MutationKind::Return)
        .expect("optimistic apply");

    let mut server = record.clone();
    server.returned_at = Some(now());
    server.lifecycle_state = LifecycleState::Returned;
    server.fine_due = Some(Decimal::new(500, 2));
    server.version = 2;

    reconciler.confirm(record.id, server.clone());
    let once = reconciler.store().get();
    reconciler.confirm(record.id, server);
    assert_eq!(reconciler.store().get(), once);
}

#[test]
fn test_push_during_pending_is_deferred_then_applied() {
    let record = active_loan(1);
    let reconciler = setup(&record);

    reconciler
        .apply_optimistic(record.id, MutationKind::Return)
        .expect("optimistic apply");

    // Gate hardware wrote an update while our return was in flight
    let patch = LoanPatch {
        holder_name: Some("Paul Atreides".to_string()),
        ..LoanPatch::default()
    };
    reconciler.refresh_event(update_event(record.id, 5, patch));

    // Not applied yet: the optimistic overlay stays visible
    let pending_view = reconciler.store().record(record.id).expect("record");
    assert_eq!(pending_view.version, 1);
    assert_eq!(pending_view.holder_name.as_deref(), Some("Paul"));

    let mut server = record.clone();
    server.returned_at = Some(now());
    server.lifecycle_state = LifecycleState::Returned;
    server.version = 3;
    reconciler.confirm(record.id, server);

    // The deferred event lands right after the bracket closes
    let settled = reconciler.store().record(record.id).expect("record");
    assert_eq!(settled.version, 5);
    assert_eq!(settled.holder_name.as_deref(), Some("Paul Atreides"));
    assert!(settled.returned_at.is_some());
}

#[test]
fn test_only_latest_deferred_refresh_survives() {
    let record = active_loan(1);
    let reconciler = setup(&record);

    reconciler
        .apply_optimistic(record.id, MutationKind::Return)
        .expect("optimistic apply");

    let older = LoanPatch {
        holder_name: Some("older".to_string()),
        ..LoanPatch::default()
    };
    let newer = LoanPatch {
        holder_name: Some("newer".to_string()),
        ..LoanPatch::default()
    };
    // Out-of-order delivery inside the bracket
    reconciler.refresh_event(update_event(record.id, 7, newer));
    reconciler.refresh_event(update_event(record.id, 6, older));

    reconciler.rollback(record.id);

    let settled = reconciler.store().record(record.id).expect("record");
    assert_eq!(settled.version, 7);
    assert_eq!(settled.holder_name.as_deref(), Some("newer"));
}

#[test]
fn test_rollback_restores_snapshot_before_deferred_refresh() {
    let record = active_loan(2);
    let reconciler = setup(&record);

    reconciler
        .apply_optimistic(record.id, MutationKind::Return)
        .expect("optimistic apply");
    let patch = LoanPatch {
        due_at: Some(now() + Duration::days(14)),
        ..LoanPatch::default()
    };
    reconciler.refresh_event(update_event(record.id, 9, patch));
    reconciler.rollback(record.id);

    let settled = reconciler.store().record(record.id).expect("record");
    // The deferred event merged onto the restored snapshot, not onto the
    // abandoned optimistic guess
    assert!(settled.returned_at.is_none());
    assert_eq!(settled.lifecycle_state, LifecycleState::Active);
    assert_eq!(settled.due_at, now() + Duration::days(14));
    assert_eq!(settled.version, 9);
}

#[test]
fn test_partial_event_merge_keeps_absent_fields() {
    let mut record = active_loan(1);
    record.fine_due = Some(Decimal::new(250, 2));
    let reconciler = setup(&record);

    let patch = LoanPatch {
        returned_at: Some(now()),
        lifecycle_state: Some(LifecycleState::Returned),
        ..LoanPatch::default()
    };
    reconciler.refresh_event(update_event(record.id, 2, patch));

    let merged = reconciler.store().record(record.id).expect("record");
    assert_eq!(merged.fine_due, Some(Decimal::new(250, 2)));
    assert_eq!(merged.subject_title.as_deref(), Some("Dune"));
    assert_eq!(merged.borrowed_at, record.borrowed_at);
    assert!(merged.returned_at.is_some());
}

#[test]
fn test_stale_event_is_dropped() {
    let record = active_loan(6);
    let reconciler = setup(&record);

    let patch = LoanPatch {
        holder_name: Some("stale".to_string()),
        ..LoanPatch::default()
    };
    reconciler.refresh_event(update_event(record.id, 4, patch));

    let stored = reconciler.store().record(record.id).expect("record");
    assert_eq!(stored.version, 6);
    assert_eq!(stored.holder_name.as_deref(), Some("Paul"));
}

#[test]
fn test_delete_event_does_not_remove_record() {
    let record = active_loan(1);
    let reconciler = setup(&record);

    reconciler.refresh_event(ChangeEvent {
        record_id: record.id,
        kind: ChangeKind::Delete,
        version: 2,
        patch: LoanPatch::default(),
        record: None,
    });
    assert!(reconciler.store().record(record.id).is_some());
}

#[test]
fn test_insert_event_adds_new_record() {
    let record = active_loan(1);
    let reconciler = setup(&record);

    let fresh = active_loan(1);
    reconciler.refresh_event(ChangeEvent {
        record_id: fresh.id,
        kind: ChangeKind::Insert,
        version: 1,
        patch: LoanPatch::default(),
        record: Some(fresh.clone()),
    });
    assert_eq!(reconciler.store().record(fresh.id), Some(fresh));
    assert_eq!(reconciler.store().len(), 2);
}

#[test]
fn test_full_refresh_keeps_optimistic_overlay_for_pending_id() {
    let record = active_loan(1);
    let reconciler = setup(&record);

    reconciler
        .apply_optimistic(record.id, MutationKind::Return)
        .expect("optimistic apply");

    // A fetch races the in-flight return and still reports the loan active
    let mut fetched = record.clone();
    fetched.version = 2;
    let other = active_loan(1);
    reconciler.refresh_full(vec![fetched, other.clone()]);

    let visible = reconciler.store().record(record.id).expect("record");
    assert_eq!(visible.lifecycle_state, LifecycleState::Returned);
    assert_eq!(reconciler.store().record(other.id), Some(other));

    // Resolving the mutation releases the deferred fetched record
    reconciler.rollback(record.id);
    let settled = reconciler.store().record(record.id).expect("record");
    assert_eq!(settled.version, 2);
    assert_eq!(settled.lifecycle_state, LifecycleState::Active);
}

#[test]
fn test_full_refresh_retains_pending_record_missing_from_fetch() {
    let record = active_loan(1);
    let reconciler = setup(&record);

    reconciler
        .apply_optimistic(record.id, MutationKind::Return)
        .expect("optimistic apply");

    let other = active_loan(1);
    reconciler.refresh_full(vec![other]);

    // The in-flight record survives the replace until its bracket closes
    assert!(reconciler.store().record(record.id).is_some());
    assert_eq!(reconciler.store().len(), 2);
}
