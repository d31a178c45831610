//! Loan state reconciliation
//!
//! The [`Reconciler`] is the only component that writes to a [`LoanStore`].
//! It arbitrates between three inputs: optimistic local mutations, confirmed
//! command results, and refreshes (full fetches or pushed change events).
//!
//! The ordering contract per record id: an optimistic apply followed by its
//! confirm or rollback brackets any refreshes for that id. Refreshes arriving
//! inside the bracket are queued, never dropped, and the latest-by-version
//! one is applied as soon as the bracket closes. This keeps a user's in-flight
//! action from being visually reverted by the feed, without losing events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::models::{ChangeEvent, ChangeKind, LifecycleState, LoanRecord, MutationKind};
use crate::store::LoanStore;

/// An in-flight optimistic change, held from dispatch until the server
/// confirms or rejects it. Never exposed to views.
struct PendingMutation {
    kind: MutationKind,
    submitted_at: chrono::DateTime<Utc>,
    /// Exact pre-mutation record, restored verbatim on rollback
    previous: LoanRecord,
}

/// A refresh queued while its target id had a mutation in flight.
/// Only the latest by version is retained.
enum DeferredRefresh {
    Event(ChangeEvent),
    Record(LoanRecord),
}

impl DeferredRefresh {
    fn version(&self) -> i64 {
        match self {
            DeferredRefresh::Event(event) => event.version,
            DeferredRefresh::Record(record) => record.version,
        }
    }
}

struct ReconcileState {
    pending: HashMap<Uuid, PendingMutation>,
    deferred: HashMap<Uuid, DeferredRefresh>,
}

/// Merges optimistic, confirmed and pushed updates into one store.
pub struct Reconciler {
    store: Arc<LoanStore>,
    state: Mutex<ReconcileState>,
}

impl Reconciler {
    pub fn new(store: Arc<LoanStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            state: Mutex::new(ReconcileState {
                pending: HashMap::new(),
                deferred: HashMap::new(),
            }),
        })
    }

    pub fn store(&self) -> &Arc<LoanStore> {
        &self.store
    }

    /// Whether a mutation is currently in flight for this record. Views use
    /// this to keep the action disabled while pending.
    pub fn is_pending(&self, record_id: Uuid) -> bool {
        self.state
            .lock()
            .expect("reconciler lock poisoned")
            .pending
            .contains_key(&record_id)
    }

    /// Apply the local guess for a mutation and register it as pending.
    ///
    /// For a return: `returned_at = now`, `lifecycle_state = Returned`. The
    /// fine amount is deliberately left untouched; it exists only in
    /// confirmed server data. Returns the guess that was stored.
    ///
    /// At most one mutation may be pending per record: a second call fails
    /// with [`CoreError::ConflictingMutation`] and changes nothing.
    pub fn apply_optimistic(&self, record_id: Uuid, kind: MutationKind) -> CoreResult<LoanRecord> {
        let guess = {
            let mut state = self.state.lock().expect("reconciler lock poisoned");
            if state.pending.contains_key(&record_id) {
                return Err(CoreError::ConflictingMutation(record_id));
            }
            let current = self
                .store
                .record(record_id)
                .ok_or(CoreError::UnknownLoan(record_id))?;

            let mut guess = current.clone();
            match kind {
                MutationKind::Return => {
                    guess.returned_at = Some(Utc::now());
                    guess.lifecycle_state = LifecycleState::Returned;
                }
            }

            state.pending.insert(
                record_id,
                PendingMutation {
                    kind,
                    submitted_at: Utc::now(),
                    previous: current,
                },
            );
            guess
        };
        self.store.force_put(guess.clone());
        tracing::debug!(loan = %record_id, kind = ?kind, "optimistic mutation applied");
        Ok(guess)
    }

    /// Commit the authoritative server record for a resolved mutation and
    /// release any refresh deferred behind it. Idempotent: confirming twice
    /// with the same record leaves the store unchanged the second time.
    pub fn confirm(&self, record_id: Uuid, server_record: LoanRecord) {
        let deferred = {
            let mut state = self.state.lock().expect("reconciler lock poisoned");
            if state.pending.remove(&record_id).is_none() {
                tracing::debug!(loan = %record_id, "confirm without pending mutation");
            }
            state.deferred.remove(&record_id)
        };
        // Guarded path: the server version outranks the optimistic overlay,
        // and a repeated confirm must not regress a newer store state.
        self.store.upsert(server_record);
        self.apply_deferred(record_id, deferred);
    }

    /// Undo a failed mutation: restore the exact pre-optimistic snapshot,
    /// then release any refresh deferred behind the bracket. The restore
    /// deliberately ignores values pushed while the mutation was in flight;
    /// the deferred refresh (and the next fetch) re-deliver server truth.
    pub fn rollback(&self, record_id: Uuid) {
        let (pending, deferred) = {
            let mut state = self.state.lock().expect("reconciler lock poisoned");
            let Some(pending) = state.pending.remove(&record_id) else {
                tracing::warn!(loan = %record_id, "rollback without pending mutation");
                return;
            };
            let deferred = state.deferred.remove(&record_id);
            (pending, deferred)
        };
        tracing::warn!(
            loan = %record_id,
            kind = ?pending.kind,
            in_flight_ms = (Utc::now() - pending.submitted_at).num_milliseconds(),
            "rolling back optimistic mutation"
        );
        self.store.force_put(pending.previous);
        self.apply_deferred(record_id, deferred);
    }

    /// Merge one pushed change event. Deferred while its id has a mutation in
    /// flight, applied through the version guard otherwise.
    pub fn refresh_event(&self, event: ChangeEvent) {
        {
            let mut state = self.state.lock().expect("reconciler lock poisoned");
            if state.pending.contains_key(&event.record_id) {
                tracing::debug!(
                    loan = %event.record_id,
                    version = event.version,
                    "deferring push event behind pending mutation"
                );
                Self::defer(&mut state, event.record_id, DeferredRefresh::Event(event));
                return;
            }
        }
        self.apply_event(event);
    }

    /// Apply a full fetch result. Records whose id has a mutation in flight
    /// keep their optimistic overlay (the incoming record is deferred);
    /// optimistic records missing from the fetch entirely are retained rather
    /// than silently discarded mid-bracket.
    pub fn refresh_full(&self, records: Vec<LoanRecord>) {
        let final_set = {
            let mut state = self.state.lock().expect("reconciler lock poisoned");
            let mut final_set: Vec<LoanRecord> = Vec::with_capacity(records.len());
            let mut covered: Vec<Uuid> = Vec::new();
            for record in records {
                if state.pending.contains_key(&record.id) {
                    covered.push(record.id);
                    tracing::debug!(
                        loan = %record.id,
                        version = record.version,
                        "deferring fetched record behind pending mutation"
                    );
                    let id = record.id;
                    Self::defer(&mut state, id, DeferredRefresh::Record(record));
                    if let Some(current) = self.store.record(id) {
                        final_set.push(current);
                    }
                } else {
                    final_set.push(record);
                }
            }
            // Pending ids the fetch did not mention at all
            for id in state.pending.keys() {
                if !covered.contains(id) {
                    if let Some(current) = self.store.record(*id) {
                        final_set.push(current);
                    }
                }
            }
            final_set
        };
        self.store.replace_all(final_set);
    }

    fn defer(state: &mut ReconcileState, id: Uuid, incoming: DeferredRefresh) {
        match state.deferred.get(&id) {
            Some(existing) if existing.version() >= incoming.version() => {}
            _ => {
                state.deferred.insert(id, incoming);
            }
        }
    }

    fn apply_deferred(&self, record_id: Uuid, deferred: Option<DeferredRefresh>) {
        match deferred {
            Some(DeferredRefresh::Event(event)) => {
                tracing::debug!(loan = %record_id, version = event.version, "applying deferred push event");
                self.apply_event(event);
            }
            Some(DeferredRefresh::Record(record)) => {
                tracing::debug!(loan = %record_id, version = record.version, "applying deferred fetched record");
                self.store.upsert(record);
            }
            None => {}
        }
    }

    fn apply_event(&self, event: ChangeEvent) {
        match event.kind {
            ChangeKind::Insert => {
                if let Some(record) = event.record {
                    self.store.upsert(record);
                } else {
                    tracing::warn!(loan = %event.record_id, "insert event without record payload");
                }
            }
            ChangeKind::Update => {
                if let Some(stored) = self.store.record(event.record_id) {
                    let merged = event.patch.apply_to(&stored, event.version);
                    self.store.upsert(merged);
                } else if let Some(record) = event.record {
                    // First sighting of this id in this scope
                    self.store.upsert(record);
                } else {
                    tracing::debug!(loan = %event.record_id, "update event for unknown record, ignoring");
                }
            }
            ChangeKind::Delete => {
                // Records leave a store only through a full replace; a delete
                // on the feed is noted and resolved by the next fetch.
                tracing::debug!(loan = %event.record_id, "delete event ignored, awaiting refresh");
            }
        }
    }
}
