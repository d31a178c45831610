//! In-memory loan state container
//!
//! One [`LoanStore`] holds the best-known set of loan records for a single
//! view scope (a holder's loans, a book's borrowers, the full log) and
//! notifies subscribers after every committed mutation. The server of record
//! lives elsewhere; the only writers are the reconciliation paths in
//! [`crate::services::reconcile`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use indexmap::IndexMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::LoanRecord;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// The view context a store instance serves. Two stores may observe the same
/// underlying server record (a student dashboard and an admin borrower list);
/// they are never synchronized with each other except through the push feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    /// Loans held by one borrower
    Holder(Uuid),
    /// Borrow history of one book
    Subject(Uuid),
    /// The library-wide borrow/return log
    Log,
}

struct StoreInner {
    records: IndexMap<Uuid, LoanRecord>,
    /// Monotonic commit counter, passed to listeners
    revision: u64,
}

struct ListenerEntry {
    id: u64,
    /// Highest revision this listener has been told about. Guards against a
    /// listener observing revisions out of order.
    last_seen: AtomicU64,
    callback: Box<dyn Fn(u64) + Send + Sync>,
}

/// Subscribable container of loan records for one scope.
pub struct LoanStore {
    scope: StoreScope,
    inner: Mutex<StoreInner>,
    listeners: Mutex<Vec<Arc<ListenerEntry>>>,
    next_listener_id: AtomicU64,
    changes: broadcast::Sender<u64>,
}

impl LoanStore {
    pub fn new(scope: StoreScope) -> Arc<Self> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Arc::new(Self {
            scope,
            inner: Mutex::new(StoreInner {
                records: IndexMap::new(),
                revision: 0,
            }),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            changes,
        })
    }

    pub fn scope(&self) -> StoreScope {
        self.scope
    }

    /// Atomic full replace, used after a fetch. The reconciler is responsible
    /// for substituting optimistic records for pending ids before calling in.
    pub fn replace_all(&self, records: Vec<LoanRecord>) {
        let revision = {
            let mut inner = self.inner.lock().expect("store lock poisoned");
            inner.records = records.into_iter().map(|r| (r.id, r)).collect();
            inner.revision += 1;
            inner.revision
        };
        self.notify(revision);
    }

    /// Insert or overwrite by id, guarded by the version marker: the incoming
    /// record is applied only when its version is >= the stored one. Returns
    /// whether it was applied. Stale events are dropped silently.
    pub fn upsert(&self, record: LoanRecord) -> bool {
        let revision = {
            let mut inner = self.inner.lock().expect("store lock poisoned");
            if let Some(existing) = inner.records.get(&record.id) {
                if record.version < existing.version {
                    tracing::debug!(
                        loan = %record.id,
                        stored_version = existing.version,
                        incoming_version = record.version,
                        "dropping stale upsert"
                    );
                    return false;
                }
            }
            inner.records.insert(record.id, record);
            inner.revision += 1;
            inner.revision
        };
        self.notify(revision);
        true
    }

    /// Unconditional overwrite, bypassing the version guard. Reserved for the
    /// reconciler's optimistic overlay and rollback restore, which must apply
    /// regardless of what the feed delivered in the meantime.
    pub(crate) fn force_put(&self, record: LoanRecord) {
        let revision = {
            let mut inner = self.inner.lock().expect("store lock poisoned");
            inner.records.insert(record.id, record);
            inner.revision += 1;
            inner.revision
        };
        self.notify(revision);
    }

    /// Current records, newest borrowed first, ties broken by id.
    pub fn get(&self) -> Vec<LoanRecord> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut records: Vec<LoanRecord> = inner.records.values().cloned().collect();
        records.sort_by(|a, b| {
            b.borrowed_at
                .cmp(&a.borrowed_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    /// Point lookup by id
    pub fn record(&self, id: Uuid) -> Option<LoanRecord> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner.records.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a listener invoked after every committed mutation with the
    /// commit revision. A listener is never invoked with a revision lower
    /// than one it has already seen. Dropping the handle unsubscribes.
    pub fn subscribe(
        self: &Arc<Self>,
        listener: impl Fn(u64) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(ListenerEntry {
            id,
            last_seen: AtomicU64::new(0),
            callback: Box::new(listener),
        });
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .push(entry);
        SubscriptionHandle {
            id,
            store: Arc::downgrade(self),
        }
    }

    /// Revision stream for async consumers (the synchronous listener contract
    /// stays the primary interface for view re-rendering).
    pub fn watch(&self) -> broadcast::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self, revision: u64) {
        let listeners: Vec<Arc<ListenerEntry>> = self
            .listeners
            .lock()
            .expect("listener lock poisoned")
            .clone();
        for entry in listeners {
            // Skip if a newer commit already reached this listener
            let prev = entry.last_seen.fetch_max(revision, Ordering::SeqCst);
            if prev < revision {
                (entry.callback)(revision);
            }
        }
        let _ = self.changes.send(revision);
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .retain(|entry| entry.id != id);
    }
}

/// Handle returned by [`LoanStore::subscribe`]; unsubscribes on drop.
pub struct SubscriptionHandle {
    id: u64,
    store: Weak<LoanStore>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}
