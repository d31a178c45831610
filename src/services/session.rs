//! Per-scope session: the operations borrow-related views call
//!
//! A [`LoanSession`] wires one store scope to the reconciler and the HTTP
//! boundary. Pages share a session per scope; a student dashboard and an
//! admin borrower list for the same student are distinct sessions with
//! distinct stores, converging only through the push feed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;
use validator::Validate;

use crate::client::{Command, CommandClient, CommandOutcome, LoanFetcher};
use crate::config::ClientConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    CatalogItem, CatalogItemInput, CatalogItemUpdate, ChangeRequest, DerivedStatus, LoanQuery,
    LoanRecord, LoanSummary, MutationKind, Notice, NoticeReceipt,
};
use crate::services::push::{PushChannel, PushEventBridge};
use crate::services::reconcile::Reconciler;
use crate::services::status;
use crate::store::{LoanStore, StoreScope};

/// Ties an async completion to a mounted view. When the view unmounts it
/// detaches the binding; the reconciliation still completes against the
/// shared store, but UI callbacks tied to the view are suppressed.
#[derive(Clone, Default)]
pub struct ViewBinding {
    detached: Arc<AtomicBool>,
}

impl ViewBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        !self.detached.load(Ordering::SeqCst)
    }
}

/// One view scope's loan state and the operations over it.
pub struct LoanSession {
    store: Arc<LoanStore>,
    reconciler: Arc<Reconciler>,
    commands: Arc<dyn CommandClient>,
    fetcher: Arc<dyn LoanFetcher>,
    horizon: chrono::Duration,
    command_timeout: Duration,
    push_debounce: Duration,
}

impl LoanSession {
    pub fn new(
        scope: StoreScope,
        commands: Arc<dyn CommandClient>,
        fetcher: Arc<dyn LoanFetcher>,
        config: &ClientConfig,
    ) -> Self {
        let store = LoanStore::new(scope);
        let reconciler = Reconciler::new(store.clone());
        Self {
            store,
            reconciler,
            commands,
            fetcher,
            horizon: config.policy.horizon(),
            command_timeout: Duration::from_secs(config.api.timeout_secs),
            push_debounce: Duration::from_millis(config.push.debounce_ms),
        }
    }

    pub fn store(&self) -> &Arc<LoanStore> {
        &self.store
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Subscribe this session's reconciler to the change feed for a table.
    /// Dropping the returned bridge unsubscribes.
    pub async fn attach_push(
        &self,
        channel: &dyn PushChannel,
        table: &str,
    ) -> CoreResult<PushEventBridge> {
        PushEventBridge::spawn(channel, table, self.reconciler.clone(), self.push_debounce).await
    }

    /// Fetch the scope's records and reconcile them in as the new full set.
    pub async fn refresh(&self, query: &LoanQuery) -> CoreResult<()> {
        let records = self.fetcher.loans(&self.store.scope(), query).await?;
        self.reconciler.refresh_full(records);
        Ok(())
    }

    /// Mark a book returned: optimistic apply, bounded command execution,
    /// confirm on success, rollback on any failure.
    ///
    /// The record shown between apply and confirm is a local guess; anything
    /// derived from server-side return processing (fines above all) is only
    /// present after the confirm lands.
    pub async fn return_loan(&self, loan_id: Uuid) -> CoreResult<LoanRecord> {
        self.reconciler
            .apply_optimistic(loan_id, MutationKind::Return)?;

        match self
            .execute_with_retry(Command::ReturnLoan { loan_id })
            .await
        {
            Ok(CommandOutcome::Loan(record)) => {
                self.reconciler.confirm(loan_id, record.clone());
                Ok(record)
            }
            Ok(outcome) => {
                self.reconciler.rollback(loan_id);
                Err(CoreError::Internal(format!(
                    "unexpected outcome for return command: {:?}",
                    outcome
                )))
            }
            Err(err) => {
                tracing::warn!(loan = %loan_id, error = %err, "return command failed");
                self.reconciler.rollback(loan_id);
                Err(err)
            }
        }
    }

    /// [`Self::return_loan`], with the result callback bound to a view. The
    /// store converges either way; `on_done` runs only while the view is
    /// still attached.
    pub async fn return_loan_bound<F>(&self, loan_id: Uuid, binding: &ViewBinding, on_done: F)
    where
        F: FnOnce(&CoreResult<LoanRecord>),
    {
        let result = self.return_loan(loan_id).await;
        if binding.is_attached() {
            on_done(&result);
        } else {
            tracing::debug!(loan = %loan_id, "view detached, suppressing result callback");
        }
    }

    /// Dashboard summary tiles, recomputed from the raw records on each call
    pub fn summary(&self, now: DateTime<Utc>) -> LoanSummary {
        status::aggregate(&self.store.get(), now, self.horizon)
    }

    /// Live loans with their display status, soonest due first
    pub fn active_loans(&self, now: DateTime<Utc>) -> Vec<(LoanRecord, DerivedStatus)> {
        let ordering = status::sort_for_display(&self.store.get());
        ordering
            .active
            .into_iter()
            .filter_map(|record| {
                status::classify(&record, now, self.horizon).map(|derived| (record, derived))
            })
            .collect()
    }

    /// Returned loans, newest borrowed first
    pub fn history(&self) -> Vec<LoanRecord> {
        status::sort_for_display(&self.store.get()).history
    }

    /// Approve or reject a pending change request
    pub async fn process_request(
        &self,
        request_id: Uuid,
        approve: bool,
    ) -> CoreResult<ChangeRequest> {
        match self
            .execute_with_retry(Command::ProcessRequest {
                request_id,
                approve,
            })
            .await?
        {
            CommandOutcome::Request(request) => Ok(request),
            outcome => Err(CoreError::Internal(format!(
                "unexpected outcome for process command: {:?}",
                outcome
            ))),
        }
    }

    /// Broadcast an announcement. The payload is validated before any
    /// network call; a rejected notice surfaces as `Validation` directly.
    pub async fn broadcast(&self, notice: Notice) -> CoreResult<NoticeReceipt> {
        notice.validate()?;
        match self
            .execute_with_retry(Command::BroadcastNotice(notice))
            .await?
        {
            CommandOutcome::Notice(receipt) => Ok(receipt),
            outcome => Err(CoreError::Internal(format!(
                "unexpected outcome for broadcast command: {:?}",
                outcome
            ))),
        }
    }

    /// Add a catalog item
    pub async fn create_catalog_item(&self, input: CatalogItemInput) -> CoreResult<CatalogItem> {
        input.validate()?;
        match self
            .execute_with_retry(Command::CreateCatalogItem(input))
            .await?
        {
            CommandOutcome::CatalogItem(item) => Ok(item),
            outcome => Err(CoreError::Internal(format!(
                "unexpected outcome for create command: {:?}",
                outcome
            ))),
        }
    }

    /// Update a catalog item
    pub async fn update_catalog_item(
        &self,
        item_id: Uuid,
        changes: CatalogItemUpdate,
    ) -> CoreResult<CatalogItem> {
        match self
            .execute_with_retry(Command::UpdateCatalogItem { item_id, changes })
            .await?
        {
            CommandOutcome::CatalogItem(item) => Ok(item),
            outcome => Err(CoreError::Internal(format!(
                "unexpected outcome for update command: {:?}",
                outcome
            ))),
        }
    }

    /// Delete a catalog item
    pub async fn delete_catalog_item(&self, item_id: Uuid) -> CoreResult<()> {
        self.execute_with_retry(Command::DeleteCatalogItem { item_id })
            .await?;
        Ok(())
    }

    /// Run a command bounded by the configured timeout, retrying exactly once
    /// on a transient failure. Validation and conflict failures are never
    /// retried.
    async fn execute_with_retry(&self, command: Command) -> CoreResult<CommandOutcome> {
        match self.execute_bounded(command.clone()).await {
            Err(err) if err.is_transient() => {
                let jitter = rand::thread_rng().gen_range(25..=75);
                tracing::warn!(error = %err, retry_in_ms = jitter, "transient command failure, retrying once");
                tokio::time::sleep(Duration::from_millis(jitter)).await;
                self.execute_bounded(command).await
            }
            other => other,
        }
    }

    /// A command that outlives the timeout window is treated as transient so
    /// the optimistic state cannot stay stuck indefinitely.
    async fn execute_bounded(&self, command: Command) -> CoreResult<CommandOutcome> {
        match tokio::time::timeout(self.command_timeout, self.commands.execute(command)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Transient("command timed out".to_string())),
        }
    }
}
