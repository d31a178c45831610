//! LoanSession orchestration tests, with the HTTP boundary mocked out

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bibliotek_client::client::{Command, CommandClient, CommandOutcome, LoanFetcher};
use bibliotek_client::config::ClientConfig;
use bibliotek_client::error::{CoreError, CoreResult};
use bibliotek_client::models::{
    Audience, ChangeRequest, LifecycleState, LoanQuery, LoanRecord, Notice, NoticeRecord,
};
use bibliotek_client::services::session::{LoanSession, ViewBinding};
use bibliotek_client::store::StoreScope;
use chrono::{Duration, TimeZone, Utc};
use mockall::{mock, Sequence};
use rust_decimal::Decimal;
use uuid::Uuid;

mock! {
    pub Commands {}

    #[async_trait]
    impl CommandClient for Commands {
        async fn execute(&self, command: Command) -> CoreResult<CommandOutcome>;
    }
}

mock! {
    pub Fetcher {}

    #[async_trait]
    impl LoanFetcher for Fetcher {
        async fn loans(&self, scope: &StoreScope, query: &LoanQuery) -> CoreResult<Vec<LoanRecord>>;
        async fn requests(&self) -> CoreResult<Vec<ChangeRequest>>;
        async fn notices(&self) -> CoreResult<Vec<NoticeRecord>>;
    }
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

fn active_loan() -> LoanRecord {
    LoanRecord {
        id: Uuid::new_v4(),
        subject_id: Uuid::new_v4(),
        holder_id: Uuid::new_v4(),
        borrowed_at: now() - Duration::days(7),
        due_at: now() + Duration::days(7),
        returned_at: None,
        lifecycle_state: LifecycleState::Active,
        version: 1,
        fine_due: None,
        subject_title: Some("Foundation".to_string()),
        holder_name: None,
    }
}

fn returned_by_server(record: &LoanRecord) -> LoanRecord {
    let mut server = record.clone();
    server.returned_at = Some(now());
    server.lifecycle_state = LifecycleState::Returned;
    server.fine_due = Some(Decimal::new(1200, 2));
    server.version = record.version + 1;
    server
}

fn session_with(commands: MockCommands, record: &LoanRecord) -> LoanSession {
    let session = LoanSession::new(
        StoreScope::Holder(record.holder_id),
        Arc::new(commands),
        Arc::new(MockFetcher::new()),
        &ClientConfig::default(),
    );
    session.reconciler().refresh_full(vec![record.clone()]);
    session
}

#[tokio::test]
async fn test_return_loan_confirms_server_record() {
    let record = active_loan();
    let server = returned_by_server(&record);

    let mut commands = MockCommands::new();
    let response = server.clone();
    commands
        .expect_execute()
        .times(1)
        .returning(move |_| Ok(CommandOutcome::Loan(response.clone())));

    let session = session_with(commands, &record);
    let returned = session.return_loan(record.id).await.expect("return");

    assert_eq!(returned, server);
    assert_eq!(session.store().record(record.id), Some(server));
    assert!(!session.reconciler().is_pending(record.id));
}

#[tokio::test]
async fn test_conflict_rolls_back_without_retry() {
    let record = active_loan();

    let mut commands = MockCommands::new();
    commands
        .expect_execute()
        .times(1)
        .returning(|_| Err(CoreError::Conflict("already returned elsewhere".to_string())));

    let session = session_with(commands, &record);
    let err = session.return_loan(record.id).await.expect_err("must fail");

    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(session.store().record(record.id), Some(record));
}

#[tokio::test]
async fn test_transient_failure_is_retried_once() {
    let record = active_loan();
    let server = returned_by_server(&record);

    let mut seq = Sequence::new();
    let mut commands = MockCommands::new();
    commands
        .expect_execute()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(CoreError::Transient("connection reset".to_string())));
    let response = server.clone();
    commands
        .expect_execute()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(CommandOutcome::Loan(response.clone())));

    let session = session_with(commands, &record);
    let returned = session.return_loan(record.id).await.expect("return");
    assert_eq!(returned, server);
}

#[tokio::test]
async fn test_validation_failure_is_not_retried() {
    let record = active_loan();

    let mut commands = MockCommands::new();
    commands
        .expect_execute()
        .times(1)
        .returning(|_| Err(CoreError::Validation("loan is not active".to_string())));

    let session = session_with(commands, &record);
    let err = session.return_loan(record.id).await.expect_err("must fail");

    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(session.store().record(record.id), Some(record));
}

/// Command client that never answers within the timeout window.
struct StalledCommands {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CommandClient for StalledCommands {
    async fn execute(&self, _command: Command) -> CoreResult<CommandOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Err(CoreError::Transient("unreachable".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_transient_and_rolls_back() {
    let record = active_loan();
    let calls = Arc::new(AtomicUsize::new(0));

    let session = LoanSession::new(
        StoreScope::Holder(record.holder_id),
        Arc::new(StalledCommands {
            calls: calls.clone(),
        }),
        Arc::new(MockFetcher::new()),
        &ClientConfig::default(),
    );
    session.reconciler().refresh_full(vec![record.clone()]);

    let err = session.return_loan(record.id).await.expect_err("must fail");
    assert!(err.is_transient());
    // One original attempt plus exactly one retry
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.store().record(record.id), Some(record));
}

#[tokio::test]
async fn test_detached_view_suppresses_callback_but_store_converges() {
    let record = active_loan();
    let server = returned_by_server(&record);

    let mut commands = MockCommands::new();
    let response = server.clone();
    commands
        .expect_execute()
        .times(1)
        .returning(move |_| Ok(CommandOutcome::Loan(response.clone())));

    let session = session_with(commands, &record);
    let binding = ViewBinding::new();
    binding.detach();

    let callback_fired = Arc::new(AtomicBool::new(false));
    let fired = callback_fired.clone();
    session
        .return_loan_bound(record.id, &binding, move |_| {
            fired.store(true, Ordering::SeqCst);
        })
        .await;

    assert!(!callback_fired.load(Ordering::SeqCst));
    assert_eq!(session.store().record(record.id), Some(server));
}

#[tokio::test]
async fn test_attached_view_receives_callback() {
    let record = active_loan();
    let server = returned_by_server(&record);

    let mut commands = MockCommands::new();
    let response = server.clone();
    commands
        .expect_execute()
        .times(1)
        .returning(move |_| Ok(CommandOutcome::Loan(response.clone())));

    let session = session_with(commands, &record);
    let binding = ViewBinding::new();

    let callback_fired = Arc::new(AtomicBool::new(false));
    let fired = callback_fired.clone();
    session
        .return_loan_bound(record.id, &binding, move |result| {
            assert!(result.is_ok());
            fired.store(true, Ordering::SeqCst);
        })
        .await;

    assert!(callback_fired.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_invalid_notice_is_rejected_before_any_network_call() {
    let record = active_loan();
    // No expectations: any execute call panics the mock
    let session = session_with(MockCommands::new(), &record);

    let err = session
        .broadcast(Notice {
            title: String::new(),
            body: "Library closes early on Friday".to_string(),
            audience: Audience::All,
        })
        .await
        .expect_err("must fail validation");
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_refresh_pulls_fetched_records_into_store() {
    let record = active_loan();

    let mut fetcher = MockFetcher::new();
    let fetched = record.clone();
    fetcher
        .expect_loans()
        .times(1)
        .returning(move |_, _| Ok(vec![fetched.clone()]));

    let session = LoanSession::new(
        StoreScope::Holder(record.holder_id),
        Arc::new(MockCommands::new()),
        Arc::new(fetcher),
        &ClientConfig::default(),
    );
    session.refresh(&LoanQuery::active()).await.expect("refresh");
    assert_eq!(session.store().record(record.id), Some(record));
}

#[tokio::test]
async fn test_summary_reflects_store_contents() {
    let mut due_soon = active_loan();
    due_soon.due_at = now() + Duration::days(2);
    let mut overdue = active_loan();
    overdue.due_at = now() - Duration::days(1);
    overdue.fine_due = Some(Decimal::new(300, 2));

    let session = LoanSession::new(
        StoreScope::Holder(due_soon.holder_id),
        Arc::new(MockCommands::new()),
        Arc::new(MockFetcher::new()),
        &ClientConfig::default(),
    );
    session
        .reconciler()
        .refresh_full(vec![due_soon, overdue]);

    let summary = session.summary(now());
    assert_eq!(summary.due_soon, 1);
    assert_eq!(summary.overdue, 1);
    assert_eq!(summary.fine_eligible, 1);
    assert_eq!(summary.fine_total, Decimal::new(300, 2));
}
