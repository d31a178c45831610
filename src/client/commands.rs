//! Command client: mutating operations against the remote API

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    CatalogItem, CatalogItemInput, CatalogItemUpdate, ChangeRequest, LoanRecord, Notice,
    NoticeReceipt,
};

use super::auth::TokenStore;
use super::{error_from_response, error_from_transport};

/// A mutating operation a view can dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Mark a borrowed book returned
    ReturnLoan { loan_id: Uuid },
    /// Approve or reject a pending change request
    ProcessRequest { request_id: Uuid, approve: bool },
    /// Send an announcement to the selected audience
    BroadcastNotice(Notice),
    CreateCatalogItem(CatalogItemInput),
    UpdateCatalogItem {
        item_id: Uuid,
        changes: CatalogItemUpdate,
    },
    DeleteCatalogItem { item_id: Uuid },
}

/// The updated record a successful command returns.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Loan(LoanRecord),
    Request(ChangeRequest),
    Notice(NoticeReceipt),
    CatalogItem(CatalogItem),
    Deleted,
}

/// Executes commands against the remote API.
///
/// Errors are classified for the caller: `Unauthorized` triggers re-auth,
/// `Conflict` triggers rollback, `Transient` may be retried once,
/// `Validation` surfaces as a user-facing message and is never retried.
#[async_trait]
pub trait CommandClient: Send + Sync {
    async fn execute(&self, command: Command) -> CoreResult<CommandOutcome>;
}

#[derive(Serialize)]
struct ProcessRequestBody {
    action: &'static str,
}

/// reqwest-backed command client
pub struct HttpCommandClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenStore>,
}

impl HttpCommandClient {
    pub fn new(config: &ApiConfig, tokens: Arc<TokenStore>) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = self.tokens.current() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> CoreResult<T> {
        let response = builder.send().await.map_err(error_from_transport)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response.json::<T>().await.map_err(error_from_transport)
    }

    async fn send_empty(&self, builder: reqwest::RequestBuilder) -> CoreResult<()> {
        let response = builder.send().await.map_err(error_from_transport)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl CommandClient for HttpCommandClient {
    async fn execute(&self, command: Command) -> CoreResult<CommandOutcome> {
        match command {
            Command::ReturnLoan { loan_id } => {
                let record: LoanRecord = self
                    .send_json(self.request(Method::POST, &format!("/loans/{}/return", loan_id)))
                    .await?;
                Ok(CommandOutcome::Loan(record))
            }
            Command::ProcessRequest { request_id, approve } => {
                let body = ProcessRequestBody {
                    action: if approve { "approve" } else { "reject" },
                };
                let request: ChangeRequest = self
                    .send_json(
                        self.request(Method::POST, &format!("/requests/{}/process", request_id))
                            .json(&body),
                    )
                    .await?;
                Ok(CommandOutcome::Request(request))
            }
            Command::BroadcastNotice(notice) => {
                let receipt: NoticeReceipt = self
                    .send_json(self.request(Method::POST, "/notices").json(&notice))
                    .await?;
                Ok(CommandOutcome::Notice(receipt))
            }
            Command::CreateCatalogItem(input) => {
                let item: CatalogItem = self
                    .send_json(self.request(Method::POST, "/items").json(&input))
                    .await?;
                Ok(CommandOutcome::CatalogItem(item))
            }
            Command::UpdateCatalogItem { item_id, changes } => {
                let item: CatalogItem = self
                    .send_json(
                        self.request(Method::PUT, &format!("/items/{}", item_id))
                            .json(&changes),
                    )
                    .await?;
                Ok(CommandOutcome::CatalogItem(item))
            }
            Command::DeleteCatalogItem { item_id } => {
                self.send_empty(self.request(Method::DELETE, &format!("/items/{}", item_id)))
                    .await?;
                Ok(CommandOutcome::Deleted)
            }
        }
    }
}
