//! Fetch client: read-only queries against the remote API

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::{ChangeRequest, LoanQuery, LoanRecord, NoticeRecord};
use crate::store::StoreScope;

use super::auth::TokenStore;
use super::{error_from_response, error_from_transport};

/// Read side of the API boundary. Each call returns the full matching set;
/// there is no pagination contract.
#[async_trait]
pub trait LoanFetcher: Send + Sync {
    /// Loan records for a store scope, filtered/sorted by the query
    async fn loans(&self, scope: &StoreScope, query: &LoanQuery) -> CoreResult<Vec<LoanRecord>>;
    /// Pending change requests (admin review queue)
    async fn requests(&self) -> CoreResult<Vec<ChangeRequest>>;
    /// Recently sent notices
    async fn notices(&self) -> CoreResult<Vec<NoticeRecord>>;
}

#[derive(Deserialize)]
struct LoansEnvelope {
    loans: Vec<LoanRecord>,
}

#[derive(Deserialize)]
struct RequestsEnvelope {
    requests: Vec<ChangeRequest>,
}

#[derive(Deserialize)]
struct NoticesEnvelope {
    notices: Vec<NoticeRecord>,
}

/// reqwest-backed fetcher
pub struct HttpLoanFetcher {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenStore>,
}

impl HttpLoanFetcher {
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

    fn scope_path(scope: &StoreScope) -> String {
        match scope {
            StoreScope::Holder(holder_id) => format!("/holders/{}/loans", holder_id),
            StoreScope::Subject(subject_id) => format!("/subjects/{}/loans", subject_id),
            StoreScope::Log => "/loans/log".to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&LoanQuery>,
    ) -> CoreResult<T> {
        let mut builder = self
            .http
            .request(Method::GET, format!("{}{}", self.base_url, path));
        if let Some(token) = self.tokens.current() {
            builder = builder.bearer_auth(token);
        }
        if let Some(query) = query {
            builder = builder.query(query);
        }
        let response = builder.send().await.map_err(error_from_transport)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response.json::<T>().await.map_err(error_from_transport)
    }
}

#[async_trait]
impl LoanFetcher for HttpLoanFetcher {
    async fn loans(&self, scope: &StoreScope, query: &LoanQuery) -> CoreResult<Vec<LoanRecord>> {
        let envelope: LoansEnvelope = self
            .get_json(&Self::scope_path(scope), Some(query))
            .await?;
        Ok(envelope.loans)
    }

    async fn requests(&self) -> CoreResult<Vec<ChangeRequest>> {
        let envelope: RequestsEnvelope = self.get_json("/requests", None).await?;
        Ok(envelope.requests)
    }

    async fn notices(&self) -> CoreResult<Vec<NoticeRecord>> {
        let envelope: NoticesEnvelope = self.get_json("/notices", None).await?;
        Ok(envelope.notices)
    }
}
