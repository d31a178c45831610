//! Query parameters for loan fetches

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;

use super::enums::{LifecycleState, LoanSortKey};

/// Filter/sort parameters sent with a loan fetch. The server returns the
/// full matching set per call; there is no pagination contract.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoanQuery {
    /// Free-text match against book title / borrower name
    pub search: Option<String>,
    /// Restrict to one lifecycle state
    pub state: Option<LifecycleState>,
    /// Borrowed-at range, inclusive
    pub borrowed_from: Option<DateTime<Utc>>,
    pub borrowed_to: Option<DateTime<Utc>>,
    pub sort: Option<LoanSortKey>,
}

impl LoanQuery {
    /// Query for currently held loans only
    pub fn active() -> Self {
        Self {
            state: Some(LifecycleState::Active),
            ..Self::default()
        }
    }
}
