//! Loan (borrow) record and aggregate types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::LifecycleState;

/// One borrow transaction, as observed from the server.
///
/// Records are created server-side (RFID scan or manual entry) and reach the
/// client only through fetch results and the change feed. `version` is the
/// server's monotonic update marker: merges are last-writer-wins by version,
/// never by arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: Uuid,
    /// The borrowed book
    pub subject_id: Uuid,
    /// The borrower
    pub holder_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    /// Set exactly once; never cleared by any merge
    pub returned_at: Option<DateTime<Utc>>,
    pub lifecycle_state: LifecycleState,
    pub version: i64,
    /// Computed server-side on return. The optimistic path never fills this
    /// in: fine amounts shown to users must come from confirmed server data.
    pub fine_due: Option<Decimal>,
    /// Denormalized display fields delivered by the fetch API
    pub subject_title: Option<String>,
    pub holder_name: Option<String>,
}

impl LoanRecord {
    pub fn is_returned(&self) -> bool {
        self.returned_at.is_some()
    }
}

/// Aggregate counts for dashboard summary tiles.
///
/// Recomputed on demand from the raw records; see [`crate::services::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanSummary {
    pub active: usize,
    pub due_soon: usize,
    pub overdue: usize,
    /// Overdue records accrue fines; the amount itself is server business
    pub fine_eligible: usize,
    /// Sum of server-confirmed fines across the scope
    pub fine_total: Decimal,
}
