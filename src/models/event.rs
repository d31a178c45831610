//! Change-feed event model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

use super::enums::LifecycleState;
use super::loan::LoanRecord;

/// Change-feed event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Partial loan update carried by a change event; only changed fields are
/// present. Fields absent here are left untouched by the merge.
///
/// `borrowed_at` and `due_at` are immutable once set, so the feed never
/// patches them after creation; `due_at` still appears here because it is
/// assigned by policy slightly after some RFID-created rows first land.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanPatch {
    pub due_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub lifecycle_state: Option<LifecycleState>,
    pub fine_due: Option<Decimal>,
    pub subject_title: Option<String>,
    pub holder_name: Option<String>,
}

impl LoanPatch {
    /// Merge this patch onto a stored record, yielding the candidate for the
    /// version-guarded upsert. `returned_at`, once present on the stored
    /// record, is kept even if the patch omits it.
    pub fn apply_to(&self, stored: &LoanRecord, version: i64) -> LoanRecord {
        let mut merged = stored.clone();
        if let Some(due_at) = self.due_at {
            merged.due_at = due_at;
        }
        if let Some(returned_at) = self.returned_at {
            merged.returned_at = Some(returned_at);
        }
        if let Some(state) = self.lifecycle_state {
            merged.lifecycle_state = state;
        }
        if let Some(fine_due) = self.fine_due {
            merged.fine_due = Some(fine_due);
        }
        if let Some(ref title) = self.subject_title {
            merged.subject_title = Some(title.clone());
        }
        if let Some(ref name) = self.holder_name {
            merged.holder_name = Some(name.clone());
        }
        merged.version = version;
        merged
    }
}

/// One event delivered by the push channel for the loans table.
///
/// Delivery is at-least-once and ordered only per record id (by `version`);
/// the consumer must tolerate duplicates and out-of-order arrival.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub record_id: Uuid,
    pub kind: ChangeKind,
    pub version: i64,
    #[serde(default)]
    pub patch: LoanPatch,
    /// Full record, present on inserts
    pub record: Option<LoanRecord>,
}
