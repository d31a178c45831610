//! Derived loan status engine
//!
//! Pure classification over loan records and "now". Nothing here is cached:
//! the clock advances without any store event, so every view query recomputes
//! from the raw records.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::models::{DerivedStatus, LoanRecord, LoanSummary};

/// Classify one loan against the current time.
///
/// Returned loans carry no live status and are excluded from active-loan
/// views; `None` signals that. For live loans: past due is overdue, within
/// the horizon is due-soon, otherwise active.
pub fn classify(record: &LoanRecord, now: DateTime<Utc>, horizon: Duration) -> Option<DerivedStatus> {
    if record.returned_at.is_some() {
        return None;
    }
    if now > record.due_at {
        Some(DerivedStatus::Overdue)
    } else if record.due_at - now <= horizon {
        Some(DerivedStatus::DueSoon)
    } else {
        Some(DerivedStatus::Active)
    }
}

/// Aggregate counts for the dashboard summary tiles. O(n) over the input,
/// recomputed on demand.
///
/// `fine_total` sums only server-confirmed fines; the optimistic path never
/// produces one.
pub fn aggregate(records: &[LoanRecord], now: DateTime<Utc>, horizon: Duration) -> LoanSummary {
    let mut summary = LoanSummary {
        active: 0,
        due_soon: 0,
        overdue: 0,
        fine_eligible: 0,
        fine_total: Decimal::ZERO,
    };
    for record in records {
        match classify(record, now, horizon) {
            Some(DerivedStatus::Active) => summary.active += 1,
            Some(DerivedStatus::DueSoon) => summary.due_soon += 1,
            Some(DerivedStatus::Overdue) => {
                summary.overdue += 1;
                summary.fine_eligible += 1;
            }
            None => {}
        }
        if let Some(fine) = record.fine_due {
            summary.fine_total += fine;
        }
    }
    summary
}

/// Records split and ordered for display
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOrdering {
    /// Live loans, soonest due first
    pub active: Vec<LoanRecord>,
    /// Returned loans, newest borrowed first
    pub history: Vec<LoanRecord>,
}

/// Deterministic display ordering: active loans by due date ascending,
/// history by borrow date descending, ties broken by id.
pub fn sort_for_display(records: &[LoanRecord]) -> DisplayOrdering {
    let mut active: Vec<LoanRecord> = Vec::new();
    let mut history: Vec<LoanRecord> = Vec::new();
    for record in records {
        if record.is_returned() {
            history.push(record.clone());
        } else {
            active.push(record.clone());
        }
    }
    active.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id)));
    history.sort_by(|a, b| {
        b.borrowed_at
            .cmp(&a.borrowed_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    DisplayOrdering { active, history }
}
