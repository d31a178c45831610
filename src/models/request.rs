//! Pending change-request model (admin review queue)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RequestState;

/// A holder-submitted change awaiting admin review (profile corrections,
/// contact updates). The requested field changes are carried opaquely; the
/// client only renders and approves/rejects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: Uuid,
    pub holder_id: Uuid,
    pub holder_name: Option<String>,
    /// Requested field changes, keyed by field name
    pub changes: serde_json::Value,
    pub submitted_at: DateTime<Utc>,
    pub state: RequestState,
}
