//! Broadcast notice model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::enums::Audience;

/// An admin announcement to broadcast. Validated client-side before any
/// network call; a rejected payload never reaches the command API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Notice {
    #[validate(length(min = 1, max = 120, message = "Title must be 1-120 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub body: String,
    pub audience: Audience,
}

/// Server acknowledgement of a broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeReceipt {
    pub id: Uuid,
    pub sent_at: DateTime<Utc>,
    pub recipient_count: i64,
}

/// A previously sent notice, as listed on the admin page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeRecord {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub audience: Audience,
    pub sent_at: DateTime<Utc>,
}
