//! Catalog item payloads (admin inventory maintenance)

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;
use validator::Validate;

/// A catalog entry as returned by the command API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub title: String,
    pub author: Option<String>,
    /// Shelf/barcode identification
    pub identification: Option<String>,
    pub copies: i16,
    pub available: i16,
}

/// Create catalog item request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CatalogItemInput {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub author: Option<String>,
    pub identification: Option<String>,
    #[validate(range(min = 1, message = "At least one copy is required"))]
    pub copies: i16,
}

/// Update catalog item request; absent fields are left unchanged
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogItemUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub identification: Option<String>,
    pub copies: Option<i16>,
}
