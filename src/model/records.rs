//! Record types stored in the document store.
//!
//! All records are identified by a string id and partitioned by an owning
//! user id. Timestamps are UTC. Field names follow the backend's camelCase
//! wire format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::custom_field::{CustomFieldKind, CustomFieldValue};

// =============================================================================
// Collection Names
// =============================================================================

/// Store collection holding [`CollectionRecord`]s.
pub const COLLECTIONS_COLLECTION: &str = "collections";

/// Store collection holding [`ItemRecord`]s.
pub const ITEMS_COLLECTION: &str = "items";

/// Store collection holding [`TemplateRecord`]s.
pub const TEMPLATES_COLLECTION: &str = "templates";

// =============================================================================
// CollectionRecord
// =============================================================================

/// A user-defined collection of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template this collection was created from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    /// Denormalized count of items referencing this collection.
    ///
    /// Best-effort: the engine never maintains this counter. Callers that
    /// need it kept in lockstep with item writes must update it inside an
    /// atomic transaction together with the item write.
    pub item_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    pub is_favorite: bool,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// ItemRecord
// =============================================================================

/// A geographic location attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A single item within a collection.
///
/// `collection_id` must reference a [`CollectionRecord`] owned by the same
/// `user_id`; the engine does not enforce this referential integrity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: String,
    pub user_id: String,
    pub collection_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_urls: Vec<String>,
    /// User-defined fields, keyed by field name.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, CustomFieldValue>,
    pub is_favorite: bool,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// User rating in the range 0.0 to 5.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// TemplateRecord
// =============================================================================

/// A field definition within a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateComponent {
    pub name: String,
    pub kind: CustomFieldKind,
    pub required: bool,
}

/// A reusable collection template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub id: String,
    pub creator_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Field definitions applied to items created from this template.
    pub components: Vec<TemplateComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_image_url: Option<String>,
    pub is_favorite: bool,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub is_premium: bool,
    pub download_count: u64,
    /// Aggregate rating in the range 0.0 to 5.0.
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
