//! Typed filter sets for the three record shapes.
//!
//! These are the repository-facing knobs; the builder translates them into
//! an ordered [`QuerySpec`](super::QuerySpec).

use chrono::{DateTime, Utc};

// =============================================================================
// PaginationOptions
// =============================================================================

/// Pagination for query results.
///
/// When `limit` is unset the provider's default page size applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PaginationOptions {
    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}

// =============================================================================
// Sort Orders
// =============================================================================

/// Sort order for collection queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionSortBy {
    /// Most recently updated first.
    #[default]
    UpdatedDesc,
    /// Most recently created first.
    CreatedDesc,
    /// Name, A to Z.
    NameAsc,
    /// Largest collections first.
    ItemCountDesc,
}

/// Sort order for item queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemSortBy {
    /// Most recently updated first.
    #[default]
    UpdatedDesc,
    /// Most recently created first.
    CreatedDesc,
    /// Name, A to Z.
    NameAsc,
    /// Highest rated first.
    RatingDesc,
}

/// Sort order for template queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateSortBy {
    /// Most downloaded first.
    #[default]
    DownloadsDesc,
    /// Highest rated first.
    RatingDesc,
    /// Most recently created first.
    CreatedDesc,
}

// =============================================================================
// Filters
// =============================================================================

/// Filters for collection queries. Predicates combine conjunctively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionFilters {
    pub is_favorite: Option<bool>,
    pub is_public: Option<bool>,
    /// Best-effort prefix match on the collection name.
    pub search_term: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub sort_by: Option<CollectionSortBy>,
}

/// Filters for item queries. Predicates combine conjunctively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilters {
    /// Restrict to one collection. Ignored when `cross_collection` is set.
    pub collection_id: Option<String>,
    /// Query across all of the user's collections. This is the only
    /// supported cross-partition mode.
    pub cross_collection: bool,
    pub is_favorite: Option<bool>,
    /// Best-effort prefix match on the item name.
    pub search_term: Option<String>,
    /// Minimum rating, inclusive.
    pub min_rating: Option<f64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub sort_by: Option<ItemSortBy>,
}

/// Filters for template queries. Predicates combine conjunctively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateFilters {
    /// Restrict to templates created by this user; otherwise public
    /// templates are queried.
    pub creator_id: Option<String>,
    pub category: Option<String>,
    pub is_favorite: Option<bool>,
    pub is_premium: Option<bool>,
    /// Best-effort prefix match on the template name.
    pub search_term: Option<String>,
    /// Minimum aggregate rating, inclusive.
    pub min_rating: Option<f64>,
    pub sort_by: Option<TemplateSortBy>,
}
