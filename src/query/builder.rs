//! Optimized query builders for the three record shapes.
//!
//! The provider can only serve a multi-field query from a composite index
//! whose fields appear as: equality fields first, then a single range
//! field, then sort fields. The builders emit filters in exactly that
//! order and force the primary sort clause onto the range field when one
//! exists, so every built query is index-servable.

use crate::model::{COLLECTIONS_COLLECTION, ITEMS_COLLECTION, TEMPLATES_COLLECTION};

use super::filters::{
    CollectionFilters, CollectionSortBy, ItemFilters, ItemSortBy, PaginationOptions,
    TemplateFilters, TemplateSortBy,
};
use super::spec::{FilterOp, OrderBy, QuerySpec};

/// High codepoint appended to a search term to form the exclusive upper
/// bound of a prefix range. The backing store has no native text search;
/// `name >= term && name < term + SUFFIX` approximates a case-sensitive
/// prefix match.
pub const SEARCH_RANGE_SUFFIX: char = '\u{f8ff}';

fn push_search_range(spec: QuerySpec, term: &str) -> QuerySpec {
    spec.filter("name", FilterOp::Gte, term)
        .filter("name", FilterOp::Lt, format!("{term}{SEARCH_RANGE_SUFFIX}"))
}

/// Force the sort order onto the range field first, then apply the
/// requested sort. Sorting on anything but the range field first would
/// make the query unservable.
fn push_sort(mut spec: QuerySpec, requested: OrderBy) -> QuerySpec {
    if let Some(range_field) = spec.range_fields().first().copied() {
        if range_field != requested.field {
            let range_order = OrderBy::asc(range_field);
            spec = spec.order(range_order);
        }
    }
    spec.order(requested)
}

fn apply_pagination(mut spec: QuerySpec, pagination: Option<&PaginationOptions>) -> QuerySpec {
    if let Some(p) = pagination {
        if let Some(limit) = p.limit {
            spec = spec.limit(limit);
        }
        if let Some(offset) = p.offset {
            spec = spec.offset(offset);
        }
    }
    spec
}

// =============================================================================
// Collections
// =============================================================================

/// Build a query over a user's collections.
pub fn optimized_collection_query(
    user_id: &str,
    filters: Option<&CollectionFilters>,
    pagination: Option<&PaginationOptions>,
) -> QuerySpec {
    let mut spec = QuerySpec::new(COLLECTIONS_COLLECTION).filter("userId", FilterOp::Eq, user_id);

    let default_filters = CollectionFilters::default();
    let filters = filters.unwrap_or(&default_filters);

    // Equality filters.
    if let Some(fav) = filters.is_favorite {
        spec = spec.filter("isFavorite", FilterOp::Eq, fav);
    }
    if let Some(public) = filters.is_public {
        spec = spec.filter("isPublic", FilterOp::Eq, public);
    }

    // Range filters.
    if let Some(term) = &filters.search_term {
        spec = push_search_range(spec, term);
    }
    if let Some(after) = filters.created_after {
        spec = spec.filter("createdAt", FilterOp::Gte, after.to_rfc3339());
    }
    if let Some(before) = filters.created_before {
        spec = spec.filter("createdAt", FilterOp::Lte, before.to_rfc3339());
    }

    // Sort.
    let requested = match filters.sort_by.unwrap_or_default() {
        CollectionSortBy::UpdatedDesc => OrderBy::desc("updatedAt"),
        CollectionSortBy::CreatedDesc => OrderBy::desc("createdAt"),
        CollectionSortBy::NameAsc => OrderBy::asc("name"),
        CollectionSortBy::ItemCountDesc => OrderBy::desc("itemCount"),
    };
    spec = push_sort(spec, requested);

    apply_pagination(spec, pagination)
}

// =============================================================================
// Items
// =============================================================================

/// Build a query over a user's items.
///
/// With `cross_collection` set the collectionId equality filter is omitted
/// and the query spans every collection the user owns.
pub fn optimized_items_query(
    user_id: &str,
    filters: Option<&ItemFilters>,
    pagination: Option<&PaginationOptions>,
) -> QuerySpec {
    let mut spec = QuerySpec::new(ITEMS_COLLECTION).filter("userId", FilterOp::Eq, user_id);

    let default_filters = ItemFilters::default();
    let filters = filters.unwrap_or(&default_filters);

    // Equality filters.
    if !filters.cross_collection {
        if let Some(collection_id) = &filters.collection_id {
            spec = spec.filter("collectionId", FilterOp::Eq, collection_id.as_str());
        }
    }
    if let Some(fav) = filters.is_favorite {
        spec = spec.filter("isFavorite", FilterOp::Eq, fav);
    }

    // Range filters.
    if let Some(term) = &filters.search_term {
        spec = push_search_range(spec, term);
    }
    if let Some(min_rating) = filters.min_rating {
        spec = spec.filter("rating", FilterOp::Gte, min_rating);
    }
    if let Some(after) = filters.created_after {
        spec = spec.filter("createdAt", FilterOp::Gte, after.to_rfc3339());
    }
    if let Some(before) = filters.created_before {
        spec = spec.filter("createdAt", FilterOp::Lte, before.to_rfc3339());
    }

    // Sort.
    let requested = match filters.sort_by.unwrap_or_default() {
        ItemSortBy::UpdatedDesc => OrderBy::desc("updatedAt"),
        ItemSortBy::CreatedDesc => OrderBy::desc("createdAt"),
        ItemSortBy::NameAsc => OrderBy::asc("name"),
        ItemSortBy::RatingDesc => OrderBy::desc("rating"),
    };
    spec = push_sort(spec, requested);

    apply_pagination(spec, pagination)
}

// =============================================================================
// Templates
// =============================================================================

/// Build a query over templates.
///
/// With a `creator_id` filter the query targets that user's templates;
/// otherwise it targets the public template catalog.
pub fn optimized_template_query(
    filters: Option<&TemplateFilters>,
    pagination: Option<&PaginationOptions>,
) -> QuerySpec {
    let mut spec = QuerySpec::new(TEMPLATES_COLLECTION);

    let default_filters = TemplateFilters::default();
    let filters = filters.unwrap_or(&default_filters);

    // Equality filters.
    if let Some(creator_id) = &filters.creator_id {
        spec = spec.filter("creatorId", FilterOp::Eq, creator_id.as_str());
    } else {
        spec = spec.filter("isPublic", FilterOp::Eq, true);
    }
    if let Some(category) = &filters.category {
        spec = spec.filter("category", FilterOp::Eq, category.as_str());
    }
    if let Some(fav) = filters.is_favorite {
        spec = spec.filter("isFavorite", FilterOp::Eq, fav);
    }
    if let Some(premium) = filters.is_premium {
        spec = spec.filter("isPremium", FilterOp::Eq, premium);
    }

    // Range filters.
    if let Some(term) = &filters.search_term {
        spec = push_search_range(spec, term);
    }
    if let Some(min_rating) = filters.min_rating {
        spec = spec.filter("rating", FilterOp::Gte, min_rating);
    }

    // Sort.
    let requested = match filters.sort_by.unwrap_or_default() {
        TemplateSortBy::DownloadsDesc => OrderBy::desc("downloadCount"),
        TemplateSortBy::RatingDesc => OrderBy::desc("rating"),
        TemplateSortBy::CreatedDesc => OrderBy::desc("createdAt"),
    };
    spec = push_sort(spec, requested);

    apply_pagination(spec, pagination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::spec::SortDirection;

    #[test]
    fn test_equality_filters_precede_range_filters() {
        let filters = ItemFilters {
            collection_id: Some("c1".to_string()),
            is_favorite: Some(true),
            min_rating: Some(3.0),
            ..Default::default()
        };
        let spec = optimized_items_query("u1", Some(&filters), None);

        let ops: Vec<bool> = spec.filters.iter().map(|f| f.op.is_equality()).collect();
        // All equality filters must come before the first range filter.
        let first_range = ops.iter().position(|eq| !eq).unwrap();
        assert!(ops[..first_range].iter().all(|eq| *eq));
        assert!(ops[first_range..].iter().all(|eq| !eq));

        assert_eq!(spec.equality_fields(), vec!["userId", "collectionId", "isFavorite"]);
        assert_eq!(spec.range_fields(), vec!["rating"]);
    }

    #[test]
    fn test_cross_collection_omits_collection_filter() {
        let filters = ItemFilters {
            collection_id: Some("c1".to_string()),
            cross_collection: true,
            is_favorite: Some(true),
            ..Default::default()
        };
        let spec = optimized_items_query("u1", Some(&filters), None);
        assert!(spec.filters.iter().all(|f| f.field != "collectionId"));
        assert_eq!(spec.equality_fields(), vec!["userId", "isFavorite"]);
    }

    #[test]
    fn test_search_term_builds_prefix_range() {
        let filters = ItemFilters {
            search_term: Some("Cha".to_string()),
            ..Default::default()
        };
        let spec = optimized_items_query("u1", Some(&filters), None);

        let ranges: Vec<_> = spec.filters.iter().filter(|f| f.field == "name").collect();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].op, FilterOp::Gte);
        assert_eq!(ranges[1].op, FilterOp::Lt);
        assert_eq!(
            ranges[1].value.as_str().unwrap(),
            format!("Cha{SEARCH_RANGE_SUFFIX}")
        );
    }

    #[test]
    fn test_sort_is_forced_onto_range_field() {
        let filters = ItemFilters {
            min_rating: Some(4.0),
            sort_by: Some(ItemSortBy::UpdatedDesc),
            ..Default::default()
        };
        let spec = optimized_items_query("u1", Some(&filters), None);

        assert_eq!(spec.order_by[0].field, "rating");
        assert_eq!(spec.order_by[0].direction, SortDirection::Ascending);
        assert_eq!(spec.order_by[1].field, "updatedAt");
    }

    #[test]
    fn test_sort_not_duplicated_when_range_field_matches() {
        let filters = ItemFilters {
            min_rating: Some(4.0),
            sort_by: Some(ItemSortBy::RatingDesc),
            ..Default::default()
        };
        let spec = optimized_items_query("u1", Some(&filters), None);
        assert_eq!(spec.order_by.len(), 1);
        assert_eq!(spec.order_by[0].field, "rating");
    }

    #[test]
    fn test_template_query_defaults_to_public_catalog() {
        let spec = optimized_template_query(None, None);
        assert_eq!(spec.collection, "templates");
        assert_eq!(spec.filters[0].field, "isPublic");
        assert_eq!(spec.order_by[0].field, "downloadCount");
    }

    #[test]
    fn test_pagination_applies() {
        let page = PaginationOptions::page(25, 50);
        let spec = optimized_collection_query("u1", None, Some(&page));
        assert_eq!(spec.limit, Some(25));
        assert_eq!(spec.offset, Some(50));
    }
}
