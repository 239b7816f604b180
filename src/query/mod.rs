//! Query specification, typed filters, builders, and local evaluation.
//!
//! Queries are plain data ([`QuerySpec`]): filters, sort clauses, and
//! pagination, independent of any provider SDK. Provider adapters translate
//! a spec into native calls at the boundary; the in-crate stores evaluate
//! specs directly via [`eval`].

mod builder;
mod eval;
mod filters;
mod spec;

pub use builder::{
    optimized_collection_query, optimized_items_query, optimized_template_query,
    SEARCH_RANGE_SUFFIX,
};
pub use eval::{apply_query, matches_document};
pub use filters::{
    CollectionFilters, CollectionSortBy, ItemFilters, ItemSortBy, PaginationOptions,
    TemplateFilters, TemplateSortBy,
};
pub use spec::{FieldFilter, FilterOp, OrderBy, QuerySpec, SortDirection};
