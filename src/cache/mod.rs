//! Query result caching.

mod query_cache;

pub use query_cache::{QueryCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
