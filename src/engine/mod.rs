//! Top-level engine component.
//!
//! The [`StoreEngine`] owns the cache, monitor, validator, and executors,
//! and is the surface repository-layer callers consume.

#[allow(clippy::module_inception)]
mod engine;

pub use engine::{EngineError, Result, StoreEngine, StoreEngineBuilder};
