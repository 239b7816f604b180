//! Configuration types for the store engine.
//!
//! Parsed from an INI-format config file; every field has a default so an
//! absent file or section yields a working configuration.

use std::path::PathBuf;
use std::time::Duration;

/// [batch] section - batch executor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Operations per chunk commit. Clamped to the provider maximum.
    pub max_batch_size: usize,
}

/// [cache] section - query result cache tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl: Duration,
    pub max_entries: usize,
}

/// [transaction] section - atomic transaction tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionConfig {
    pub max_attempts: u32,
}

/// [offline] section - LMDB offline persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub batch: BatchConfig,
    pub cache: CacheConfig,
    pub transaction: TransactionConfig,
    pub offline: OfflineConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig {
                max_batch_size: crate::store::PROVIDER_MAX_BATCH_SIZE,
            },
            cache: CacheConfig {
                enabled: true,
                default_ttl: crate::cache::DEFAULT_CACHE_TTL,
                max_entries: crate::cache::DEFAULT_CACHE_CAPACITY,
            },
            transaction: TransactionConfig {
                max_attempts: crate::batch::DEFAULT_MAX_TRANSACTION_ATTEMPTS,
            },
            offline: OfflineConfig {
                enabled: false,
                path: None,
            },
        }
    }
}
