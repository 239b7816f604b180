//! Engine configuration.

mod read_config;
mod types;

pub use read_config::{read_config, ConfigError, ConfigSource, Result};
pub use types::{BatchConfig, CacheConfig, EngineConfig, OfflineConfig, TransactionConfig};
