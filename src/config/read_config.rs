//! Configuration file reading and parsing.
//!
//! Locates and parses an INI-format config file. The path comes from an
//! explicit argument, then the `FAVSTORE_CONFIG_FILE` environment variable;
//! with neither set, compiled-in defaults apply.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use configparser::ini::Ini;
use thiserror::Error;

use crate::store::PROVIDER_MAX_BATCH_SIZE;

use super::types::{BatchConfig, CacheConfig, EngineConfig, OfflineConfig, TransactionConfig};

// =============================================================================
// Constants - Default Values
// =============================================================================

const ENV_CONFIG_FILE: &str = "FAVSTORE_CONFIG_FILE";

const SECTION_BATCH: &str = "batch";
const SECTION_CACHE: &str = "cache";
const SECTION_TRANSACTION: &str = "transaction";
const SECTION_OFFLINE: &str = "offline";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid integer '{value}' for key '{key}': {source}")]
    InvalidInteger {
        key: String,
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("invalid boolean '{value}' for key '{key}'")]
    InvalidBoolean { key: String, value: String },
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Specifies how to locate configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit config file path. If specified and missing, error.
    /// If None, fall back to FAVSTORE_CONFIG_FILE, then defaults.
    pub config_file: Option<PathBuf>,
}

impl ConfigSource {
    fn resolve(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            return Ok(Some(path.clone()));
        }
        if let Ok(path) = env::var(ENV_CONFIG_FILE) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

// =============================================================================
// Parsing Helpers
// =============================================================================

fn get_usize(ini: &Ini, section: &str, key: &str, default: usize) -> Result<usize> {
    match ini.get(section, key) {
        Some(value) => value.parse().map_err(|source| ConfigError::InvalidInteger {
            key: format!("{section}.{key}"),
            value,
            source,
        }),
        None => Ok(default),
    }
}

fn get_u32(ini: &Ini, section: &str, key: &str, default: u32) -> Result<u32> {
    match ini.get(section, key) {
        Some(value) => value.parse().map_err(|source| ConfigError::InvalidInteger {
            key: format!("{section}.{key}"),
            value,
            source,
        }),
        None => Ok(default),
    }
}

fn get_u64(ini: &Ini, section: &str, key: &str, default: u64) -> Result<u64> {
    match ini.get(section, key) {
        Some(value) => value.parse().map_err(|source| ConfigError::InvalidInteger {
            key: format!("{section}.{key}"),
            value,
            source,
        }),
        None => Ok(default),
    }
}

fn get_bool(ini: &Ini, section: &str, key: &str, default: bool) -> Result<bool> {
    match ini.get(section, key) {
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBoolean {
                key: format!("{section}.{key}"),
                value,
            }),
        },
        None => Ok(default),
    }
}

// =============================================================================
// read_config
// =============================================================================

/// Read the engine configuration described by `source`.
///
/// Missing files (when not explicitly requested), sections, and keys fall
/// back to the defaults in [`EngineConfig::default`].
pub fn read_config(source: &ConfigSource) -> Result<EngineConfig> {
    let defaults = EngineConfig::default();

    let Some(path) = source.resolve()? else {
        return Ok(defaults);
    };
    parse_config_file(&path, defaults)
}

fn parse_config_file(path: &Path, defaults: EngineConfig) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    let mut ini = Ini::new();
    ini.read(content).map_err(|message| ConfigError::ParseError {
        path: path.to_path_buf(),
        message,
    })?;

    let max_batch_size = get_usize(
        &ini,
        SECTION_BATCH,
        "max_batch_size",
        defaults.batch.max_batch_size,
    )?
    .clamp(1, PROVIDER_MAX_BATCH_SIZE);

    let cache_enabled = get_bool(&ini, SECTION_CACHE, "enabled", defaults.cache.enabled)?;
    let default_ttl_secs = get_u64(
        &ini,
        SECTION_CACHE,
        "default_ttl_secs",
        defaults.cache.default_ttl.as_secs(),
    )?;
    let max_entries = get_usize(
        &ini,
        SECTION_CACHE,
        "max_entries",
        defaults.cache.max_entries,
    )?;

    let max_attempts = get_u32(
        &ini,
        SECTION_TRANSACTION,
        "max_attempts",
        defaults.transaction.max_attempts,
    )?
    .max(1);

    let offline_enabled = get_bool(&ini, SECTION_OFFLINE, "enabled", defaults.offline.enabled)?;
    let offline_path = ini.get(SECTION_OFFLINE, "path").map(PathBuf::from);

    Ok(EngineConfig {
        batch: BatchConfig { max_batch_size },
        cache: CacheConfig {
            enabled: cache_enabled,
            default_ttl: Duration::from_secs(default_ttl_secs),
            max_entries,
        },
        transaction: TransactionConfig { max_attempts },
        offline: OfflineConfig {
            enabled: offline_enabled,
            path: offline_path,
        },
    })
}
