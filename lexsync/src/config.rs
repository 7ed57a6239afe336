//! Engine configuration.
//!
//! Compiled defaults encode the per-entity staleness policy; a TOML file
//! (`~/.config/lexsync/config.toml` by default) can override any field.
//! Missing default config file is not an error; an explicit path that does
//! not exist is.

use std::path::PathBuf;
use std::time::Duration;

use crate::query::QueryConfig;

/// Errors that can occur when loading engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    cache: CacheFileConfig,
    sync: SyncFileConfig,
}

/// One entity's `[cache.*]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct PolicyFileConfig {
    stale_secs: Option<u64>,
    gc_secs: Option<u64>,
}

/// `[cache]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct CacheFileConfig {
    tasks: PolicyFileConfig,
    employees: PolicyFileConfig,
    task_states: PolicyFileConfig,
    clients: PolicyFileConfig,
    cases: PolicyFileConfig,
    notes: PolicyFileConfig,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    gateway_url: Option<String>,
    debounce_ms: Option<u64>,
    retry_delay_ms: Option<u64>,
    notice_buffer: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Staleness policy for the joined tasks query (always stale).
    pub tasks: QueryConfig,
    /// Staleness policy for the employee roster.
    pub employees: QueryConfig,
    /// Staleness policy for the task state catalog.
    pub task_states: QueryConfig,
    /// Staleness policy for the client directory.
    pub clients: QueryConfig,
    /// Staleness policy for legal cases.
    pub cases: QueryConfig,
    /// Staleness policy for per-case notes.
    pub notes: QueryConfig,
    /// Gateway WebSocket URL for the realtime stream, if any.
    pub gateway_url: Option<String>,
    /// Debounce window coalescing bursts of relational change events.
    pub debounce: Duration,
    /// Fixed delay before the single retry of a failed fetch.
    pub retry_delay: Duration,
    /// Buffer size of the sync notice channel.
    pub notice_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tasks: QueryConfig::new(Duration::ZERO, Some(Duration::from_secs(10 * 60))),
            employees: QueryConfig::new(
                Duration::from_secs(15 * 60),
                Some(Duration::from_secs(30 * 60)),
            ),
            task_states: QueryConfig::new(
                Duration::from_secs(15 * 60),
                Some(Duration::from_secs(60 * 60)),
            ),
            clients: QueryConfig::new(Duration::from_secs(5 * 60), None),
            cases: QueryConfig::new(Duration::from_secs(3 * 60), None),
            notes: QueryConfig::new(Duration::from_secs(30), None),
            gateway_url: None,
            debounce: Duration::from_millis(100),
            retry_delay: Duration::from_millis(500),
            notice_buffer: 64,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file merged over the defaults.
    ///
    /// With `path = None` the default location is tried and a missing file
    /// yields the compiled defaults. An explicit path must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let file = load_config_file(path)?;
        Ok(Self::resolve(&file))
    }

    /// Resolves an `EngineConfig` from a parsed config file.
    ///
    /// Priority: file > default. Separated from `load()` for unit testing.
    #[must_use]
    fn resolve(file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            tasks: resolve_policy(&file.cache.tasks, defaults.tasks),
            employees: resolve_policy(&file.cache.employees, defaults.employees),
            task_states: resolve_policy(&file.cache.task_states, defaults.task_states),
            clients: resolve_policy(&file.cache.clients, defaults.clients),
            cases: resolve_policy(&file.cache.cases, defaults.cases),
            notes: resolve_policy(&file.cache.notes, defaults.notes),
            gateway_url: file.sync.gateway_url.clone(),
            debounce: file
                .sync
                .debounce_ms
                .map_or(defaults.debounce, Duration::from_millis),
            retry_delay: file
                .sync
                .retry_delay_ms
                .map_or(defaults.retry_delay, Duration::from_millis),
            notice_buffer: file.sync.notice_buffer.unwrap_or(defaults.notice_buffer),
        }
    }
}

/// Merges one entity's file section over its default policy.
fn resolve_policy(file: &PolicyFileConfig, default: QueryConfig) -> QueryConfig {
    QueryConfig {
        stale_time: file
            .stale_secs
            .map_or(default.stale_time, Duration::from_secs),
        gc_time: file.gc_secs.map_or(default.gc_time, Duration::from_secs),
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            // No config dir available — use defaults.
            return Ok(ConfigFile::default());
        };
        config_dir.join("lexsync").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
