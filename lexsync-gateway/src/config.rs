//! Configuration system for the `LexSync` gateway.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/lexsync-gateway/config.toml`)
//! 4. Compiled defaults
//!
//! Calendar credentials are optional at startup: the gateway runs without
//! them and calendar routes answer with a configuration error until they
//! are provided.

use std::path::PathBuf;

/// Errors that can occur when loading gateway configuration.
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

/// Top-level TOML config file structure for the gateway.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct GatewayConfigFile {
    server: ServerFileConfig,
    calendar: CalendarFileConfig,
}

/// `[server]` section of the gateway config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
}

/// `[calendar]` section of the gateway config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct CalendarFileConfig {
    api_key: Option<String>,
    calendar_id: Option<String>,
    base_url: Option<String>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the gateway.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "LexSync realtime gateway and calendar proxy")]
pub struct GatewayCliArgs {
    /// Address to bind the gateway to.
    #[arg(short, long, env = "GATEWAY_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/lexsync-gateway/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// API key for the upstream calendar service.
    #[arg(long, env = "CALENDAR_API_KEY")]
    pub calendar_api_key: Option<String>,

    /// Identifier of the calendar to proxy.
    #[arg(long, env = "CALENDAR_ID")]
    pub calendar_id: Option<String>,

    /// Base URL of the upstream calendar service.
    #[arg(long, env = "CALENDAR_BASE_URL")]
    pub calendar_base_url: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "GATEWAY_LOG")]
    pub log_level: String,

    /// Path to log file (stderr if not given).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:9100`).
    pub bind_addr: String,
    /// API key for the upstream calendar service.
    pub calendar_api_key: Option<String>,
    /// Identifier of the calendar to proxy.
    pub calendar_id: Option<String>,
    /// Base URL of the upstream calendar service.
    pub calendar_base_url: String,
    /// Log level filter string.
    pub log_level: String,
    /// Optional log file path.
    pub log_file: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9100".to_string(),
            calendar_api_key: None,
            calendar_id: None,
            calendar_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl GatewayConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &GatewayCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `GatewayConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &GatewayCliArgs, file: &GatewayConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            calendar_api_key: cli
                .calendar_api_key
                .clone()
                .or_else(|| file.calendar.api_key.clone()),
            calendar_id: cli
                .calendar_id
                .clone()
                .or_else(|| file.calendar.calendar_id.clone()),
            calendar_base_url: cli
                .calendar_base_url
                .clone()
                .or_else(|| file.calendar.base_url.clone())
                .unwrap_or(defaults.calendar_base_url),
            log_level: cli.log_level.clone(),
            log_file: cli.log_file.clone(),
        }
    }

    /// The configured (api key, calendar id) pair, when both are present.
    #[must_use]
    pub fn calendar_credentials(&self) -> Option<(&str, &str)> {
        match (&self.calendar_api_key, &self.calendar_id) {
            (Some(key), Some(id)) => Some((key.as_str(), id.as_str())),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the gateway.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<GatewayConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(GatewayConfigFile::default());
        };
        config_dir.join("lexsync-gateway").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GatewayConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
