//! TOML-based configuration for osquery-bridge.
//!
//! Supports a config file (osquery-bridge.toml) with environment variable
//! expansion in command strings.
//!
//! Example configuration:
//! ```toml
//! [connections.default]
//! osquery_command = "osqueryi --nodisable_extensions --extensions_socket ${HOME}/.osquery/shell.em"
//! extension_command = "steampipe-osquery-extension --socket ${HOME}/.osquery/shell.em"
//! extensions = []
//! mode = "persistent"  # or "per_query"
//!
//! [bridge]
//! request_timeout_secs = 30  # 0 disables the timeout
//! shell_warmup_ms = 250
//! max_line_bytes = 524288
//! value_rendering = "quoted"  # or "typed"
//! metadata_file = "osquery_schemas.json"
//!
//! [bridge.readiness]
//! strategy = "probe"  # or "delay"
//! delay_ms = 1000
//! attempts = 10
//! initial_backoff_ms = 100
//! max_backoff_ms = 2000
//! probe_timeout_ms = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::protocol::DEFAULT_MAX_LINE_BYTES;
use crate::bridge::{BridgeConfig, BridgeOptions, ProbePolicy, Readiness};
use crate::sql::ValueRendering;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "OSQUERY_BRIDGE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "osquery-bridge.toml";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Connection {connection} has no {field}")]
    MissingCommand {
        connection: String,
        field: &'static str,
    },
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named osquery connections.
    pub connections: HashMap<String, ConnectionSettings>,

    /// Bridge behaviour shared by all connections.
    pub bridge: BridgeSettings,
}

/// How long a connection's processes live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeMode {
    /// Start once, reuse for every query.
    #[default]
    Persistent,
    /// Start and stop the processes around each query.
    PerQuery,
}

/// One osquery connection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Command line of the osquery shell (supports ${ENV_VAR} expansion).
    pub osquery_command: Option<String>,

    /// Command line of the JSON extension that answers queries.
    pub extension_command: Option<String>,

    /// Further extensions to start alongside; never queried.
    pub extensions: Vec<String>,

    pub mode: BridgeMode,
}

impl ConnectionSettings {
    pub fn new(osquery_command: impl Into<String>, extension_command: impl Into<String>) -> Self {
        Self {
            osquery_command: Some(osquery_command.into()),
            extension_command: Some(extension_command.into()),
            ..Default::default()
        }
    }

    /// The osquery command with environment variables expanded.
    pub fn resolved_osquery_command(&self, connection: &str) -> Result<String, SettingsError> {
        resolve_command(connection, "osquery_command", self.osquery_command.as_deref())
    }

    /// The extension command with environment variables expanded.
    pub fn resolved_extension_command(&self, connection: &str) -> Result<String, SettingsError> {
        resolve_command(connection, "extension_command", self.extension_command.as_deref())
    }
}

fn resolve_command(
    connection: &str,
    field: &'static str,
    command: Option<&str>,
) -> Result<String, SettingsError> {
    match command.map(str::trim) {
        Some(command) if !command.is_empty() => expand_env_vars(command),
        _ => Err(SettingsError::MissingCommand {
            connection: connection.to_string(),
            field,
        }),
    }
}

/// Bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Per-query timeout in seconds; 0 disables it.
    pub request_timeout_secs: u64,

    /// Pause between starting osquery and the extension.
    pub shell_warmup_ms: u64,

    /// Longest response line accepted.
    pub max_line_bytes: usize,

    pub value_rendering: ValueRendering,

    /// Table and column descriptions (osquery schema JSON).
    pub metadata_file: Option<String>,

    pub readiness: ReadinessSettings,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            shell_warmup_ms: 250,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            value_rendering: ValueRendering::Quoted,
            metadata_file: None,
            readiness: ReadinessSettings::default(),
        }
    }
}

impl BridgeSettings {
    /// Convert to the options a bridge is started with.
    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
            shell_warmup: Duration::from_millis(self.shell_warmup_ms),
            max_line_bytes: self.max_line_bytes,
            readiness: self.readiness.readiness(),
        }
    }

    /// The description file path with environment variables expanded.
    pub fn metadata_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.metadata_file
            .as_deref()
            .map(|path| expand_env_vars(path).map(PathBuf::from))
            .transpose()
    }
}

/// How startup decides the extension is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStrategy {
    /// Send a tagged query until it is answered.
    #[default]
    Probe,
    /// Sleep for `delay_ms` and hope.
    Delay,
}

/// Readiness settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessSettings {
    pub strategy: ReadinessStrategy,
    pub delay_ms: u64,
    pub attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub probe_timeout_ms: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            strategy: ReadinessStrategy::Probe,
            delay_ms: 1000,
            attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 2000,
            probe_timeout_ms: 2000,
        }
    }
}

impl ReadinessSettings {
    pub fn readiness(&self) -> Readiness {
        match self.strategy {
            ReadinessStrategy::Delay => Readiness::Delay(Duration::from_millis(self.delay_ms)),
            ReadinessStrategy::Probe => Readiness::Probe(ProbePolicy {
                attempts: self.attempts.max(1),
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
                probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            }),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `OSQUERY_BRIDGE_CONFIG`
    /// 2. `./osquery-bridge.toml`
    /// 3. `~/.config/osquery-bridge/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("osquery-bridge").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Get a connection by name.
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))
    }

    /// Get the default connection ("default" if it exists, otherwise the
    /// first by name).
    pub fn default_connection(&self) -> Option<(&str, &ConnectionSettings)> {
        if let Some(conn) = self.connections.get("default") {
            return Some(("default", conn));
        }
        self.connections
            .iter()
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Everything needed to start the bridge for one connection.
    pub fn bridge_config(&self, name: &str) -> Result<BridgeConfig, SettingsError> {
        let connection = self.get_connection(name)?;
        let mut config = BridgeConfig::new(
            connection.resolved_osquery_command(name)?,
            connection.resolved_extension_command(name)?,
        )
        .with_options(self.bridge.bridge_options());

        for extension in &connection.extensions {
            config = config.with_auxiliary(expand_env_vars(extension)?);
        }
        Ok(config)
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. A lone `$` is kept.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                result.push('$');
                continue;
            }
            name
        };

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}
