//! Configuration module for osquery-bridge.
//!
//! Handles connection commands, environment variables, and bridge settings.

mod settings;

pub use settings::{
    expand_env_vars, BridgeMode, BridgeSettings, ConnectionSettings, ReadinessSettings,
    ReadinessStrategy, Settings, SettingsError, CONFIG_ENV_VAR, LOCAL_CONFIG_FILE,
};
