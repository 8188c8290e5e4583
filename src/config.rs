//! Configuration.
//!
//! Defaults live in the embedded `config.toml`. A user file in the platform
//! config directory, or one named on the command line, overrides them key by
//! key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{MidiSettings, DEFAULT_PACING_INTERVAL};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Fallback when the embedded config does not set a timeout.
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    midi: MidiConfig,
    #[serde(default)]
    transfer: TransferConfig,
}

#[derive(Deserialize, Default)]
struct MidiConfig {
    client_name: Option<String>,
    input_port: Option<String>,
    output_port: Option<String>,
}

#[derive(Deserialize, Default)]
struct TransferConfig {
    pacing_interval_ms: Option<u64>,
    response_timeout_ms: Option<u64>,
}

/// Error for an explicitly requested config file.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "could not read config: {}", e),
            Self::Parse(e) => write!(f, "malformed config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err)
    }
}

/// Effective settings after merging the user config over the defaults.
pub struct Config {
    midi: MidiConfig,
    transfer: TransferConfig,
}

impl Config {
    /// Embedded defaults overlaid with the user config, if one exists.
    /// A broken user config is logged and skipped.
    pub fn load() -> Self {
        let mut config = Self::embedded();

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => config.merge(user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        config
    }

    /// Embedded defaults overlaid with `path`. Errors are returned, since
    /// the file was asked for by name.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Embedded defaults overlaid with a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let user: ConfigFile = toml::from_str(contents)?;
        let mut config = Self::embedded();
        config.merge(user);
        Ok(config)
    }

    fn embedded() -> Self {
        let base: ConfigFile = match toml::from_str(DEFAULT_CONFIG) {
            Ok(base) => base,
            Err(e) => {
                log::error!(target: "config", "embedded config.toml is invalid: {}", e);
                ConfigFile::default()
            }
        };
        Config {
            midi: base.midi,
            transfer: base.transfer,
        }
    }

    fn merge(&mut self, user: ConfigFile) {
        merge_midi(&mut self.midi, user.midi);
        merge_transfer(&mut self.transfer, user.transfer);
    }

    pub fn midi_settings(&self) -> MidiSettings {
        let fallback = MidiSettings::default();
        MidiSettings {
            client_name: self.midi.client_name.clone().unwrap_or(fallback.client_name),
            input_port: self.midi.input_port.clone().unwrap_or(fallback.input_port),
            output_port: self.midi.output_port.clone().unwrap_or(fallback.output_port),
        }
    }

    /// Spacing between outbound frames (clamped to 1..1000 ms).
    pub fn pacing_interval(&self) -> Duration {
        self.transfer
            .pacing_interval_ms
            .map(|ms| Duration::from_millis(ms.clamp(1, 1000)))
            .unwrap_or(DEFAULT_PACING_INTERVAL)
    }

    /// How long to wait for each dump response.
    pub fn response_timeout(&self) -> Duration {
        self.transfer
            .response_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RESPONSE_TIMEOUT)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("magicstomp-editor").join("config.toml"))
}

fn merge_midi(base: &mut MidiConfig, user: MidiConfig) {
    if user.client_name.is_some() {
        base.client_name = user.client_name;
    }
    if user.input_port.is_some() {
        base.input_port = user.input_port;
    }
    if user.output_port.is_some() {
        base.output_port = user.output_port;
    }
}

fn merge_transfer(base: &mut TransferConfig, user: TransferConfig) {
    if user.pacing_interval_ms.is_some() {
        base.pacing_interval_ms = user.pacing_interval_ms;
    }
    if user.response_timeout_ms.is_some() {
        base.response_timeout_ms = user.response_timeout_ms;
    }
}
