use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from `~/.gatehop/config.toml`.
///
/// **Security**: this struct never stores the gateway password or one-time
/// code. Those are read from the operator for every attempt.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cues: CuesConfig,
}

impl Config {
    /// Load config from `~/.gatehop/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_default(Self::default_path())
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;
        self.cues.validate()?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gatehop")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

fn default_catalog_path() -> String {
    "output.csv".into()
}

/// How the subordinate remote shell to the gateway is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Gateway-side command that takes the target id as its only argument.
    #[serde(default = "default_launch_command")]
    pub launch_command: String,
    /// Upper bound on each wait for gateway output before the handoff.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub request_tty: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ssh_program: default_ssh_program(),
            port: default_port(),
            launch_command: default_launch_command(),
            wait_timeout_secs: default_wait_timeout_secs(),
            request_tty: true,
        }
    }
}

impl GatewayConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ssh_program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "gateway.ssh_program must not be empty".into(),
            ));
        }
        if self.launch_command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "gateway.launch_command must not be empty".into(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::Validation("gateway.port must be non-zero".into()));
        }
        if self.wait_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "gateway.wait_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_ssh_program() -> String {
    "ssh".into()
}
fn default_port() -> u16 {
    22
}
fn default_launch_command() -> String {
    "launch".into()
}
fn default_wait_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// Prompt texts the gateway is known to print, grouped by reaction.
///
/// Matching is case-sensitive. Within the host-key, password and PIN groups
/// the order of the lists is the match priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuesConfig {
    #[serde(default = "default_host_key_cues")]
    pub host_key: Vec<String>,
    #[serde(default = "default_password_cues")]
    pub password: Vec<String>,
    #[serde(default = "default_pin_cues")]
    pub pin: Vec<String>,
    /// Answer sent to the host-key trust question.
    #[serde(default = "default_affirm")]
    pub affirm: String,
}

impl Default for CuesConfig {
    fn default() -> Self {
        Self {
            host_key: default_host_key_cues(),
            password: default_password_cues(),
            pin: default_pin_cues(),
            affirm: default_affirm(),
        }
    }
}

impl CuesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, list) in [
            ("host_key", &self.host_key),
            ("password", &self.password),
            ("pin", &self.pin),
        ] {
            if list.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "cues.{name} must list at least one pattern"
                )));
            }
            if list.iter().any(|p| p.is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "cues.{name} contains an empty pattern"
                )));
            }
        }
        if self.affirm.is_empty() {
            return Err(ConfigError::Validation("cues.affirm must not be empty".into()));
        }
        Ok(())
    }
}

fn default_host_key_cues() -> Vec<String> {
    vec!["Are you sure you want to continue connecting".into()]
}
fn default_password_cues() -> Vec<String> {
    vec!["password:".into(), "Password:".into()]
}
fn default_pin_cues() -> Vec<String> {
    vec!["Pin code:".into(), "PIN:".into()]
}
fn default_affirm() -> String {
    "yes".into()
}
