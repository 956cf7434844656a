//! Configuration management for the co-signer
//!
//! The configuration is a YAML document with a `dapp` section (identity and
//! secrets or seeds) and a `group` section (members and thresholds), plus
//! optional `api`, `poll` and `telemetry` sections. Any key can be overridden
//! from the environment with the `COSIGNER_` prefix and `__` as the section
//! separator, e.g. `COSIGNER_DAPP__PIN`.

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub mod credentials;

pub use credentials::AgentCredentials;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "COSIGNER_";

/// Upper bound the custody service accepts for one page of outputs
pub const MAX_BATCH_LIMIT: usize = 500;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found:: {0}")]
    FileNotFound(String),

    #[error("failed to parse configuration:: {0}")]
    Parse(String),

    #[error("invalid configuration value:: {0}")]
    InvalidValue(String),

    #[error("invalid credentials:: {0}")]
    Credentials(String),

    #[error("key derivation failed:: {0}")]
    Crypto(#[from] cosigner_crypto::CryptoError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dapp: DappConfig,
    pub group: GroupConfig,
    pub api: ApiConfig,
    pub poll: PollConfig,
    pub telemetry: TelemetryConfig,
}

/// Identity of this agent and its secrets, either pre-derived or as seeds
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DappConfig {
    pub client_id: String,
    pub session_id: String,
    /// Base64 ed25519 keypair (seed || public key)
    pub private_key: String,
    /// Base64 X25519 public key of the custody service
    pub pin_token: String,
    pub pin: String,
    /// Hex seed the PIN is derived from
    pub pin_seed: String,
    /// Hex seed the session keypair is derived from
    pub private_key_seed: String,
    /// Hex ed25519 public key of the custody service
    pub server_public_key: String,
}

impl fmt::Debug for DappConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redacted(value: &str) -> &'static str {
            if value.is_empty() {
                ""
            } else {
                "<redacted>"
            }
        }

        f.debug_struct("DappConfig")
            .field("client_id", &self.client_id)
            .field("session_id", &self.session_id)
            .field("private_key", &redacted(&self.private_key))
            .field("pin_token", &self.pin_token)
            .field("pin", &redacted(&self.pin))
            .field("pin_seed", &redacted(&self.pin_seed))
            .field("private_key_seed", &redacted(&self.private_key_seed))
            .field("server_public_key", &self.server_public_key)
            .finish()
    }
}

/// A peer in the custody group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Member {
    pub client_id: String,
}

/// Group membership and thresholds as written in the file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    pub members: Vec<Member>,
    /// Signatures the network requires on the final transaction
    pub threshold: u8,
    /// Existing signatures required before this agent adds its own; 0 means unset
    pub sign_threshold: u8,
}

impl GroupConfig {
    /// Sign threshold after defaulting: unset resolves to `threshold - 1`
    pub fn effective_sign_threshold(&self) -> u8 {
        if self.sign_threshold == 0 && self.threshold > 0 {
            self.threshold - 1
        } else {
            self.sign_threshold
        }
    }

    /// Resolve the group section into the policy the engine runs with
    pub fn policy(&self) -> GroupPolicy {
        let mut members: Vec<String> = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let id = member.client_id.trim();
            if !id.is_empty() && !members.iter().any(|m| m == id) {
                members.push(id.to_string());
            }
        }

        GroupPolicy {
            members,
            threshold: self.threshold,
            sign_threshold: self.effective_sign_threshold(),
        }
    }
}

/// Resolved group policy, fixed for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPolicy {
    /// Member ids in configuration order, without duplicates
    pub members: Vec<String>,
    pub threshold: u8,
    pub sign_threshold: u8,
}

/// Custody service endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mixin.one".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Poll loop pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub batch_limit: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            batch_limit: MAX_BATCH_LIMIT,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Metrics endpoint; disabled when no address is set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub listen_address: Option<SocketAddr>,
}

impl Config {
    /// Load configuration from a YAML file with environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        Self::from_figment(Figment::new().merge(Yaml::file(path)))
    }

    /// Parse configuration from a YAML string with environment overrides
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Self::from_figment(Figment::new().merge(Yaml::string(content)))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let mut config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.group.sign_threshold = config.group.effective_sign_threshold();
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dapp.client_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "dapp.client_id is required".to_string(),
            ));
        }
        if self.dapp.session_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "dapp.session_id is required".to_string(),
            ));
        }

        let policy = self.group.policy();
        if policy.members.is_empty() {
            return Err(ConfigError::InvalidValue(
                "group.members must not be empty".to_string(),
            ));
        }
        if policy.threshold == 0 || policy.threshold as usize > policy.members.len() {
            return Err(ConfigError::InvalidValue(format!(
                "group.threshold must be between 1 and {}, got {}",
                policy.members.len(),
                policy.threshold
            )));
        }
        if policy.sign_threshold > policy.threshold {
            return Err(ConfigError::InvalidValue(format!(
                "group.sign_threshold {} exceeds threshold {}",
                policy.sign_threshold, policy.threshold
            )));
        }

        if self.poll.interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "poll.interval_ms must be positive".to_string(),
            ));
        }
        if self.poll.batch_limit == 0 || self.poll.batch_limit > MAX_BATCH_LIMIT {
            return Err(ConfigError::InvalidValue(format!(
                "poll.batch_limit must be between 1 and {MAX_BATCH_LIMIT}"
            )));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "api.base_url is required".to_string(),
            ));
        }

        Ok(())
    }
}
