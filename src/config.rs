//! Configuration for the bridge.
//!
//! Loaded from a TOML file with every field defaulted, so the binary also
//! runs with no configuration file at all (the defaults match the channel
//! the bot historically lived in). Credentials never appear in the file;
//! the config names environment variables and they are resolved when the
//! broker session is built.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Top level configuration, one section per remote service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    #[serde(default)]
    pub irc: IrcSection,
    #[serde(default)]
    pub mqtt: MqttSection,
}

/// IRC side: where to connect and who to be.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IrcSection {
    #[serde(default = "default_irc_server")]
    pub server: String,
    #[serde(default = "default_irc_port")]
    pub port: u16,
    /// The one channel the bot lives in.
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    #[serde(default)]
    pub use_tls: bool,
}

/// MQTT side: broker address and topic layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL, `mqtt://` or `mqtts://`.
    #[serde(default = "default_broker_url")]
    pub broker_url: String,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Prefix for every topic the bot touches.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Environment variable holding the broker username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_env: Option<String>,
    /// Environment variable holding the broker password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
    /// Upper bound on how long one publish may hold up chat processing.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

fn default_irc_server() -> String {
    "irc.knageroe.nl".to_string()
}

fn default_irc_port() -> u16 {
    6667
}

fn default_channel() -> String {
    "#test".to_string()
}

fn default_nickname() -> String {
    "ghbot".to_string()
}

fn default_username() -> String {
    "ghbot".to_string()
}

fn default_realname() -> String {
    "GHBot".to_string()
}

fn default_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_keepalive_secs() -> u64 {
    10
}

fn default_topic_prefix() -> String {
    "ghbot/".to_string()
}

fn default_publish_timeout_ms() -> u64 {
    5000
}

impl Default for IrcSection {
    fn default() -> Self {
        Self {
            server: default_irc_server(),
            port: default_irc_port(),
            channel: default_channel(),
            nickname: default_nickname(),
            username: default_username(),
            realname: default_realname(),
            use_tls: false,
        }
    }
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            keepalive_secs: default_keepalive_secs(),
            topic_prefix: default_topic_prefix(),
            username_env: None,
            password_env: None,
            publish_timeout_ms: default_publish_timeout_ms(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to format TOML: {0}")]
    TomlFormat(#[from] toml::ser::Error),
    #[error("channel name must start with '#' or '&', got '{0}'")]
    InvalidChannel(String),
    #[error("topic prefix must not contain MQTT wildcards: '{0}'")]
    InvalidTopicPrefix(String),
    #[error("invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("nickname must not be empty")]
    EmptyNickname,
}

impl BotConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BotConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the rest of the bot relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.irc.channel.starts_with(['#', '&']) {
            return Err(ConfigError::InvalidChannel(self.irc.channel.clone()));
        }
        if self.irc.nickname.trim().is_empty() {
            return Err(ConfigError::EmptyNickname);
        }
        if self.mqtt.topic_prefix.contains(['#', '+']) {
            return Err(ConfigError::InvalidTopicPrefix(
                self.mqtt.topic_prefix.clone(),
            ));
        }
        let url = Url::parse(&self.mqtt.broker_url)
            .map_err(|_| ConfigError::InvalidBrokerUrl(self.mqtt.broker_url.clone()))?;
        if !matches!(url.scheme(), "mqtt" | "mqtts") || url.host_str().is_none() {
            return Err(ConfigError::InvalidBrokerUrl(self.mqtt.broker_url.clone()));
        }
        Ok(())
    }
}

impl MqttSection {
    fn env_var(name: Option<&String>) -> Option<String> {
        name.and_then(|name| std::env::var(name).ok())
    }

    /// Broker username from the configured environment variable.
    pub fn username(&self) -> Option<String> {
        Self::env_var(self.username_env.as_ref())
    }

    /// Broker password from the configured environment variable.
    pub fn password(&self) -> Option<String> {
        Self::env_var(self.password_env.as_ref())
    }
}
