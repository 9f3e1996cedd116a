//! Fatal error taxonomy for the bridge.
//!
//! Every failure category from setup to loop termination gets its own
//! variant and its own process exit code, so an operator watching a process
//! supervisor can tell from the exit status which transport fell over.
//! Nothing here is retried. The policy is to fail fast and let the process
//! manager restart us; the one non-fatal path in the whole bot is a link
//! publish that gets dropped while the broker is unreachable.

use thiserror::Error;

/// Top level error type carried from the supervisor to `main`.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("failed to connect to MQTT broker: {0}")]
    MqttConnect(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("MQTT event loop exited unexpectedly: {0}")]
    MqttLoopExited(String),

    #[error("failed to set up IRC session: {0}")]
    IrcSetup(String),

    #[error("failed to connect to IRC server: {0}")]
    IrcConnect(#[source] irc::error::Error),

    #[error("IRC event loop ended: {0}")]
    IrcRun(String),

    #[error(transparent)]
    Join(#[from] crate::presence::PresenceError),

    #[error("runtime setup failed: {0}")]
    Runtime(#[from] std::io::Error),
}

impl BotError {
    /// Process exit code for this failure category.
    pub fn exit_code(&self) -> i32 {
        match self {
            BotError::Config(_) => 2,
            BotError::MqttConnect(_) => 10,
            BotError::MqttLoopExited(_) => 11,
            BotError::IrcSetup(_) => 20,
            BotError::IrcConnect(_) => 21,
            BotError::IrcRun(_) => 22,
            BotError::Join(_) => 23,
            BotError::Runtime(_) => 70,
        }
    }
}

/// Result type used across the bot.
pub type BotResult<T> = Result<T, BotError>;
