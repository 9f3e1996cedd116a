//! Channel presence: keep the bot in its configured channel.
//!
//! Purely reactive, no cached membership state. A join is issued on every
//! registration and on every kick observed in the channel; the server
//! treats a redundant join as a no-op, so there is nothing to track.

use thiserror::Error;
use tracing::{debug, info};

/// Anything that can submit a join request, fire and forget.
///
/// The IRC session implements this; tests use a recording stub.
pub trait JoinSink {
    fn request_join(&self, channel: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Raised when a join request cannot even be submitted. The caller treats
/// this as fatal; there is no retry.
#[derive(Debug, Error)]
#[error("failed to submit join for {channel}: {source}")]
pub struct PresenceError {
    pub channel: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// Keeps the bot joined to one channel.
pub struct ChannelPresence {
    channel: String,
}

impl ChannelPresence {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Join the channel once registration with the server completes.
    pub fn on_registered<S: JoinSink + ?Sized>(&self, sink: &S) -> Result<(), PresenceError> {
        info!(channel = %self.channel, "registered, joining channel");
        self.join(sink)
    }

    /// React to a kick observed in a channel.
    ///
    /// The victim may be someone else entirely; rejoining anyway is
    /// harmless and saves tracking who was kicked. Kicks in channels we do
    /// not care about are ignored.
    pub fn on_kick<S: JoinSink + ?Sized>(
        &self,
        sink: &S,
        channel: &str,
        victim: &str,
    ) -> Result<(), PresenceError> {
        if !channel.eq_ignore_ascii_case(&self.channel) {
            debug!(%channel, %victim, "kick in a foreign channel, ignoring");
            return Ok(());
        }
        info!(channel = %self.channel, %victim, "kick seen, rejoining channel");
        self.join(sink)
    }

    fn join<S: JoinSink + ?Sized>(&self, sink: &S) -> Result<(), PresenceError> {
        sink.request_join(&self.channel)
            .map_err(|source| PresenceError {
                channel: self.channel.clone(),
                source,
            })
    }
}
