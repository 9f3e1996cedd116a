//! GHBot, an IRC to MQTT bridge bot.
//!
//! The bot sits in a single IRC channel, keeps itself joined, and relays
//! every link posted in the channel to an MQTT topic. Command topics on the
//! broker can be used to speak back into the channel.
//!
//! # Overview
//!
//! One supervisor owns the two outbound connections for the whole process
//! lifetime:
//!
//! - [`session::mqtt`]: the broker session and its supervised event loop
//! - [`session::irc`]: the channel session, driven on the main task
//! - [`scan`]: tokenizing chat lines and picking out candidate URLs
//! - [`relay`]: turning candidates into published link events
//! - [`presence`]: keeping the bot joined to its channel
//!
//! There is deliberately no reconnection logic anywhere. Losing either
//! transport terminates the process with a category-specific exit code and
//! an external process manager restarts it.

pub mod config;
pub mod error;
pub mod observability;
pub mod presence;
pub mod relay;
pub mod scan;
pub mod session;

pub use config::BotConfig;
pub use error::{BotError, BotResult};
pub use session::supervisor::Supervisor;
