//! The channel session: connection setup and event classification.
//!
//! All protocol handling lives in the irc crate; this module only builds
//! the client from our configuration and distills the raw message stream
//! into the three events the bot acts on.

use crate::config::IrcSection;
use crate::error::BotError;
use irc::client::prelude::{ChannelExt, Client, Command, Config, Message, Response};

/// Events the bot acts on, distilled from the raw message stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    /// Registration with the server completed; safe to join channels.
    Registered,
    /// Something was said in a channel we can see.
    Chat {
        channel: String,
        nick: String,
        text: String,
    },
    /// Someone was kicked from a channel.
    Kicked { channel: String, victim: String },
}

/// Map a raw server message to a bot event, if it is one we care about.
///
/// Notices and the remaining numerics are observed but not acted on.
/// Private queries are not scanned either: only channel traffic is
/// bridged.
pub fn classify_message(message: &Message) -> Option<BotEvent> {
    match &message.command {
        Command::Response(Response::RPL_ENDOFMOTD, _)
        | Command::Response(Response::ERR_NOMOTD, _) => Some(BotEvent::Registered),
        Command::PRIVMSG(target, text) if target.is_channel_name() => {
            let nick = message.source_nickname()?.to_string();
            Some(BotEvent::Chat {
                channel: target.clone(),
                nick,
                text: text.clone(),
            })
        }
        Command::KICK(channel, victim, _) => Some(BotEvent::Kicked {
            channel: channel.clone(),
            victim: victim.clone(),
        }),
        _ => None,
    }
}

/// Translate our config into the irc crate's.
///
/// No auto-join list on purpose: joining is the presence manager's job,
/// which also covers rejoining after a kick.
pub fn client_config(config: &IrcSection) -> Config {
    Config {
        server: Some(config.server.clone()),
        port: Some(config.port),
        nickname: Some(config.nickname.clone()),
        username: Some(config.username.clone()),
        realname: Some(config.realname.clone()),
        use_tls: Some(config.use_tls),
        ..Config::default()
    }
}

/// Connect to the server and start registration.
pub async fn connect(config: &IrcSection) -> Result<Client, BotError> {
    if config.server.trim().is_empty() {
        return Err(BotError::IrcSetup("server must not be empty".to_string()));
    }
    if config.nickname.trim().is_empty() {
        return Err(BotError::IrcSetup("nickname must not be empty".to_string()));
    }

    let client = Client::from_config(client_config(config))
        .await
        .map_err(BotError::IrcConnect)?;
    client.identify().map_err(BotError::IrcConnect)?;
    Ok(client)
}

impl crate::presence::JoinSink for Client {
    fn request_join(&self, channel: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.send_join(channel).map_err(|e| Box::new(e) as _)
    }
}
