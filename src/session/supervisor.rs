//! The session supervisor: owns both connections for the process
//! lifetime and runs the bridge until something fatal happens.
//!
//! Startup order matters: the broker comes up first so that no channel
//! event is ever processed without a publish handle, then the IRC session
//! is driven on this task. Either transport failing at any point ends the
//! process; restart policy belongs to whatever supervises the process.

use crate::config::BotConfig;
use crate::error::{BotError, BotResult};
use crate::presence::ChannelPresence;
use crate::relay::topics;
use crate::relay::{LinkEvent, LinkPublisher};
use crate::scan::scan_for_links;
use crate::session::irc::{classify_message, BotEvent};
use crate::session::mqtt::{MqttHandles, MqttSession, SayCommand, SayKind};
use crate::session::{irc, mqtt};
use ::irc::client::prelude::{Client, Message};
use chrono::Utc;
use futures::StreamExt;
use rumqttc::QoS;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

/// How long to wait for the broker's ConnAck at startup.
const CONNACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle phases, logged as the supervisor moves through startup.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    MqttConnecting,
    MqttConnected,
    IrcConnecting,
    Running,
}

pub struct Supervisor {
    config: BotConfig,
}

impl Supervisor {
    pub fn new(config: BotConfig) -> Self {
        Self { config }
    }

    /// Run the bridge until a fatal error or a shutdown signal.
    pub async fn run(self) -> BotResult<()> {
        let config = &self.config;
        let status_topic = topics::status_topic(&config.mqtt.topic_prefix);

        info!(
            phase = ?Phase::MqttConnecting,
            broker = %config.mqtt.broker_url,
            "connecting to MQTT broker"
        );
        let MqttHandles {
            session: mqtt_session,
            mut worker,
            mut commands,
        } = mqtt::connect(&config.mqtt, &config.irc.channel, CONNACK_TIMEOUT)
            .await
            .map_err(|e| BotError::MqttConnect(Box::new(e)))?;
        info!(phase = ?Phase::MqttConnected, "broker session up");

        publish_availability(&mqtt_session, &status_topic, "online").await;

        let publisher = LinkPublisher::new(
            mqtt_session.clone(),
            topics::links_topic(&config.mqtt.topic_prefix),
            Duration::from_millis(config.mqtt.publish_timeout_ms),
        );
        let presence = ChannelPresence::new(config.irc.channel.clone());

        info!(
            phase = ?Phase::IrcConnecting,
            server = %config.irc.server,
            port = config.irc.port,
            nick = %config.irc.nickname,
            "connecting to IRC server"
        );
        let mut client = irc::connect(&config.irc).await?;
        let mut stream = client
            .stream()
            .map_err(|e| BotError::IrcSetup(e.to_string()))?;
        info!(phase = ?Phase::Running, channel = %config.irc.channel, "bridge running");

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let fatal = loop {
            tokio::select! {
                maybe_message = stream.next() => {
                    match maybe_message {
                        Some(Ok(message)) => {
                            handle_irc_message(&client, &presence, &publisher, message).await?;
                        }
                        Some(Err(e)) => break Some(BotError::IrcRun(e.to_string())),
                        None => break Some(BotError::IrcRun(
                            "server closed the connection".to_string(),
                        )),
                    }
                }
                Some(command) = commands.recv() => {
                    deliver_say(&client, &config.irc.channel, command);
                }
                reason = worker.died() => {
                    break Some(BotError::MqttLoopExited(reason));
                }
                _ = sigint.recv() => {
                    info!("SIGINT received, shutting down");
                    break None;
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received, shutting down");
                    break None;
                }
            }
        };

        match fatal {
            Some(error) => Err(error),
            None => {
                // Clean shutdown: say goodbye on the status topic so the
                // Last Will never has to fire.
                publish_availability(&mqtt_session, &status_topic, "offline").await;
                let _ = mqtt_session.disconnect().await;
                worker.abort();
                Ok(())
            }
        }
    }
}

/// Publish a retained availability marker, best effort.
async fn publish_availability(session: &MqttSession, topic: &str, state: &str) {
    if let Err(e) = session
        .publish(topic, QoS::AtLeastOnce, true, state.as_bytes().to_vec())
        .await
    {
        warn!(error = %e, %topic, "failed to publish availability marker");
    }
}

/// Dispatch one raw IRC message.
///
/// Join submission failures are the only fatal outcome here; everything
/// on the relay side degrades to a logged drop.
async fn handle_irc_message(
    client: &Client,
    presence: &ChannelPresence,
    publisher: &LinkPublisher,
    message: Message,
) -> BotResult<()> {
    let Some(event) = classify_message(&message) else {
        return Ok(());
    };

    match event {
        BotEvent::Registered => presence.on_registered(client)?,
        BotEvent::Kicked { channel, victim } => presence.on_kick(client, &channel, &victim)?,
        BotEvent::Chat {
            channel,
            nick,
            text,
        } => {
            for url in scan_for_links(&text) {
                let event = LinkEvent {
                    url: url.to_string(),
                    channel: channel.clone(),
                    nick: nick.clone(),
                    at: Utc::now(),
                };
                publisher.publish(&event).await;
            }
        }
    }

    Ok(())
}

/// Deliver a broker-originated message into the channel.
///
/// A failed send is logged and dropped; if the connection is actually
/// gone, the stream will error out and end the process anyway.
fn deliver_say(client: &Client, channel: &str, command: SayCommand) {
    let result = match command.kind {
        SayKind::Privmsg => client.send_privmsg(channel, &command.text),
        SayKind::Notice => client.send_notice(channel, &command.text),
    };
    if let Err(e) = result {
        warn!(error = %e, %channel, "failed to deliver broker message to channel");
    }
}
