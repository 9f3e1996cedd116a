//! The broker session: connection setup, supervised event loop and
//! inbound command routing.
//!
//! The event loop task is spawned once and watched, not detached. Its
//! state is published on a watch channel so the supervisor can treat a
//! dead loop like any other fatal error instead of the task killing the
//! process from the inside. There is no reconnection: the first poll
//! error or broker disconnect marks the session dead for good.

use crate::config::MqttSection;
use crate::relay::topics;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Packet, QoS,
    Transport,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Connection state of the broker session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Waiting for the initial ConnAck.
    Connecting,
    /// ConnAck received, publishes will reach the broker.
    Connected,
    /// The event loop has exited and will not come back.
    Dead(String),
}

/// How an inbound command message should be delivered to the channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SayKind {
    Privmsg,
    Notice,
}

/// A request from the broker side to say something in the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SayCommand {
    pub kind: SayKind,
    pub text: String,
}

/// Errors raised while bringing the broker session up.
#[derive(Debug, Error)]
pub enum MqttSessionError {
    #[error("invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("broker connect failed: {0}")]
    ConnectFailed(String),
    #[error("no ConnAck from broker within {0:?}")]
    ConnAckTimeout(Duration),
}

/// Cheap-to-clone publish handle, shared with the IRC side.
///
/// The underlying rumqttc client is safe to publish from one task while
/// its event loop is polled on another; this wrapper only adds the state
/// check needed to drop publishes instead of queueing them forever.
#[derive(Clone)]
pub struct MqttSession {
    client: AsyncClient,
    state_rx: watch::Receiver<SessionState>,
}

impl MqttSession {
    pub fn new(client: AsyncClient, state_rx: watch::Receiver<SessionState>) -> Self {
        Self { client, state_rx }
    }

    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), SessionState::Connected)
    }

    pub async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), rumqttc::ClientError> {
        self.client.publish(topic, qos, retain, payload).await
    }

    pub async fn disconnect(&self) -> Result<(), rumqttc::ClientError> {
        self.client.disconnect().await
    }
}

/// The supervised half: owns the event loop task and exposes its death.
pub struct MqttWorker {
    handle: JoinHandle<()>,
    state_rx: watch::Receiver<SessionState>,
}

impl MqttWorker {
    /// Resolve once the event loop has died, with the reason.
    ///
    /// Dead is a terminal state, so this is safe to re-poll from a select
    /// loop without losing the notification.
    pub async fn died(&mut self) -> String {
        loop {
            if let SessionState::Dead(reason) = self.state_rx.borrow().clone() {
                return reason;
            }
            if self.state_rx.changed().await.is_err() {
                return "state channel closed".to_string();
            }
        }
    }

    /// Stop the event loop task on the clean shutdown path.
    pub fn abort(self) {
        self.handle.abort();
    }
}

/// Everything `connect` hands back to the supervisor.
pub struct MqttHandles {
    pub session: MqttSession,
    pub worker: MqttWorker,
    pub commands: mpsc::Receiver<SayCommand>,
}

/// The command topics the bot subscribes to, matched exactly against
/// inbound publishes.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRoutes {
    pub privmsg: String,
    pub notice: String,
}

impl CommandRoutes {
    pub fn for_channel(prefix: &str, channel: &str) -> Self {
        Self {
            privmsg: topics::say_topic(prefix, channel),
            notice: topics::notice_topic(prefix, channel),
        }
    }
}

/// Routing decision for one broker event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// ConnAck with a success code.
    Connected,
    /// An inbound message on one of the command topics.
    Command(SayCommand),
    /// The session is over; carries the reason.
    Fatal(String),
    /// Keepalive traffic, acks and everything else.
    Ignored,
}

/// Pure option construction from config.
pub fn configure_mqtt_options(config: &MqttSection) -> Result<MqttOptions, MqttSessionError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| MqttSessionError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let host = url
        .host_str()
        .ok_or_else(|| MqttSessionError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    let client_id = format!("ghbot-{}", std::process::id());
    let mut options = MqttOptions::new(client_id, host, port);

    if url.scheme() == "mqtts" {
        options.set_transport(Transport::tls_with_default_config());
    }

    options.set_keep_alive(Duration::from_secs(config.keepalive_secs));

    if let Some(username) = config.username() {
        options.set_credentials(username, config.password().unwrap_or_default());
    }

    // Mark the bot offline if the connection drops without a clean exit.
    let status = topics::status_topic(&config.topic_prefix);
    options.set_last_will(LastWill::new(&status, "offline", QoS::AtLeastOnce, true));

    Ok(options)
}

/// Pure routing decision for one broker event.
pub fn route_event(event: &Event, routes: &CommandRoutes) -> EventRoute {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => {
            if ack.code == ConnectReturnCode::Success {
                EventRoute::Connected
            } else {
                EventRoute::Fatal(format!("broker refused connection: {:?}", ack.code))
            }
        }
        Event::Incoming(Packet::Publish(publish)) => {
            // Retained messages are stale commands from before we connected.
            if publish.retain {
                return EventRoute::Ignored;
            }
            let kind = if publish.topic == routes.privmsg {
                Some(SayKind::Privmsg)
            } else if publish.topic == routes.notice {
                Some(SayKind::Notice)
            } else {
                None
            };
            match kind {
                Some(kind) => EventRoute::Command(SayCommand {
                    kind,
                    text: String::from_utf8_lossy(&publish.payload).into_owned(),
                }),
                None => EventRoute::Ignored,
            }
        }
        Event::Incoming(Packet::Disconnect) => {
            EventRoute::Fatal("broker sent DISCONNECT".to_string())
        }
        _ => EventRoute::Ignored,
    }
}

/// Connect to the broker, spawn the supervised event loop and subscribe
/// to the command topics. Fails if no ConnAck arrives within the timeout.
pub async fn connect(
    config: &MqttSection,
    channel: &str,
    connack_timeout: Duration,
) -> Result<MqttHandles, MqttSessionError> {
    let options = configure_mqtt_options(config)?;
    let (client, event_loop) = AsyncClient::new(options, 16);

    let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
    let (command_tx, command_rx) = mpsc::channel(32);
    let routes = CommandRoutes::for_channel(&config.topic_prefix, channel);

    let handle = tokio::spawn(run_event_loop(
        event_loop,
        state_tx,
        command_tx,
        routes.clone(),
    ));

    let mut connack_rx = state_rx.clone();
    wait_for_connack(&mut connack_rx, connack_timeout).await?;

    for topic in [&routes.privmsg, &routes.notice] {
        client
            .subscribe(topic.clone(), QoS::AtLeastOnce)
            .await
            .map_err(|e| {
                MqttSessionError::ConnectFailed(format!("subscribe to {topic} failed: {e}"))
            })?;
        debug!(%topic, "subscribed to command topic");
    }

    Ok(MqttHandles {
        session: MqttSession::new(client, state_rx.clone()),
        worker: MqttWorker { handle, state_rx },
        commands: command_rx,
    })
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    state_tx: watch::Sender<SessionState>,
    commands: mpsc::Sender<SayCommand>,
    routes: CommandRoutes,
) {
    loop {
        match event_loop.poll().await {
            Ok(event) => match route_event(&event, &routes) {
                EventRoute::Connected => {
                    info!("broker session established");
                    let _ = state_tx.send(SessionState::Connected);
                }
                EventRoute::Command(command) => {
                    debug!(kind = ?command.kind, "inbound command from broker");
                    if commands.try_send(command).is_err() {
                        warn!("command channel full or closed, dropping inbound message");
                    }
                }
                EventRoute::Fatal(reason) => {
                    let _ = state_tx.send(SessionState::Dead(reason));
                    return;
                }
                EventRoute::Ignored => {}
            },
            Err(e) => {
                let _ = state_tx.send(SessionState::Dead(e.to_string()));
                return;
            }
        }
    }
}

async fn wait_for_connack(
    state_rx: &mut watch::Receiver<SessionState>,
    timeout: Duration,
) -> Result<(), MqttSessionError> {
    let wait = async {
        loop {
            match state_rx.borrow().clone() {
                SessionState::Connected => return Ok(()),
                SessionState::Dead(reason) => return Err(MqttSessionError::ConnectFailed(reason)),
                SessionState::Connecting => {}
            }
            if state_rx.changed().await.is_err() {
                return Err(MqttSessionError::ConnectFailed(
                    "event loop task ended".to_string(),
                ));
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(MqttSessionError::ConnAckTimeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, Publish};

    fn test_section() -> MqttSection {
        MqttSection::default()
    }

    fn test_routes() -> CommandRoutes {
        CommandRoutes::for_channel("ghbot/", "#test")
    }

    #[test]
    fn options_come_from_broker_url() {
        let mut config = test_section();
        config.broker_url = "mqtt://broker.example.org:2883".to_string();
        config.keepalive_secs = 10;

        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(options.broker_address(), ("broker.example.org".to_string(), 2883));
        assert_eq!(options.keep_alive(), Duration::from_secs(10));
    }

    #[test]
    fn default_port_depends_on_scheme() {
        let mut config = test_section();
        config.broker_url = "mqtt://plain.example.org".to_string();
        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(options.broker_address().1, 1883);

        config.broker_url = "mqtts://tls.example.org".to_string();
        let options = configure_mqtt_options(&config).unwrap();
        assert_eq!(options.broker_address().1, 8883);
    }

    #[test]
    fn invalid_broker_url_is_rejected() {
        let mut config = test_section();
        config.broker_url = "definitely not a url".to_string();
        assert!(matches!(
            configure_mqtt_options(&config),
            Err(MqttSessionError::InvalidBrokerUrl(_))
        ));
    }

    #[test]
    fn command_routes_follow_channel_and_prefix() {
        let routes = test_routes();
        assert_eq!(routes.privmsg, "ghbot/to/irc/test/privmsg");
        assert_eq!(routes.notice, "ghbot/to/irc/test/notice");
    }

    #[test]
    fn successful_connack_routes_to_connected() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        }));
        assert_eq!(route_event(&event, &test_routes()), EventRoute::Connected);
    }

    #[test]
    fn refused_connack_is_fatal() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::BadUserNamePassword,
        }));
        assert!(matches!(
            route_event(&event, &test_routes()),
            EventRoute::Fatal(_)
        ));
    }

    #[test]
    fn publish_on_privmsg_topic_becomes_command() {
        let publish = Publish::new(
            "ghbot/to/irc/test/privmsg",
            QoS::AtMostOnce,
            "hello channel",
        );
        let event = Event::Incoming(Packet::Publish(publish));

        let route = route_event(&event, &test_routes());
        assert_eq!(
            route,
            EventRoute::Command(SayCommand {
                kind: SayKind::Privmsg,
                text: "hello channel".to_string(),
            })
        );
    }

    #[test]
    fn publish_on_notice_topic_becomes_notice_command() {
        let publish = Publish::new("ghbot/to/irc/test/notice", QoS::AtMostOnce, "psst");
        let event = Event::Incoming(Packet::Publish(publish));

        match route_event(&event, &test_routes()) {
            EventRoute::Command(command) => assert_eq!(command.kind, SayKind::Notice),
            other => panic!("expected a notice command, got {other:?}"),
        }
    }

    #[test]
    fn retained_publish_is_ignored() {
        let mut publish = Publish::new("ghbot/to/irc/test/privmsg", QoS::AtMostOnce, "old");
        publish.retain = true;
        let event = Event::Incoming(Packet::Publish(publish));

        assert_eq!(route_event(&event, &test_routes()), EventRoute::Ignored);
    }

    #[test]
    fn publish_on_unknown_topic_is_ignored() {
        let publish = Publish::new("something/else", QoS::AtMostOnce, "noise");
        let event = Event::Incoming(Packet::Publish(publish));

        assert_eq!(route_event(&event, &test_routes()), EventRoute::Ignored);
    }

    #[test]
    fn broker_disconnect_is_fatal() {
        let event = Event::Incoming(Packet::Disconnect);
        assert!(matches!(
            route_event(&event, &test_routes()),
            EventRoute::Fatal(_)
        ));
    }

    #[tokio::test]
    async fn wait_for_connack_resolves_on_connected() {
        let (state_tx, mut state_rx) = watch::channel(SessionState::Connecting);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = state_tx.send(SessionState::Connected);
        });

        let result = wait_for_connack(&mut state_rx, Duration::from_millis(200)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wait_for_connack_fails_on_dead_session() {
        let (state_tx, mut state_rx) = watch::channel(SessionState::Connecting);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = state_tx.send(SessionState::Dead("connection refused".to_string()));
        });

        let result = wait_for_connack(&mut state_rx, Duration::from_millis(200)).await;
        match result {
            Err(MqttSessionError::ConnectFailed(reason)) => {
                assert!(reason.contains("connection refused"));
            }
            other => panic!("expected ConnectFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_for_connack_times_out() {
        let (_state_tx, mut state_rx) = watch::channel(SessionState::Connecting);

        let result = wait_for_connack(&mut state_rx, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(MqttSessionError::ConnAckTimeout(_))));
    }

    #[tokio::test]
    async fn worker_died_reports_terminal_reason() {
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let handle = tokio::spawn(async {});
        let mut worker = MqttWorker { handle, state_rx };

        tokio::spawn(async move {
            let _ = state_tx.send(SessionState::Connected);
            let _ = state_tx.send(SessionState::Dead("poll error".to_string()));
        });

        assert_eq!(worker.died().await, "poll error");
        // Dead is terminal: asking again gives the same answer.
        assert_eq!(worker.died().await, "poll error");
    }

    #[tokio::test]
    async fn session_state_reflects_watch_channel() {
        let options = MqttOptions::new("ghbot-test", "localhost", 1883);
        let (client, _event_loop) = AsyncClient::new(options, 8);
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let session = MqttSession::new(client, state_rx);

        assert!(!session.is_connected());
        state_tx.send(SessionState::Connected).unwrap();
        assert!(session.is_connected());
        assert_eq!(session.state(), SessionState::Connected);
    }
}
