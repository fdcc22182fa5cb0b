//! MQTT link lifecycle
//!
//! ```text
//! Disconnected ──connect()──► Connected ──shutdown()──► (consumed)
//! ```
//!
//! `connect()` spawns the rumqttc event loop on its own task. That task only
//! forwards inbound publishes into the [`Inbox`]; everything else (topic selection,
//! publishing) happens on the polling loop through the [`Messenger`] trait.
//! `shutdown()` stops the network task first and then sends DISCONNECT. A drop
//! guard cancels the network task if the link is dropped without a shutdown.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use statum::{machine, state};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use super::message_manager::{InboundMessage, Inbox};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("MQTT request rejected: {0}")]
    Request(#[from] rumqttc::ClientError),

    #[error("MQTT transport error: {0}")]
    Transport(String),
}

/// Outbound side of the messaging collaborator.
pub trait Messenger {
    fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), MessagingError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), MessagingError>;

    fn unsubscribe(&mut self, topic: &str) -> Result<(), MessagingError>;
}

#[state]
#[derive(Debug, Clone)]
pub enum LinkState {
    Disconnected,
    Connected,
}

#[machine]
pub struct MqttLink<S: LinkState> {
    client: AsyncClient,
    event_loop: Option<EventLoop>,
    worker: Option<JoinHandle<EventLoop>>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl MqttLink<Disconnected> {
    /// Builds the client for `program`; nothing touches the network until
    /// [`connect`](Self::connect).
    pub fn create(config: &MqttConfig, program: &str) -> Self {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", program, std::process::id()));
        info!(
            "Creating MQTT client {} for {}:{}",
            client_id, config.host, config.port
        );

        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        if let Some(user) = &config.user {
            options.set_credentials(user.clone(), config.password.clone().unwrap_or_default());
        }

        let (client, event_loop) = AsyncClient::new(options, config.request_capacity);
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();

        Self::new(client, Some(event_loop), None, token, guard)
    }

    /// Starts the background network loop and returns the queue it delivers into.
    pub fn connect(mut self) -> (MqttLink<Connected>, Inbox) {
        let (sender, inbox) = Inbox::channel();

        if let Some(event_loop) = self.event_loop.take() {
            info!("Starting MQTT network loop");
            self.worker = Some(tokio::spawn(drive_event_loop(
                event_loop,
                sender,
                self.token.clone(),
            )));
        }

        (self.transition(), inbox)
    }
}

impl MqttLink<Connected> {
    /// Stops the network task, then disconnects from the broker.
    pub async fn shutdown(mut self) {
        info!("Stopping MQTT network loop");
        self.token.cancel();

        let event_loop = match self.worker.take() {
            Some(worker) => match worker.await {
                Ok(event_loop) => Some(event_loop),
                Err(e) => {
                    error!("MQTT network task failed: {}", e);
                    None
                }
            },
            None => None,
        };

        info!("Disconnecting from MQTT broker");
        if let Err(e) = self.client.try_disconnect() {
            warn!("Failed to queue MQTT disconnect: {}", e);
            return;
        }

        if let Some(mut event_loop) = event_loop {
            let flush = tokio::time::timeout(DISCONNECT_TIMEOUT, async move {
                loop {
                    match event_loop.poll().await {
                        Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            debug!("Event loop ended while disconnecting: {}", e);
                            break;
                        }
                    }
                }
            })
            .await;
            if flush.is_err() {
                warn!("Timed out waiting for MQTT disconnect to be sent");
            }
        }
    }
}

impl Messenger for MqttLink<Connected> {
    fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), MessagingError> {
        self.client.try_publish(topic, qos, retain, payload)?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), MessagingError> {
        debug!("Subscribing to {}", topic);
        self.client.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), MessagingError> {
        debug!("Unsubscribing from {}", topic);
        self.client.try_unsubscribe(topic)?;
        Ok(())
    }
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    inbox: mpsc::UnboundedSender<InboundMessage>,
    token: CancellationToken,
) -> EventLoop {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("MQTT network loop cancelled");
                break;
            }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage::from_topic(publish.topic, publish.payload.to_vec());
                    debug!("Received message: {}", message);
                    if inbox.send(message).is_err() {
                        warn!("Inbox closed, dropping inbound message");
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("Connected to MQTT broker ({:?})", ack.code);
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    info!("Subscription {} acknowledged: {:?}", ack.pkid, ack.return_codes);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT connection error: {}", e);
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!("MQTT network loop cancelled while waiting to reconnect");
                            break;
                        }
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }
    event_loop
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn unreachable_broker() -> MqttConfig {
        MqttConfig {
            port: 1,
            client_id: Some("sensehat-telemetry-test".to_string()),
            ..MqttConfig::default()
        }
    }

    #[tokio::test]
    async fn shutdown_finishes_when_broker_is_unreachable() {
        let (link, _inbox) = MqttLink::create(&unreachable_broker(), "test").connect();
        // let the network task hit the refused connection and start waiting
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        let finished = tokio::time::timeout(Duration::from_secs(5), link.shutdown()).await;

        assert!(finished.is_ok(), "shutdown did not return");
        assert!(
            started.elapsed() < DISCONNECT_TIMEOUT + Duration::from_millis(500),
            "shutdown took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn dropping_a_connected_link_cancels_the_network_task() {
        let (mut link, _inbox) = MqttLink::create(&unreachable_broker(), "test").connect();
        let token = link.token.clone();
        let worker = link.worker.take().unwrap();
        assert!(!token.is_cancelled());

        drop(link);

        assert!(token.is_cancelled());
        let joined = tokio::time::timeout(Duration::from_secs(1), worker).await;
        assert!(matches!(joined, Ok(Ok(_))), "network task did not stop");
    }
}
