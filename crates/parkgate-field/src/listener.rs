//! MQTT command-bus subscription loop
//!
//! One long-lived task owns the broker connection. The subscription is
//! (re)issued on every ConnAck so it survives reconnects, and each inbound
//! publish is dispatched on its own task so a slow controller never stalls
//! the event loop.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{subscription_filter, CommandDispatcher};

const REQUEST_CHANNEL_CAPACITY: usize = 64;
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct BusListenerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Restrict the subscription to one facility
    pub parking_code: Option<String>,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
}

impl BusListenerConfig {
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            keep_alive: Duration::from_secs(30),
            parking_code: None,
            reconnect_min: Duration::from_secs(2),
            reconnect_max: Duration::from_secs(60),
        }
    }

    pub fn filter(&self) -> String {
        subscription_filter(self.parking_code.as_deref())
    }
}

/// Doubles `current`, capped at `max`
pub(crate) fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

pub struct BusListener {
    config: BusListenerConfig,
    dispatcher: Arc<CommandDispatcher>,
}

impl BusListener {
    pub fn new(config: BusListenerConfig, dispatcher: Arc<CommandDispatcher>) -> Self {
        Self { config, dispatcher }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        let mut options =
            MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let filter = self.config.filter();
        let mut backoff = self.config.reconnect_min;

        info!(
            host = %self.config.host,
            port = self.config.port,
            %filter,
            "Starting command bus listener"
        );

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(%filter, "Command bus connected, subscribing");
                    backoff = self.config.reconnect_min;
                    if let Err(e) = client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
                        error!(error = %e, "Failed to queue subscription");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        if let Err(e) = dispatcher
                            .handle_message(&publish.topic, &publish.payload)
                            .await
                        {
                            warn!(topic = %publish.topic, error = %e, "Discarded command");
                        }
                    });
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!(pkid = ack.pkid, "Subscription acknowledged");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, retry_in = ?backoff, "Command bus connection error");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = next_backoff(backoff, self.config.reconnect_max);
                }
            }
        }

        Self::disconnect(&client, &mut eventloop, &filter).await;
        info!("Command bus listener stopped");
    }

    async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop, filter: &str) {
        if let Err(e) = client.try_unsubscribe(filter) {
            debug!(error = %e, "Unsubscribe not queued");
        }
        if let Err(e) = client.try_disconnect() {
            debug!(error = %e, "Disconnect not queued");
            return;
        }

        let drain = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_GRACE, drain).await.is_err() {
            debug!("Broker did not confirm disconnect in time");
        }
    }
}
