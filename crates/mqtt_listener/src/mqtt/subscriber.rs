use crate::mqtt::topic::{parse_uplink_topic, uplink_topic_filter, DeviceSelector};
use common::domain::{DomainError, DomainResult, UplinkEnvelope, UplinkService};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, SubscribeReasonCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument, Span};

/// Connection and subscription settings for the uplink listener
#[derive(Debug, Clone)]
pub struct MqttListenerConfig {
    /// Broker address, `tcp://host:port`, `mqtt://host:port` or `host[:port]`
    pub broker_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub application_id: String,
    pub device: DeviceSelector,
    pub keep_alive: Duration,
    /// Pause between polls after the connection drops
    pub reconnect_delay: Duration,
}

impl MqttListenerConfig {
    pub fn new(broker_url: impl Into<String>, application_id: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            username: None,
            password: None,
            client_id: format!("lora-sensor-bridge-{}", std::process::id()),
            application_id: application_id.into(),
            device: DeviceSelector::Any,
            keep_alive: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(1),
        }
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn with_device(mut self, device: DeviceSelector) -> Self {
        self.device = device;
        self
    }

    pub fn topic_filter(&self) -> DomainResult<String> {
        uplink_topic_filter(&self.application_id, &self.device)
    }
}

/// Run the uplink listener until the token is cancelled
///
/// Failing to reach the broker before the first ConnAck, or having the
/// subscription rejected, returns an error. Once a session has been
/// established, connection drops are logged and rumqttc reconnects on the
/// next poll; the subscription is re-issued on every ConnAck.
#[instrument(
    name = "mqtt_listener",
    skip_all,
    fields(broker_url = %config.broker_url, client_id = %config.client_id)
)]
pub async fn run_mqtt_listener(
    config: MqttListenerConfig,
    uplink_service: &UplinkService,
    shutdown_token: CancellationToken,
) -> DomainResult<()> {
    let topic = config.topic_filter()?;
    let (host, port) = parse_broker_url(&config.broker_url)?;

    let mut mqtt_options = MqttOptions::new(&config.client_id, host, port);
    mqtt_options.set_keep_alive(config.keep_alive);
    mqtt_options.set_clean_session(true);
    if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
        mqtt_options.set_credentials(username, config.password.clone().unwrap_or_default());
    }

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 10);

    info!(topic = %topic, sink = uplink_service.sink_type(), "starting MQTT listener");

    let mut session_established = false;

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                debug!("shutdown signal received");
                let _ = client.disconnect().await;
                return Ok(());
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        session_established = true;
                        info!("connected to MQTT broker");
                        client.subscribe(&topic, QoS::AtMostOnce).await.map_err(|e| {
                            DomainError::ConnectionError(format!(
                                "failed to subscribe to '{}': {}",
                                topic, e
                            ))
                        })?;
                    }
                    Ok(Event::Incoming(Packet::SubAck(suback))) => {
                        if suback
                            .return_codes
                            .iter()
                            .any(|code| matches!(code, SubscribeReasonCode::Failure))
                        {
                            return Err(DomainError::SubscriptionRejected(topic));
                        }
                        info!(topic = %topic, "subscribed to uplink topic");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        handle_uplink_message(&publish.topic, &publish.payload, uplink_service).await;
                    }
                    Ok(_) => {
                        // Pings, acks and outgoing events
                    }
                    Err(e) if !session_established => {
                        return Err(DomainError::ConnectionError(format!(
                            "failed to connect to {}: {}",
                            config.broker_url, e
                        )));
                    }
                    Err(e) => {
                        warn!(error = %e, "MQTT connection lost, reconnecting");
                        tokio::select! {
                            _ = shutdown_token.cancelled() => return Ok(()),
                            _ = tokio::time::sleep(config.reconnect_delay) => {}
                        }
                    }
                }
            }
        }
    }
}

/// Decode and dispatch one uplink message
///
/// Every failure is logged and the message dropped; nothing here is fatal.
/// Each message gets its own root span rather than nesting under the listener.
pub async fn handle_uplink_message(topic: &str, payload: &[u8], uplink_service: &UplinkService) {
    let span = info_span!(
        parent: Span::none(),
        "mqtt_message",
        topic = %topic,
        payload_size = payload.len(),
        dev_eui = tracing::field::Empty,
    );

    async {
        match parse_uplink_topic(topic) {
            Ok(parsed) => {
                Span::current().record("dev_eui", tracing::field::display(&parsed.dev_eui));
            }
            Err(e) => debug!(error = %e, "topic does not name a device"),
        }

        let envelope = match UplinkEnvelope::from_json(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "failed to decode uplink envelope, skipping message");
                return;
            }
        };

        info!(
            topic = %topic,
            dev_eui = %envelope.dev_eui,
            fport = envelope.fport,
            fcnt = envelope.fcnt,
            rssi = envelope.rssi,
            gateway_count = envelope.gateway_count,
            data_len = envelope.data.len(),
            "received uplink"
        );

        if let Err(e) = uplink_service.process_envelope(&envelope).await {
            error!(error = %e, "failed to process uplink, dropping message");
        }
    }
    .instrument(span)
    .await
}

/// Parse broker URL in format tcp://host:port or mqtt://host:port or host:port
fn parse_broker_url(url: &str) -> DomainResult<(&str, u16)> {
    let url = url.trim_start_matches("tcp://");
    let url = url.trim_start_matches("mqtt://");
    let url = url.trim_end_matches('/');

    let parts: Vec<&str> = url.split(':').collect();
    match parts.as_slice() {
        [host] if !host.is_empty() => Ok((*host, 1883)), // Default MQTT port
        [host, port] if !host.is_empty() => {
            let port = port.parse::<u16>().map_err(|_| {
                DomainError::InvalidBrokerUrl(format!("Invalid port in broker URL: {}", port))
            })?;
            Ok((*host, port))
        }
        _ => Err(DomainError::InvalidBrokerUrl(format!(
            "Invalid broker URL format: {}",
            url
        ))),
    }
}
