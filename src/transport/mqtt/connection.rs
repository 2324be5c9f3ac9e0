//! Pure connection state management for the MQTT session
//!
//! This module contains pure functions for session configuration, event
//! routing and fault classification. No I/O happens here.

use crate::config::MqttSection;
use crate::transport::SessionFault;
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet};
use rumqttc::v5::{ConnectionError, Event, MqttOptions};
use std::time::Duration;

/// Connection state for the MQTT session
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// No session, never connected or closed locally
    Idle,
    /// ConnAck received and no error since
    Connected,
    /// Session lost with reason
    Disconnected(String),
}

/// Session timing knobs derived from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    /// Deadline for ConnAck on connect and PubAck on publish
    pub ack_timeout: Duration,
    /// Budget for one non-blocking `poll()`
    pub poll_budget: Duration,
}

impl SessionSettings {
    pub fn from_config(host: String, port: u16, config: &MqttSection) -> Self {
        Self {
            host,
            port,
            keep_alive: Duration::from_secs(config.keep_alive_secs),
            ack_timeout: Duration::from_millis(config.connect_timeout_ms),
            poll_budget: Duration::from_millis(10),
        }
    }
}

/// Pure function to configure MQTT options for one connect attempt
pub fn configure_mqtt_options(client_id: &str, settings: &SessionSettings) -> MqttOptions {
    let mut mqtt_options = MqttOptions::new(client_id, settings.host.clone(), settings.port);
    mqtt_options.set_keep_alive(settings.keep_alive);
    mqtt_options.set_clean_start(true);
    // Readings are a few hundred bytes; nothing large ever crosses this session
    mqtt_options.set_max_packet_size(Some(16 * 1024));
    mqtt_options
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Broker accepted the session
    Accepted,
    /// Broker answered ConnAck with a failure code
    Refused(String),
    /// QoS 1 publish acknowledged
    PublishAcknowledged,
    /// Broker closed the session
    Disconnected,
    /// Pings, outgoing notifications and anything else
    Bookkeeping,
}

/// Route MQTT event to a session decision (pure routing decision)
pub fn route_event(event: &Event) -> SessionEvent {
    match event {
        Event::Incoming(packet) => match packet {
            Packet::ConnAck(connack) => match connack.code {
                ConnectReturnCode::Success => SessionEvent::Accepted,
                code => SessionEvent::Refused(format!("{code:?}")),
            },
            Packet::PubAck(_) => SessionEvent::PublishAcknowledged,
            Packet::Disconnect(_) => SessionEvent::Disconnected,
            _ => SessionEvent::Bookkeeping,
        },
        Event::Outgoing(_) => SessionEvent::Bookkeeping,
    }
}

/// Classify an event loop error into a diagnostic fault
pub fn classify_connection_error(error: &ConnectionError) -> SessionFault {
    match error {
        ConnectionError::ConnectionRefused(code) => SessionFault::Refused(format!("{code:?}")),
        ConnectionError::Timeout(_) => SessionFault::Timeout,
        other => SessionFault::Network(other.to_string()),
    }
}
