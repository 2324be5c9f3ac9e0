//! Impure I/O operations for the MQTT session
//!
//! The rumqttc event loop is only driven from inside this type's methods, so
//! the node stays a single sequential loop with no background task.

use super::connection::{
    classify_connection_error, configure_mqtt_options, route_event, ConnectionState,
    SessionEvent, SessionSettings,
};
use crate::mqtt_span;
use crate::transport::{BrokerSession, SessionFault};
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

/// Upper bound on events drained by one `poll()`
const MAX_EVENTS_PER_POLL: usize = 32;

/// MQTT broker session backed by rumqttc
pub struct MqttSession {
    settings: SessionSettings,
    client: Option<AsyncClient>,
    event_loop: Option<EventLoop>,
    state: ConnectionState,
    last_error: Option<SessionFault>,
}

impl MqttSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            client: None,
            event_loop: None,
            state: ConnectionState::Idle,
            last_error: None,
        }
    }

    /// Get current connection state
    pub fn connection_state(&self) -> &ConnectionState {
        &self.state
    }

    fn fail(&mut self, fault: SessionFault) -> SessionFault {
        if matches!(self.state, ConnectionState::Connected) {
            warn!(error = %fault, "MQTT session lost");
        }
        self.state = ConnectionState::Disconnected(fault.to_string());
        self.last_error = Some(fault.clone());
        fault
    }

    /// Drive the event loop until `done` matches an event or the deadline passes
    async fn drive_until<F>(&mut self, deadline: Duration, mut done: F) -> Result<(), SessionFault>
    where
        F: FnMut(&SessionEvent) -> Option<Result<(), SessionFault>>,
    {
        let event_loop = self.event_loop.as_mut().ok_or(SessionFault::NotConnected)?;

        let outcome = tokio::time::timeout(deadline, async {
            loop {
                match event_loop.poll().await {
                    Ok(event) => {
                        let route = route_event(&event);
                        if route == SessionEvent::Disconnected {
                            return Err(SessionFault::Network(
                                "broker closed the session".to_string(),
                            ));
                        }
                        if let Some(result) = done(&route) {
                            return result;
                        }
                    }
                    Err(e) => return Err(classify_connection_error(&e)),
                }
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(SessionFault::Timeout),
        }
    }
}

#[async_trait::async_trait]
impl BrokerSession for MqttSession {
    async fn connect(&mut self, client_id: &str) -> Result<(), SessionFault> {
        // Each attempt gets a fresh client; a stale event loop would keep
        // retrying with the previous identity.
        self.client = None;
        self.event_loop = None;

        let mqtt_options = configure_mqtt_options(client_id, &self.settings);
        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);
        self.client = Some(client);
        self.event_loop = Some(event_loop);

        let deadline = self.settings.ack_timeout;
        let result = self
            .drive_until(deadline, |route| match route {
                SessionEvent::Accepted => Some(Ok(())),
                SessionEvent::Refused(code) => Some(Err(SessionFault::Refused(code.clone()))),
                _ => None,
            })
            .await;

        match result {
            Ok(()) => {
                info!(
                    client_id,
                    broker = %format!("{}:{}", self.settings.host, self.settings.port),
                    "MQTT session established"
                );
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(fault) => {
                self.client = None;
                self.event_loop = None;
                Err(self.fail(fault))
            }
        }
    }

    fn connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected)
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionFault> {
        if !self.connected() {
            return Err(SessionFault::NotConnected);
        }
        let client = self.client.as_ref().ok_or(SessionFault::NotConnected)?;

        if let Err(e) = client.try_publish(topic, QoS::AtLeastOnce, false, payload.to_vec()) {
            let fault = SessionFault::Rejected(e.to_string());
            self.last_error = Some(fault.clone());
            return Err(fault);
        }

        let deadline = self.settings.ack_timeout;
        match self
            .drive_until(deadline, |route| match route {
                SessionEvent::PublishAcknowledged => Some(Ok(())),
                _ => None,
            })
            .instrument(mqtt_span!(topic, qos = 1u8))
            .await
        {
            Ok(()) => {
                debug!(topic, bytes = payload.len(), "Publish acknowledged");
                Ok(())
            }
            Err(SessionFault::Timeout) => {
                // The session may still be healthy, only this ack is late
                self.last_error = Some(SessionFault::Timeout);
                Err(SessionFault::Timeout)
            }
            Err(fault) => Err(self.fail(fault)),
        }
    }

    async fn poll(&mut self) {
        if !self.connected() {
            return;
        }

        let budget = self.settings.poll_budget;
        for _ in 0..MAX_EVENTS_PER_POLL {
            let Some(event_loop) = self.event_loop.as_mut() else {
                return;
            };
            match tokio::time::timeout(budget, event_loop.poll()).await {
                // Nothing pending within the budget
                Err(_) => return,
                Ok(Ok(event)) => {
                    if route_event(&event) == SessionEvent::Disconnected {
                        self.fail(SessionFault::Network(
                            "broker closed the session".to_string(),
                        ));
                        return;
                    }
                }
                Ok(Err(e)) => {
                    self.fail(classify_connection_error(&e));
                    return;
                }
            }
        }
    }

    fn last_error(&self) -> Option<SessionFault> {
        self.last_error.clone()
    }

    async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if self.connected() {
                let _ = client.try_disconnect();
                let budget = self.settings.poll_budget * 10;
                if let Some(event_loop) = self.event_loop.as_mut() {
                    // Flush the DISCONNECT; the broker hangs up right after
                    let _ = tokio::time::timeout(budget, async {
                        while event_loop.poll().await.is_ok() {}
                    })
                    .await;
                }
                info!("MQTT session closed");
            }
        }
        self.event_loop = None;
        self.state = ConnectionState::Idle;
    }
}
