//! Fake collaborators for testing
//!
//! Provides scripted NetworkLink, BrokerSession and SensorSource
//! implementations so the connectivity state machine and the publish cycle
//! can be exercised without a radio, a broker or sensor hardware. The fakes
//! are cheap to clone and clones share state, so a test can keep a handle
//! after moving one into the code under test.

use crate::sensor::{Channel, SensorError, SensorReading, SensorRecord, SensorSource};
use crate::transport::{BrokerSession, Credentials, LinkStatus, NetworkLink, SessionFault};
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct NetworkInner {
    associated: bool,
    /// `status()` calls after `associate()` before the link comes up
    polls_needed: u32,
    polls_since_associate: Option<u32>,
    associate_calls: u32,
    status_calls: u32,
}

/// Fake network link
#[derive(Debug, Clone, Default)]
pub struct FakeNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

impl FakeNetwork {
    /// Link that is already associated
    pub fn associated() -> Self {
        let network = Self::default();
        lock(&network.inner).associated = true;
        network
    }

    /// Link that needs `associate()` and then `polls` status polls
    pub fn associates_after(polls: u32) -> Self {
        let network = Self::default();
        lock(&network.inner).polls_needed = polls;
        network
    }

    /// Simulate a radio dropout; re-association then takes `polls` polls
    pub fn drop_association(&self, polls: u32) {
        let mut inner = lock(&self.inner);
        inner.associated = false;
        inner.polls_needed = polls;
        inner.polls_since_associate = None;
    }

    pub fn is_associated(&self) -> bool {
        lock(&self.inner).associated
    }

    pub fn associate_calls(&self) -> u32 {
        lock(&self.inner).associate_calls
    }

    pub fn status_calls(&self) -> u32 {
        lock(&self.inner).status_calls
    }
}

#[async_trait]
impl NetworkLink for FakeNetwork {
    async fn associate(&mut self, _credentials: &Credentials) -> LinkStatus {
        let mut inner = lock(&self.inner);
        inner.associate_calls += 1;
        inner.polls_since_associate = Some(0);
        if inner.polls_needed == 0 {
            inner.associated = true;
        }
        status_of(&inner)
    }

    async fn status(&mut self) -> LinkStatus {
        let mut inner = lock(&self.inner);
        inner.status_calls += 1;
        if !inner.associated {
            if let Some(polls) = inner.polls_since_associate.as_mut() {
                *polls += 1;
                if *polls >= inner.polls_needed {
                    inner.associated = true;
                }
            }
        }
        status_of(&inner)
    }

    fn local_address(&self) -> Option<IpAddr> {
        self.is_associated()
            .then(|| IpAddr::from([192u8, 168, 4, 20]))
    }
}

fn status_of(inner: &NetworkInner) -> LinkStatus {
    if inner.associated {
        LinkStatus::Associated
    } else {
        LinkStatus::Disconnected
    }
}

/// One recorded broker connect attempt
#[derive(Debug, Clone)]
pub struct ConnectRecord {
    pub client_id: String,
    pub at: Instant,
    /// Association state of the watched network at the time of the attempt
    pub network_was_up: bool,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct BrokerInner {
    failures_left: u32,
    connected: bool,
    /// Dropped by the broker but not yet observed by the client
    stale: bool,
    fail_publishes: bool,
    closed: bool,
    connects: Vec<ConnectRecord>,
    published: Vec<(String, Vec<u8>)>,
    publish_calls: u32,
    poll_calls: u32,
    last_error: Option<SessionFault>,
}

/// Fake broker session
#[derive(Debug, Clone, Default)]
pub struct FakeBroker {
    inner: Arc<Mutex<BrokerInner>>,
    network: Option<FakeNetwork>,
}

impl FakeBroker {
    /// Broker that accepts every connect
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker that refuses the first `failures` connects
    pub fn failing_first(failures: u32) -> Self {
        let broker = Self::default();
        lock(&broker.inner).failures_left = failures;
        broker
    }

    /// Record the network state on every connect attempt
    pub fn with_network(mut self, network: FakeNetwork) -> Self {
        self.network = Some(network);
        self
    }

    pub fn fail_publishes(&self, fail: bool) {
        lock(&self.inner).fail_publishes = fail;
    }

    /// Simulate the broker dropping the session
    pub fn drop_session(&self) {
        let mut inner = lock(&self.inner);
        inner.connected = false;
        inner.last_error = Some(SessionFault::Network("connection reset".to_string()));
    }

    /// Simulate a drop the client only learns about on its next poll
    pub fn drop_session_unnoticed(&self) {
        lock(&self.inner).stale = true;
    }

    pub fn connect_log(&self) -> Vec<ConnectRecord> {
        lock(&self.inner).connects.clone()
    }

    pub fn client_ids(&self) -> Vec<String> {
        lock(&self.inner)
            .connects
            .iter()
            .map(|record| record.client_id.clone())
            .collect()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.inner).published.clone()
    }

    /// Published payloads decoded back into records
    pub fn published_records(&self) -> Vec<SensorRecord> {
        self.published()
            .iter()
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }

    pub fn publish_calls(&self) -> u32 {
        lock(&self.inner).publish_calls
    }

    pub fn poll_calls(&self) -> u32 {
        lock(&self.inner).poll_calls
    }

    pub fn was_closed(&self) -> bool {
        lock(&self.inner).closed
    }
}

#[async_trait]
impl BrokerSession for FakeBroker {
    async fn connect(&mut self, client_id: &str) -> Result<(), SessionFault> {
        let network_was_up = self
            .network
            .as_ref()
            .map_or(true, FakeNetwork::is_associated);
        let mut inner = lock(&self.inner);

        let succeeded = inner.failures_left == 0;
        inner.connects.push(ConnectRecord {
            client_id: client_id.to_string(),
            at: Instant::now(),
            network_was_up,
            succeeded,
        });

        if succeeded {
            inner.connected = true;
            inner.stale = false;
            inner.closed = false;
            Ok(())
        } else {
            inner.failures_left -= 1;
            inner.connected = false;
            let fault = SessionFault::Refused("ServerUnavailable".to_string());
            inner.last_error = Some(fault.clone());
            Err(fault)
        }
    }

    fn connected(&self) -> bool {
        lock(&self.inner).connected
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionFault> {
        let mut inner = lock(&self.inner);
        inner.publish_calls += 1;
        if !inner.connected {
            return Err(SessionFault::NotConnected);
        }
        if inner.stale {
            let fault = SessionFault::Network("connection reset".to_string());
            inner.connected = false;
            inner.stale = false;
            inner.last_error = Some(fault.clone());
            return Err(fault);
        }
        if inner.fail_publishes {
            let fault = SessionFault::Timeout;
            inner.last_error = Some(fault.clone());
            return Err(fault);
        }
        inner.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn poll(&mut self) {
        let mut inner = lock(&self.inner);
        inner.poll_calls += 1;
        if inner.stale {
            inner.connected = false;
            inner.stale = false;
            inner.last_error = Some(SessionFault::Network("connection reset".to_string()));
        }
    }

    fn last_error(&self) -> Option<SessionFault> {
        lock(&self.inner).last_error.clone()
    }

    async fn close(&mut self) {
        let mut inner = lock(&self.inner);
        inner.connected = false;
        inner.closed = true;
    }
}

/// Sensor source returning the same reading every tick
#[derive(Debug, Clone)]
pub struct FixedSensorSource {
    reading: SensorReading,
    reads: usize,
}

impl FixedSensorSource {
    pub fn new(reading: SensorReading) -> Self {
        Self { reading, reads: 0 }
    }

    /// Number of channel reads served so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}

#[async_trait]
impl SensorSource for FixedSensorSource {
    async fn read_channel(&mut self, channel: Channel) -> Result<f64, SensorError> {
        self.reads += 1;
        let r = &self.reading;
        Ok(match channel {
            Channel::Voltage => r.voltage,
            Channel::Current => r.current,
            Channel::Energy => r.energy,
            Channel::Temperature => r.temperature,
            Channel::Humidity => r.humidity,
            Channel::Occupancy => f64::from(r.occupancy),
        })
    }
}

/// Sensor source whose every read fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSensorSource;

#[async_trait]
impl SensorSource for FailingSensorSource {
    async fn read_channel(&mut self, channel: Channel) -> Result<f64, SensorError> {
        Err(SensorError::Unbound(channel))
    }
}
