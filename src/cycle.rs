//! Publish cycle: one sensor record per tick
//!
//! ```text
//! START -> ENSURE_CONNECTED -> ACQUIRE -> ASSEMBLE -> SERIALIZE -> PUBLISH -> SLEEP -> START
//! ```
//!
//! Every path reaches SLEEP. Encode overflow and acquisition failure skip
//! PUBLISH; publish failure is logged and never retried within the tick.

use crate::clock::TimeSource;
use crate::connectivity::{ConnectivityError, ConnectivityManager};
use crate::encoding::{EncodeError, PayloadEncoder};
use crate::sensor::{SensorRecord, SensorSource};
use crate::shutdown::ShutdownSignal;
use crate::tick_span;
use crate::transport::{BrokerSession, NetworkLink};
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

/// What happened during one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Payload handed to the broker and acknowledged
    Published { bytes: usize },
    /// Broker client reported a failure
    PublishFailed,
    /// Encoded record exceeded the payload bound; nothing published
    EncodeOverflow { size: usize, limit: usize },
    /// Sensor source failed; nothing published
    AcquisitionFailed,
    /// Connectivity could not be established this tick
    ConnectivityUnavailable,
}

/// Running counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub ticks: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub encode_overflows: u64,
    pub acquisition_failures: u64,
    pub connectivity_failures: u64,
}

impl CycleStats {
    fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Published { .. } => self.published += 1,
            TickOutcome::PublishFailed => self.publish_failures += 1,
            TickOutcome::EncodeOverflow { .. } => self.encode_overflows += 1,
            TickOutcome::AcquisitionFailed => self.acquisition_failures += 1,
            TickOutcome::ConnectivityUnavailable => self.connectivity_failures += 1,
        }
    }
}

/// Drives the connectivity manager, sensors, encoder and broker once per tick
pub struct PublishCycle<L, S> {
    manager: ConnectivityManager<L, S>,
    sensors: Box<dyn SensorSource>,
    clock: Box<dyn TimeSource>,
    encoder: PayloadEncoder,
    device_id: String,
    topic: String,
    interval: Duration,
    last_timestamp: Option<i64>,
    stats: CycleStats,
}

impl<L: NetworkLink, S: BrokerSession> PublishCycle<L, S> {
    pub fn new(
        manager: ConnectivityManager<L, S>,
        sensors: Box<dyn SensorSource>,
        clock: Box<dyn TimeSource>,
        device_id: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            sensors,
            clock,
            encoder: PayloadEncoder::default(),
            device_id: device_id.into(),
            topic: topic.into(),
            interval: Duration::from_secs(5),
            last_timestamp: None,
            stats: CycleStats::default(),
        }
    }

    pub fn with_encoder(mut self, encoder: PayloadEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn manager(&self) -> &ConnectivityManager<L, S> {
        &self.manager
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run ticks until shutdown is requested, then close the session
    pub async fn run(&mut self, mut shutdown: ShutdownSignal) {
        if self.clock.is_synthetic() {
            warn!("Using a fixed fallback clock; timestamps are not real time");
        }
        info!(
            device_id = %self.device_id,
            topic = %self.topic,
            interval_secs = self.interval.as_secs(),
            "Publish cycle started"
        );

        let mut tick = 0u64;
        loop {
            tick += 1;
            let outcome = self.tick().instrument(tick_span!(tick)).await;

            if outcome == TickOutcome::ConnectivityUnavailable && shutdown.is_requested() {
                break;
            }
            debug!(tick, ?outcome, stats = ?self.stats, "Tick complete");

            if !shutdown.sleep(self.interval).await {
                break;
            }
        }

        self.manager.session_mut().close().await;
        info!(stats = ?self.stats, "Publish cycle stopped");
    }

    /// One iteration, connectivity check through publish (the sleep is the caller's)
    pub async fn tick(&mut self) -> TickOutcome {
        let outcome = self.tick_inner().await;
        self.stats.record(&outcome);
        outcome
    }

    async fn tick_inner(&mut self) -> TickOutcome {
        match self.manager.ensure_connected().await {
            Ok(()) => {}
            Err(ConnectivityError::ShutdownRequested) => {
                return TickOutcome::ConnectivityUnavailable;
            }
            Err(e) => {
                error!(error = %e, "Connectivity unavailable, skipping tick");
                return TickOutcome::ConnectivityUnavailable;
            }
        }

        self.manager.session_mut().poll().await;

        let reading = match self.sensors.acquire().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!(error = %e, "Sensor acquisition failed, skipping publish");
                return TickOutcome::AcquisitionFailed;
            }
        };

        let timestamp = self.next_timestamp();
        let record = SensorRecord::assemble(&self.device_id, timestamp, &reading);

        let payload = match self.encoder.encode(&record) {
            Ok(payload) => payload,
            Err(EncodeError::Overflow { size, limit }) => {
                warn!(size, limit, "Encoded record exceeds payload bound, skipping publish");
                return TickOutcome::EncodeOverflow { size, limit };
            }
            Err(e) => {
                // serde_json only fails on non-string map keys; treat like overflow
                warn!(error = %e, "Record encoding failed, skipping publish");
                return TickOutcome::EncodeOverflow {
                    size: 0,
                    limit: self.encoder.limit(),
                };
            }
        };

        debug!(
            topic = %self.topic,
            payload = %String::from_utf8_lossy(&payload),
            "Publishing message"
        );

        match self
            .manager
            .session_mut()
            .publish(&self.topic, &payload)
            .await
        {
            Ok(()) => TickOutcome::Published {
                bytes: payload.len(),
            },
            Err(fault) => {
                warn!(topic = %self.topic, error = %fault, "Publish failed, not retrying this tick");
                TickOutcome::PublishFailed
            }
        }
    }

    /// Clock reading clamped so timestamps never go backwards
    fn next_timestamp(&mut self) -> i64 {
        let now = self.clock.now();
        let timestamp = match self.last_timestamp {
            Some(last) if now < last => {
                warn!(now, last, "Clock went backwards, holding last timestamp");
                last
            }
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }
}
