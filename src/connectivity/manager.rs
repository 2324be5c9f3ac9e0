//! Connectivity manager: network association first, then the broker session

use super::retry::{RetryDecision, RetryPolicy};
use super::{BrokerState, ConnectivityError, ConnectivityState, NetworkState};
use crate::connectivity_span;
use crate::shutdown::ShutdownSignal;
use crate::transport::{BrokerSession, ClientIdentity, Credentials, NetworkLink};
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

/// Emit a progress line every this many association polls
const ASSOCIATION_PROGRESS_EVERY: u32 = 20;

/// Counters kept across calls for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectStats {
    pub associations: u64,
    pub connect_attempts: u64,
    pub connect_failures: u64,
}

/// Owns the network link and the broker session
pub struct ConnectivityManager<L, S> {
    link: L,
    session: S,
    credentials: Credentials,
    client_id_prefix: String,
    poll_interval: Duration,
    policy: RetryPolicy,
    state: ConnectivityState,
    shutdown: ShutdownSignal,
    stats: ConnectStats,
    last_client_id: Option<ClientIdentity>,
}

impl<L: NetworkLink, S: BrokerSession> ConnectivityManager<L, S> {
    pub fn new(link: L, session: S, credentials: Credentials) -> Self {
        Self {
            link,
            session,
            credentials,
            client_id_prefix: "sensor-node".to_string(),
            poll_interval: Duration::from_millis(500),
            policy: RetryPolicy::default(),
            state: ConnectivityState::default(),
            shutdown: ShutdownSignal::never(),
            stats: ConnectStats::default(),
            last_client_id: None,
        }
    }

    pub fn with_client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_id_prefix = prefix.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn stats(&self) -> ConnectStats {
        self.stats
    }

    /// Identity used by the most recent connect attempt
    pub fn last_client_id(&self) -> Option<&ClientIdentity> {
        self.last_client_id.as_ref()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Wait until both the network and the broker session are up
    ///
    /// The network is checked first on every call, so a radio drop while the
    /// broker still looks connected forces a fresh session.
    pub async fn ensure_connected(&mut self) -> Result<(), ConnectivityError> {
        let mut failures = 0u32;

        if self.state.broker == BrokerState::Connected {
            // Surface a drop that happened since the last call
            self.session.poll().await;
        }

        loop {
            self.ensure_associated().await?;

            if self.state.broker == BrokerState::Connected && self.session.connected() {
                return Ok(());
            }
            if self.state.broker == BrokerState::Connected {
                warn!(
                    error = %self.session.last_error().map(|e| e.to_string()).unwrap_or_default(),
                    "Broker session dropped"
                );
            }
            self.state.broker = BrokerState::Disconnected;

            let attempt = match self.policy.decide(failures) {
                RetryDecision::Attempt { attempt } => attempt,
                RetryDecision::GiveUp => {
                    return Err(ConnectivityError::RetriesExhausted { attempts: failures });
                }
            };

            let client_id = ClientIdentity::generate(&self.client_id_prefix);
            info!(attempt, client_id = %client_id, "Attempting MQTT connection");
            self.stats.connect_attempts += 1;
            let result = self
                .session
                .connect(client_id.as_str())
                .instrument(connectivity_span!(attempt, client_id = %client_id))
                .await;
            self.last_client_id = Some(client_id);

            match result {
                Ok(()) => {
                    self.state.broker = BrokerState::Connected;
                    // Loop once more so the network is confirmed at return time
                }
                Err(fault) => {
                    failures += 1;
                    self.stats.connect_failures += 1;

                    if self.policy.decide(failures) == RetryDecision::GiveUp {
                        warn!(attempt, error = %fault, "MQTT connection failed, giving up for now");
                        return Err(ConnectivityError::RetriesExhausted { attempts: failures });
                    }

                    let delay = self.policy.delay_after(failures);
                    warn!(
                        attempt,
                        error = %fault,
                        retry_in_ms = delay.as_millis() as u64,
                        "MQTT connection failed"
                    );
                    if !self.shutdown.sleep(delay).await {
                        return Err(ConnectivityError::ShutdownRequested);
                    }
                }
            }
        }
    }

    /// Block until the link reports associated; no attempt limit
    async fn ensure_associated(&mut self) -> Result<(), ConnectivityError> {
        if self.shutdown.is_requested() {
            return Err(ConnectivityError::ShutdownRequested);
        }

        if self.link.status().await.is_associated() {
            self.state.network = NetworkState::Associated;
            return Ok(());
        }

        if self.state.network == NetworkState::Associated {
            warn!("Network association lost");
        }
        self.state.network = NetworkState::Disconnected;
        // A session opened over the old association is stale
        self.state.broker = BrokerState::Disconnected;

        info!(ssid = %self.credentials.ssid, "Associating with network");
        let mut status = self.link.associate(&self.credentials).await;
        let mut polls = 0u32;

        while !status.is_associated() {
            if !self.shutdown.sleep(self.poll_interval).await {
                return Err(ConnectivityError::ShutdownRequested);
            }
            polls += 1;
            if polls % ASSOCIATION_PROGRESS_EVERY == 0 {
                debug!(polls, "Still waiting for network association");
            }
            status = self.link.status().await;
        }

        self.state.network = NetworkState::Associated;
        self.stats.associations += 1;
        info!(
            local_address = ?self.link.local_address(),
            polls,
            "Network associated"
        );
        Ok(())
    }
}
