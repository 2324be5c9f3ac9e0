//! Connection-resilience state machine
//!
//! The [`ConnectivityManager`] owns the network link and the broker session
//! and restores both on demand. [`RetryPolicy`] holds the pure backoff logic
//! so it can be tested without any I/O.

pub mod manager;
pub mod retry;

pub use manager::{ConnectStats, ConnectivityManager};
pub use retry::{Backoff, RetryDecision, RetryPolicy};

use thiserror::Error;

/// Network association half of the connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkState {
    #[default]
    Disconnected,
    Associated,
}

/// Broker session half of the connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrokerState {
    #[default]
    Disconnected,
    Connected,
}

/// Both halves, as last observed by the manager
///
/// `broker == Connected` implies `network == Associated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectivityState {
    pub network: NetworkState,
    pub broker: BrokerState,
}

impl ConnectivityState {
    pub fn is_fully_connected(&self) -> bool {
        self.network == NetworkState::Associated && self.broker == BrokerState::Connected
    }
}

/// Why `ensure_connected` returned without a usable session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectivityError {
    #[error("Broker connection gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("Shutdown requested while waiting for connectivity")]
    ShutdownRequested,
}
