//! Transport layer for the sensor node
//!
//! This module provides the two connectivity abstractions the node depends on,
//! the network link and the broker session, plus their production
//! implementations. Both traits exist to enable dependency injection and
//! testing without a radio or a broker.

use std::fmt;
use std::net::IpAddr;

pub mod identity;
pub mod mqtt;
pub mod network;

pub use identity::ClientIdentity;

/// Association state reported by the network link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Associated,
    Disconnected,
}

impl LinkStatus {
    pub fn is_associated(self) -> bool {
        matches!(self, LinkStatus::Associated)
    }
}

/// Credentials used to join the network
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Failure reported by the broker client
///
/// Surfaced as a diagnostic only; callers never branch on the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFault {
    /// No ConnAck (or no send confirmation) before the deadline
    Timeout,
    /// Broker answered the connect with a failure reason code
    Refused(String),
    /// Underlying socket or protocol error
    Network(String),
    /// Operation requires an established session
    NotConnected,
    /// Client request queue rejected the message
    Rejected(String),
}

impl fmt::Display for SessionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFault::Timeout => write!(f, "timed out"),
            SessionFault::Refused(code) => write!(f, "refused by broker ({code})"),
            SessionFault::Network(reason) => write!(f, "network error: {reason}"),
            SessionFault::NotConnected => write!(f, "not connected"),
            SessionFault::Rejected(reason) => write!(f, "rejected by client: {reason}"),
        }
    }
}

impl std::error::Error for SessionFault {}

/// Network association stack
#[async_trait::async_trait]
pub trait NetworkLink: Send {
    /// Begin associating with the given credentials and report the status right after
    async fn associate(&mut self, credentials: &Credentials) -> LinkStatus;

    /// Current association status
    async fn status(&mut self) -> LinkStatus;

    /// Local address while associated
    fn local_address(&self) -> Option<IpAddr>;
}

/// Message broker session
#[async_trait::async_trait]
pub trait BrokerSession: Send {
    /// Open a session identified by `client_id`, replacing any previous one
    async fn connect(&mut self, client_id: &str) -> Result<(), SessionFault>;

    /// Whether the session is believed to be established
    fn connected(&self) -> bool;

    /// Publish `payload` to `topic`
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionFault>;

    /// Non-blocking transport bookkeeping (keep-alives, acks, disconnect detection)
    async fn poll(&mut self);

    /// Most recent failure, if any
    fn last_error(&self) -> Option<SessionFault>;

    /// Close the session
    async fn close(&mut self);
}
