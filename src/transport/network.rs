//! Network link backed by the host operating system
//!
//! On a host the radio and association are owned by the OS. The link treats
//! itself as associated while a route to the broker exists: it connects an
//! unbound UDP socket toward the broker endpoint (no packet leaves the host)
//! and reads back the local address the kernel picked.

use super::{Credentials, LinkStatus, NetworkLink};
use std::net::{IpAddr, SocketAddr};
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, info};

pub struct HostLink {
    host: String,
    port: u16,
    local_address: Option<IpAddr>,
    ssid: Option<String>,
}

impl HostLink {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            local_address: None,
            ssid: None,
        }
    }

    /// Resolve the broker and ask the kernel which local address routes to it
    async fn route_to_broker(&self) -> Option<IpAddr> {
        let target: SocketAddr = lookup_host((self.host.as_str(), self.port))
            .await
            .ok()?
            .next()?;

        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await.ok()?;
        socket.connect(target).await.ok()?;
        socket.local_addr().ok().map(|addr| addr.ip())
    }
}

#[async_trait::async_trait]
impl NetworkLink for HostLink {
    async fn associate(&mut self, credentials: &Credentials) -> LinkStatus {
        if self.ssid.as_deref() != Some(credentials.ssid.as_str()) {
            info!(ssid = %credentials.ssid, "Association is managed by the host OS");
            self.ssid = Some(credentials.ssid.clone());
        }
        self.status().await
    }

    async fn status(&mut self) -> LinkStatus {
        match self.route_to_broker().await {
            Some(addr) => {
                self.local_address = Some(addr);
                LinkStatus::Associated
            }
            None => {
                if self.local_address.take().is_some() {
                    debug!(host = %self.host, "No route to broker host");
                }
                LinkStatus::Disconnected
            }
        }
    }

    fn local_address(&self) -> Option<IpAddr> {
        self.local_address
    }
}
