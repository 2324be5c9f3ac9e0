//! MQTT broker session for the sensor node
//!
//! The module separates pure functions from I/O operations:
//!
//! - [`connection`] - Pure session configuration, event routing and fault classification
//! - [`client`] - Impure I/O operations driving the rumqttc event loop
//!
//! # Usage
//!
//! ```rust,no_run
//! use sensor_node::transport::mqtt::{MqttSession, SessionSettings};
//! use sensor_node::transport::BrokerSession;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let settings = SessionSettings {
//!     host: "localhost".to_string(),
//!     port: 1883,
//!     keep_alive: Duration::from_secs(60),
//!     ack_timeout: Duration::from_secs(4),
//!     poll_budget: Duration::from_millis(10),
//! };
//!
//! let mut session = MqttSession::new(settings);
//! session.connect("sensor-node-1a2b").await?;
//! session.publish("greenindex/sensors/energy", br#"{"deviceId":"LAB1_NODE1"}"#).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;

// Re-export public types for convenience
pub use client::MqttSession;
pub use connection::{ConnectionState, SessionEvent, SessionSettings};
