//! Sensor Node - MQTT telemetry publisher
//!
//! A resilient connectivity and publish loop for an energy-monitoring sensor
//! node. Every tick the node makes sure it is associated with the network and
//! holds a live broker session, samples its sensors, assembles one record,
//! encodes it as a size-bounded JSON payload and publishes it.
//!
//! # Overview
//!
//! - [`connectivity`] - network-first recovery state machine with retry policy
//! - [`transport`] - network link and broker session seams plus rumqttc backing
//! - [`sensor`] - channel sources and record assembly
//! - [`encoding`] - size-bounded payload encoding
//! - [`cycle`] - the periodic publish loop
//!
//! # Quick Start
//!
//! ```rust
//! use sensor_node::sensor::{SensorReading, SensorRecord};
//! use sensor_node::encoding::PayloadEncoder;
//!
//! let reading = SensorReading {
//!     voltage: 230.0,
//!     current: 1.5,
//!     energy: 2.8,
//!     temperature: 25.0,
//!     humidity: 55.0,
//!     occupancy: 1,
//! };
//! let record = SensorRecord::assemble("LAB1_NODE1", 1_708_450_000, &reading);
//! assert_eq!(record.power, 345.0);
//!
//! let payload = PayloadEncoder::default().encode(&record).unwrap();
//! assert!(payload.len() <= 256);
//! ```

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod cycle;
pub mod encoding;
pub mod error;
pub mod observability;
pub mod sensor;
pub mod shutdown;
pub mod testing;
pub mod transport;

pub use clock::{FixedClock, SystemClock, TimeSource};
pub use config::{ConfigError, NodeConfig};
pub use connectivity::{ConnectivityError, ConnectivityManager, RetryPolicy};
pub use cycle::{CycleStats, PublishCycle, TickOutcome};
pub use encoding::{EncodeError, PayloadEncoder};
pub use error::{NodeError, NodeResult};
pub use sensor::{SensorReading, SensorRecord, SensorSource};
pub use shutdown::ShutdownSignal;
pub use transport::mqtt::MqttSession;
