//! Sensor acquisition and record assembly
//!
//! A [`SensorSource`] yields raw channel values; [`SensorRecord::assemble`]
//! turns one [`SensorReading`] into the published record, deriving power.

pub mod record;
pub mod synthetic;
pub mod sysfs;

pub use record::{SensorReading, SensorRecord};
pub use synthetic::SyntheticSource;
pub use sysfs::SysfsSource;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Independently sampled channels; power is derived, never read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Voltage,
    Current,
    Energy,
    Temperature,
    Humidity,
    Occupancy,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Voltage,
        Channel::Current,
        Channel::Energy,
        Channel::Temperature,
        Channel::Humidity,
        Channel::Occupancy,
    ];

    /// Name used in configuration tables
    pub fn name(self) -> &'static str {
        match self {
            Channel::Voltage => "voltage",
            Channel::Current => "current",
            Channel::Energy => "energy",
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Occupancy => "occupancy",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Acquisition errors
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("No binding for channel {0}")]
    Unbound(Channel),
    #[error("Failed to read {channel} from {path}: {source}")]
    Read {
        channel: Channel,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Channel {channel} produced a non-numeric value: {raw:?}")]
    Parse { channel: Channel, raw: String },
    #[error("Channel {channel} produced a non-finite value")]
    NonFinite { channel: Channel },
}

/// Source of raw sensor values
#[async_trait::async_trait]
pub trait SensorSource: Send {
    /// Current value of one channel
    async fn read_channel(&mut self, channel: Channel) -> Result<f64, SensorError>;

    /// Sample every channel once
    async fn acquire(&mut self) -> Result<SensorReading, SensorError> {
        let mut values = [0.0f64; 6];
        for (slot, channel) in values.iter_mut().zip(Channel::ALL) {
            let value = self.read_channel(channel).await?;
            if !value.is_finite() {
                return Err(SensorError::NonFinite { channel });
            }
            *slot = value;
        }
        let [voltage, current, energy, temperature, humidity, occupancy] = values;

        Ok(SensorReading {
            voltage,
            current,
            energy,
            temperature,
            humidity,
            occupancy: occupancy_flag(occupancy),
        })
    }
}

/// Collapse a raw occupancy value into the 0/1 flag
pub fn occupancy_flag(value: f64) -> u8 {
    if value >= 0.5 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedSensorSource;

    #[test]
    fn test_occupancy_flag() {
        assert_eq!(occupancy_flag(0.0), 0);
        assert_eq!(occupancy_flag(0.49), 0);
        assert_eq!(occupancy_flag(0.5), 1);
        assert_eq!(occupancy_flag(1.0), 1);
        assert_eq!(occupancy_flag(3.0), 1);
    }

    #[test]
    fn test_channel_names_are_distinct() {
        let names: std::collections::BTreeSet<&str> =
            Channel::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names.len(), Channel::ALL.len());
    }

    #[tokio::test]
    async fn test_acquire_reads_every_channel() {
        let mut source = FixedSensorSource::new(SensorReading {
            voltage: 230.0,
            current: 1.5,
            energy: 2.8,
            temperature: 25.1,
            humidity: 55.0,
            occupancy: 1,
        });

        let reading = source.acquire().await.unwrap();
        assert_eq!(reading.voltage, 230.0);
        assert_eq!(reading.current, 1.5);
        assert_eq!(reading.occupancy, 1);
        assert_eq!(source.reads(), Channel::ALL.len());
    }

    #[tokio::test]
    async fn test_acquire_rejects_non_finite() {
        let mut source = FixedSensorSource::new(SensorReading {
            voltage: f64::NAN,
            current: 1.5,
            energy: 2.8,
            temperature: 25.1,
            humidity: 55.0,
            occupancy: 0,
        });

        assert!(matches!(
            source.acquire().await,
            Err(SensorError::NonFinite {
                channel: Channel::Voltage
            })
        ));
    }
}
