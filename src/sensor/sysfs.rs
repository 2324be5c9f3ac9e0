//! Hardware-backed source reading numeric attribute files
//!
//! Linux exposes ADC and environmental sensors as text attributes under
//! `/sys/class/hwmon` and `/sys/bus/iio/devices`. Each channel is bound to
//! one such file plus a linear calibration (`raw * scale + offset`).

use super::{Channel, SensorError, SensorSource};
use crate::config::ChannelBinding;
use std::collections::BTreeMap;
use tracing::trace;

pub struct SysfsSource {
    bindings: BTreeMap<Channel, ChannelBinding>,
}

impl SysfsSource {
    pub fn new(bindings: BTreeMap<Channel, ChannelBinding>) -> Self {
        Self { bindings }
    }

    /// Build from the `[sensors.channels]` table, ignoring unknown names
    pub fn from_config(channels: &BTreeMap<String, ChannelBinding>) -> Self {
        let bindings = Channel::ALL
            .into_iter()
            .filter_map(|channel| {
                channels
                    .get(channel.name())
                    .map(|binding| (channel, binding.clone()))
            })
            .collect();
        Self::new(bindings)
    }
}

#[async_trait::async_trait]
impl SensorSource for SysfsSource {
    async fn read_channel(&mut self, channel: Channel) -> Result<f64, SensorError> {
        let binding = self
            .bindings
            .get(&channel)
            .ok_or(SensorError::Unbound(channel))?;

        let raw = tokio::fs::read_to_string(&binding.path)
            .await
            .map_err(|source| SensorError::Read {
                channel,
                path: binding.path.clone(),
                source,
            })?;

        let trimmed = raw.trim();
        let value: f64 = trimmed.parse().map_err(|_| SensorError::Parse {
            channel,
            raw: trimmed.to_string(),
        })?;

        let calibrated = value * binding.scale + binding.offset;
        trace!(%channel, raw = value, calibrated, "Read sensor channel");
        Ok(calibrated)
    }
}
