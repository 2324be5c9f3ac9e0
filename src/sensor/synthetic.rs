//! Synthetic stand-in values for bench runs without sensor hardware

use super::{Channel, SensorError, SensorSource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draws each channel uniformly from a plausible mains-monitoring range
///
/// Values are quantised the way the bench firmware reports them: one decimal
/// for voltage, temperature and humidity, two for current.
pub struct SyntheticSource {
    rng: StdRng,
    energy: f64,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Reproducible sequence for tests and demos
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self { rng, energy: 2.8 }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SensorSource for SyntheticSource {
    async fn read_channel(&mut self, channel: Channel) -> Result<f64, SensorError> {
        let value = match channel {
            Channel::Voltage => self.rng.gen_range(2200..2300) as f64 / 10.0,
            Channel::Current => self.rng.gen_range(100..200) as f64 / 100.0,
            Channel::Energy => self.energy,
            Channel::Temperature => self.rng.gen_range(240..260) as f64 / 10.0,
            Channel::Humidity => self.rng.gen_range(500..600) as f64 / 10.0,
            Channel::Occupancy => self.rng.gen_range(0..2) as f64,
        };
        Ok(value)
    }
}
