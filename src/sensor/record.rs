//! Published sensor record

use serde::{Deserialize, Serialize};

/// Values sampled from the sensors in one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub voltage: f64,
    pub current: f64,
    pub energy: f64,
    pub temperature: f64,
    pub humidity: f64,
    /// 0 or 1
    pub occupancy: u8,
}

/// One reading as published; field order is the wire key order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRecord {
    pub device_id: String,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub voltage: f64,
    pub current: f64,
    /// Always `voltage * current` of this record
    pub power: f64,
    pub energy: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub occupancy: u8,
}

impl SensorRecord {
    /// Build the record for one tick; power is derived here and nowhere else
    pub fn assemble(device_id: &str, timestamp: i64, reading: &SensorReading) -> Self {
        Self {
            device_id: device_id.to_string(),
            timestamp,
            voltage: reading.voltage,
            current: reading.current,
            power: reading.voltage * reading.current,
            energy: reading.energy,
            temperature: reading.temperature,
            humidity: reading.humidity,
            occupancy: reading.occupancy.min(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reading(voltage: f64, current: f64) -> SensorReading {
        SensorReading {
            voltage,
            current,
            energy: 2.8,
            temperature: 25.0,
            humidity: 55.0,
            occupancy: 1,
        }
    }

    #[test]
    fn test_power_is_derived() {
        let record = SensorRecord::assemble("LAB1_NODE1", 1_708_450_000, &reading(230.0, 1.5));
        assert_eq!(record.power, 345.0);
        assert_eq!(record.device_id, "LAB1_NODE1");
        assert_eq!(record.timestamp, 1_708_450_000);
    }

    #[test]
    fn test_occupancy_is_clamped_to_flag() {
        let mut raw = reading(230.0, 1.5);
        raw.occupancy = 7;
        let record = SensorRecord::assemble("LAB1_NODE1", 0, &raw);
        assert_eq!(record.occupancy, 1);
    }

    #[test]
    fn test_wire_field_names() {
        let record = SensorRecord::assemble("LAB1_NODE1", 1, &reading(230.0, 1.5));
        let value = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        for expected in [
            "deviceId",
            "timestamp",
            "voltage",
            "current",
            "power",
            "energy",
            "temperature",
            "humidity",
            "occupancy",
        ] {
            assert!(keys.contains(&expected), "missing key {expected}");
        }
        assert_eq!(keys.len(), 9);
    }

    proptest! {
        #[test]
        fn prop_power_equals_voltage_times_current(
            voltage in 0.0f64..500.0,
            current in 0.0f64..100.0,
        ) {
            let record = SensorRecord::assemble("node", 0, &reading(voltage, current));
            prop_assert_eq!(record.power, record.voltage * record.current);
        }
    }
}
