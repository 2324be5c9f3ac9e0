//! Configuration system for the sensor node
//!
//! Everything the node needs to know about its deployment lives here: device
//! identity, network credentials, broker endpoint, publish cadence, retry
//! policy, clock and sensor selection. Secrets are referenced by environment
//! variable name and resolved at runtime.

use crate::connectivity::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Main node configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    pub device: DeviceSection,
    pub network: NetworkSection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub publish: PublishSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub clock: ClockSection,
    #[serde(default)]
    pub sensors: SensorsSection,
}

/// Device identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier published in every record (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Prefix for the per-attempt broker client identity
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
}

fn default_client_id_prefix() -> String {
    "sensor-node".to_string()
}

/// Network association section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// Network name to associate with
    pub ssid: String,
    /// Environment variable containing the network passphrase
    pub password_env: Option<String>,
    /// Delay between association status polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// MQTT broker section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// MQTT broker URL with protocol and port
    pub broker_url: String,
    /// Fixed publish topic
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// How long a single connect attempt may wait for ConnAck
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_topic() -> String {
    "greenindex/sensors/energy".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_connect_timeout_ms() -> u64 {
    4000
}

/// Publish cadence and payload bound
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishSection {
    /// Sleep between ticks in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Largest encoded payload that may be published, in bytes
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_max_payload_bytes() -> usize {
    256
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

/// Broker reconnect policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RetrySection {
    /// Maximum broker connect attempts per round (absent = unlimited)
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub backoff: BackoffSection,
}

/// Backoff between failed broker connect attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackoffSection {
    Fixed {
        #[serde(default = "default_retry_delay_ms")]
        delay_ms: u64,
    },
    Exponential {
        #[serde(default = "default_retry_delay_ms")]
        initial_ms: u64,
        #[serde(default = "default_max_delay_ms")]
        max_ms: u64,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
    },
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for BackoffSection {
    fn default() -> Self {
        BackoffSection::Fixed {
            delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Time source selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClockSection {
    #[serde(default)]
    pub source: ClockKind,
    /// Constant reported by the fixed clock, kept before 2000 so it reads as fake
    #[serde(default = "default_fixed_timestamp")]
    pub fixed_timestamp: i64,
}

fn default_fixed_timestamp() -> i64 {
    0
}

impl Default for ClockSection {
    fn default() -> Self {
        Self {
            source: ClockKind::default(),
            fixed_timestamp: default_fixed_timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClockKind {
    #[default]
    System,
    Fixed,
}

/// Sensor acquisition selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SensorsSection {
    #[serde(default)]
    pub source: SensorKind,
    /// Per-channel file bindings, required for the sysfs source
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelBinding>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    #[default]
    Synthetic,
    Sysfs,
}

/// A numeric attribute file backing one sensor channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelBinding {
    pub path: PathBuf,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
}

fn default_scale() -> f64 {
    1.0
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl NodeConfig {
    /// Default locations searched when no path is given on the command line
    pub const DEFAULT_PATHS: [&'static str; 2] = ["sensor-node.toml", "config/sensor-node.toml"];

    /// Load configuration from TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.id)?;
        self.broker_endpoint()?;

        if self.mqtt.topic.is_empty() || self.mqtt.topic.contains(['#', '+']) {
            return Err(ConfigError::InvalidConfig(format!(
                "publish topic '{}' must be non-empty and contain no wildcards",
                self.mqtt.topic
            )));
        }
        if self.mqtt.keep_alive_secs < 5 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.keep_alive_secs must be at least 5".to_string(),
            ));
        }
        if self.publish.interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "publish.interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.publish.max_payload_bytes == 0 {
            return Err(ConfigError::InvalidConfig(
                "publish.max_payload_bytes must be greater than 0".to_string(),
            ));
        }
        if self.network.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "network.poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        self.retry_policy()
            .validate()
            .map_err(ConfigError::InvalidConfig)?;

        // The fallback constant is only acceptable for bench runs with fake data
        if self.clock.source == ClockKind::Fixed && self.sensors.source != SensorKind::Synthetic {
            return Err(ConfigError::InvalidConfig(
                "clock.source = \"fixed\" is only allowed with sensors.source = \"synthetic\""
                    .to_string(),
            ));
        }
        if self.clock.source == ClockKind::Fixed
            && !crate::clock::FixedClock::is_recognisable(self.clock.fixed_timestamp)
        {
            return Err(ConfigError::InvalidConfig(format!(
                "clock.fixed_timestamp must be in 0..{}, got {}",
                crate::clock::FixedClock::CEILING,
                self.clock.fixed_timestamp
            )));
        }

        if self.sensors.source == SensorKind::Sysfs {
            for channel in crate::sensor::Channel::ALL {
                if !self.sensors.channels.contains_key(channel.name()) {
                    return Err(ConfigError::InvalidConfig(format!(
                        "sysfs sensor source requires [sensors.channels.{}]",
                        channel.name()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Broker host and port extracted from the broker URL
    pub fn broker_endpoint(&self) -> Result<(String, u16), ConfigError> {
        let url = Url::parse(&self.mqtt.broker_url)
            .map_err(|_| ConfigError::InvalidBrokerUrl(self.mqtt.broker_url.clone()))?;

        if url.scheme() != "mqtt" && url.scheme() != "tcp" {
            return Err(ConfigError::InvalidBrokerUrl(format!(
                "{} (only plain mqtt:// is supported)",
                self.mqtt.broker_url
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidBrokerUrl(self.mqtt.broker_url.clone()))?;
        Ok((host.to_string(), url.port().unwrap_or(1883)))
    }

    /// Reconnect policy described by the `[retry]` section
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = match self.retry.backoff {
            BackoffSection::Fixed { delay_ms } => Backoff::Fixed(Duration::from_millis(delay_ms)),
            BackoffSection::Exponential {
                initial_ms,
                max_ms,
                multiplier,
            } => Backoff::Exponential {
                initial: Duration::from_millis(initial_ms),
                max: Duration::from_millis(max_ms),
                multiplier,
            },
        };
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff,
        }
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish.interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.network.poll_interval_ms)
    }

    /// Get network passphrase, failing when the configured variable is unset
    pub fn require_network_password(&self) -> Result<Option<String>, ConfigError> {
        match &self.network.password_env {
            Some(name) => std::env::var(name)
                .map(Some)
                .map_err(|_| ConfigError::EnvVarNotFound(name.clone())),
            None => Ok(None),
        }
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
id = "LAB1_NODE1"

[network]
ssid = "lab-net"

[mqtt]
broker_url = "mqtt://localhost:1883"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate device ID format
fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceId(format!(
            "Device ID '{device_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[device]
id = "LAB1_NODE1"
client_id_prefix = "ESP32Client"

[network]
ssid = "lab-net"
password_env = "WIFI_PASSWORD"
poll_interval_ms = 250

[mqtt]
broker_url = "mqtt://172.18.7.234:1883"
topic = "greenindex/sensors/energy"

[publish]
interval_secs = 10
max_payload_bytes = 512

[retry]
max_attempts = 8

[retry.backoff]
kind = "exponential"
initial_ms = 1000
max_ms = 30000

[clock]
source = "system"
"#;

        let config = NodeConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.device.id, "LAB1_NODE1");
        assert_eq!(config.device.client_id_prefix, "ESP32Client");
        assert_eq!(config.network.password_env, Some("WIFI_PASSWORD".to_string()));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.publish_interval(), Duration::from_secs(10));
        assert_eq!(config.publish.max_payload_bytes, 512);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, Some(8));
        assert_eq!(
            policy.backoff,
            Backoff::Exponential {
                initial: Duration::from_millis(1000),
                max: Duration::from_millis(30000),
                multiplier: 2.0,
            }
        );
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = NodeConfig::test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.device.client_id_prefix, "sensor-node");
        assert_eq!(config.mqtt.topic, "greenindex/sensors/energy");
        assert_eq!(config.publish.interval_secs, 5);
        assert_eq!(config.publish.max_payload_bytes, 256);
        assert_eq!(config.network.poll_interval_ms, 500);
        assert_eq!(config.clock.source, ClockKind::System);
        assert_eq!(config.sensors.source, SensorKind::Synthetic);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.backoff, Backoff::Fixed(Duration::from_secs(5)));
    }

    #[test]
    fn test_invalid_device_id() {
        assert!(validate_device_id("invalid@node").is_err());
        assert!(validate_device_id("").is_err());
        assert!(validate_device_id("LAB1_NODE1.v2-a").is_ok());
    }

    #[test]
    fn test_broker_endpoint() {
        let mut config = NodeConfig::test_config();
        assert_eq!(
            config.broker_endpoint().unwrap(),
            ("localhost".to_string(), 1883)
        );

        config.mqtt.broker_url = "mqtt://10.0.0.5:1884".to_string();
        assert_eq!(
            config.broker_endpoint().unwrap(),
            ("10.0.0.5".to_string(), 1884)
        );

        config.mqtt.broker_url = "not a url".to_string();
        assert!(matches!(
            config.broker_endpoint(),
            Err(ConfigError::InvalidBrokerUrl(_))
        ));

        config.mqtt.broker_url = "mqtts://broker:8883".to_string();
        assert!(matches!(
            config.broker_endpoint(),
            Err(ConfigError::InvalidBrokerUrl(_))
        ));
    }

    #[test]
    fn test_fixed_clock_requires_synthetic_sensors() {
        let mut config = NodeConfig::test_config();
        config.clock.source = ClockKind::Fixed;
        assert!(config.validate().is_ok());

        config.sensors.source = SensorKind::Sysfs;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_fixed_clock_rejects_realistic_timestamp() {
        let mut config = NodeConfig::test_config();
        config.clock.source = ClockKind::Fixed;
        assert_eq!(config.clock.fixed_timestamp, 0);

        config.clock.fixed_timestamp = 1_708_450_000;
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("fixed_timestamp"));

        config.clock.fixed_timestamp = 3_600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sysfs_requires_every_channel() {
        let mut config = NodeConfig::test_config();
        config.sensors.source = SensorKind::Sysfs;
        config.sensors.channels.insert(
            "voltage".to_string(),
            ChannelBinding {
                path: PathBuf::from("/sys/bus/iio/devices/iio:device0/in_voltage0_raw"),
                scale: 0.1,
                offset: 0.0,
            },
        );

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("current"));
    }

    #[test]
    fn test_wildcard_topic_rejected() {
        let mut config = NodeConfig::test_config();
        config.mqtt.topic = "greenindex/sensors/#".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = NodeConfig::test_config();
        config.publish.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_keep_alive_rejected() {
        let mut config = NodeConfig::test_config();
        config.mqtt.keep_alive_secs = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_password_env() {
        let mut config = NodeConfig::test_config();
        config.network.password_env = Some("SENSOR_NODE_TEST_UNSET_PASSWORD".to_string());
        assert!(matches!(
            config.require_network_password(),
            Err(ConfigError::EnvVarNotFound(_))
        ));

        config.network.password_env = None;
        assert_eq!(config.require_network_password().unwrap(), None);
    }
}
