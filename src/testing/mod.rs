//! Testing utilities and fake collaborators
//!
//! This module provides fake implementations for exercising the sensor node
//! without requiring a network, an MQTT broker or sensor hardware.

pub mod mocks;

pub use mocks::*;
