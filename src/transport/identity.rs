//! Per-attempt broker client identity

use std::fmt;
use uuid::Uuid;

/// Client identity presented to the broker on one connect attempt
///
/// Only needs to be distinct across concurrent sessions, so sixteen random
/// bits after the configured prefix are enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Generate a fresh identity `<prefix>-<hex>`
    pub fn generate(prefix: &str) -> Self {
        let bits = Uuid::new_v4().as_u128() as u16;
        Self(format!("{prefix}-{bits:04x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
