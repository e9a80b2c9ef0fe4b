//! Processor configuration.

use serde::{Deserialize, Serialize};

/// Scheduling configuration for a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Human-readable processor name (e.g. `"render"`). Unique per manager.
    pub name: String,
    /// Position among processors; lower runs first.
    #[serde(default)]
    pub order: i32,
    /// Initial value of the enabled flag.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ProcessorConfig {
    /// Create an enabled config with order 0.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: 0,
            enabled: true,
        }
    }

    /// Set the scheduling order.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Set the initial enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
