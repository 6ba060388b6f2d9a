//! Engine configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults.

use serde::{Deserialize, Serialize};
use std::env;

/// Whether cancelling a pending order puts its reserved stock back.
///
/// The default replenishes unconditionally. `Never` exists for
/// deployments where cancelled stock must not re-enter circulation
/// automatically (e.g. perishables that need manual inspection first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplenishPolicy {
    /// Every `pending → cancelled` transition releases all reserved lines.
    Always,
    /// Cancellation never releases stock; adjustments happen via restock.
    Never,
}

impl Default for ReplenishPolicy {
    fn default() -> Self {
        ReplenishPolicy::Always
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Stock effect of cancellation.
    pub replenish_on_cancel: ReplenishPolicy,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                        | Values            | Default  |
    /// |---------------------------------|-------------------|----------|
    /// | `TINYSALES_REPLENISH_ON_CANCEL` | `always`, `never` | `always` |
    pub fn load() -> Result<Self, ConfigError> {
        let replenish_on_cancel = match env::var("TINYSALES_REPLENISH_ON_CANCEL") {
            Ok(value) => match value.to_lowercase().as_str() {
                "always" => ReplenishPolicy::Always,
                "never" => ReplenishPolicy::Never,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "TINYSALES_REPLENISH_ON_CANCEL".to_string(),
                    ))
                }
            },
            Err(_) => ReplenishPolicy::default(),
        };

        Ok(EngineConfig {
            replenish_on_cancel,
        })
    }

    /// Overrides the replenishment policy (builder style).
    pub fn replenish_on_cancel(mut self, policy: ReplenishPolicy) -> Self {
        self.replenish_on_cancel = policy;
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_replenishes() {
        let config = EngineConfig::default();
        assert_eq!(config.replenish_on_cancel, ReplenishPolicy::Always);
    }

    #[test]
    fn test_builder_override() {
        let config = EngineConfig::default().replenish_on_cancel(ReplenishPolicy::Never);
        assert_eq!(config.replenish_on_cancel, ReplenishPolicy::Never);
    }
}
