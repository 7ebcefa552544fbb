//! Bus configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigLoadError;

/// What `post` does when a handler returns an error.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Stop at the first failing handler and return its error.
    #[default]
    Abort,
    /// Keep dispatching to the remaining handlers and report every fault at the end.
    Isolate,
}

/// Configuration for a single bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Name for logging.
    pub name: String,
    pub fault_policy: FaultPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            fault_policy: FaultPolicy::Abort,
        }
    }
}

impl BusConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigLoadError> {
        let config: BusConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.name.trim().is_empty() {
            return Err(ConfigLoadError::EmptyName);
        }
        Ok(())
    }
}
