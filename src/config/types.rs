use serde::{Deserialize, Serialize};

/// Root options container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanopyOptions {
    #[serde(default)]
    pub devtools: DevtoolsOptions,
}

/// Settings for the inspector bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevtoolsOptions {
    /// Attach to the inspector when a connection is available (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Instance name reported in logs (default: "canopy").
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum number of retained actions before the oldest is folded into
    /// the history base (default: 50).
    #[serde(default = "default_max_age")]
    pub max_age: usize,
}

impl Default for DevtoolsOptions {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            name: default_name(),
            max_age: default_max_age(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_name() -> String {
    "canopy".to_string()
}

fn default_max_age() -> usize {
    50
}
