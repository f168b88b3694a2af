use schemars::schema::RootSchema;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::ignore_filter::IgnoreConfig;
use crate::provider::config::ExecutionConfig;
use crate::safety::SafetyConfig;
use crate::search::FileSearchConfig;

fn default_provider() -> String {
    "local".to_string()
}

/// Everything the host can tune. Every section has defaults, so a partial
/// file (or none at all) loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Settings")]
pub struct Settings {
    /// Provider used by sessions that never selected one.
    #[serde(default = "default_provider")]
    pub default_provider: String,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub file_search: FileSearchConfig,

    #[serde(default)]
    pub ignore: IgnoreConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            safety: SafetyConfig::default(),
            file_search: FileSearchConfig::default(),
            ignore: IgnoreConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl Settings {
    pub fn json_schema() -> RootSchema {
        schema_for!(Settings)
    }
}
