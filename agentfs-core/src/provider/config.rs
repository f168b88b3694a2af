use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::CommandOptions;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum CommandExecutionMode {
    /// Run through `bash -c` so operators and redirections work.
    #[default]
    Bash,
    /// Split with shell word rules and exec the program directly.
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Execution")]
pub struct ExecutionConfig {
    /// Seconds before a command is reported as timed out.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How commands are executed - bash wrapper or direct exec
    #[serde(default)]
    pub execution_mode: CommandExecutionMode,

    /// Maximum bytes of command output to keep. Large outputs are compacted
    /// by keeping the first half and last half with a truncation marker.
    /// Defaults to 200KB.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: Option<usize>,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_output_bytes() -> Option<usize> {
    Some(200_000)
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            execution_mode: CommandExecutionMode::default(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl ExecutionConfig {
    pub fn command_options(&self) -> CommandOptions {
        CommandOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            max_output_bytes: self.max_output_bytes,
            ..CommandOptions::default()
        }
    }
}
