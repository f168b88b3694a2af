use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::patterns::{default_dangerous_patterns, default_safe_patterns};

fn default_split_redirections() -> bool {
    true
}

fn default_lowercase_command_names() -> bool {
    true
}

/// Pattern sets and splitting behaviour for the command safety classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Safety")]
pub struct SafetyConfig {
    /// Case-insensitive regexes matched against the whole command line. Any
    /// match makes the command dangerous.
    #[serde(default = "default_dangerous_patterns")]
    pub dangerous_patterns: Vec<String>,

    /// Command prefixes that may run without confirmation.
    #[serde(default = "default_safe_patterns")]
    pub safe_patterns: Vec<String>,

    /// Also treat `>` and `>>` as subcommand separators, so the target of a
    /// redirection has to be on the safe list too.
    #[serde(default = "default_split_redirections")]
    pub split_redirections: bool,

    /// Lower-case subcommands before comparing them to the safe patterns.
    #[serde(default = "default_lowercase_command_names")]
    pub lowercase_command_names: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            dangerous_patterns: default_dangerous_patterns(),
            safe_patterns: default_safe_patterns(),
            split_redirections: default_split_redirections(),
            lowercase_command_names: default_lowercase_command_names(),
        }
    }
}
