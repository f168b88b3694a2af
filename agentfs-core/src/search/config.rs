use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tuning for ranked search and the context rendered from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "File Search")]
#[serde(default)]
pub struct FileSearchConfig {
    /// Results returned when the caller does not ask for a specific count.
    pub max_results: usize,

    /// Snippets rendered per file.
    pub max_snippets: usize,

    /// Stop adding snippets once this share of the file is already shown.
    pub max_snippet_fraction: f64,

    pub context_lines_before: usize,

    pub context_lines_after: usize,
}

impl Default for FileSearchConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            max_snippets: 5,
            max_snippet_fraction: 0.3,
            context_lines_before: 2,
            context_lines_after: 2,
        }
    }
}
