use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FsError, FsResult};
use crate::provider::{normalize_relative, Provider, ReadEncoding};

/// Exclusions that apply to every provider regardless of ignore files.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "*.lock",
    "*-lock.json",
    "*-lock.yaml",
    "node_modules",
    ".*",
];

fn default_primary_file() -> String {
    ".gitignore".to_string()
}

fn default_secondary_file() -> String {
    ".agentfsignore".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Ignore")]
pub struct IgnoreConfig {
    /// Ignore file read from the provider root.
    #[serde(default = "default_primary_file")]
    pub primary_file: String,

    /// Tool-specific ignore file read from the provider root.
    #[serde(default = "default_secondary_file")]
    pub secondary_file: String,

    /// Additional gitignore-style rules applied on top of the defaults.
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            primary_file: default_primary_file(),
            secondary_file: default_secondary_file(),
            extra_patterns: Vec::new(),
        }
    }
}

impl IgnoreConfig {
    /// Whether writing to `path` can change the compiled rule set.
    pub fn is_ignore_file(&self, path: &str) -> bool {
        let path = normalize_relative(path);
        path == self.primary_file || path == self.secondary_file
    }
}

/// Predicate over provider-relative paths; `true` means excluded. A path is
/// excluded when it or any of its parent directories matches a rule. A
/// trailing `/` marks the path as a directory.
#[derive(Clone, Default)]
pub struct IgnoreFilter {
    matcher: Option<Arc<Gitignore>>,
}

impl fmt::Debug for IgnoreFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreFilter")
            .field("rules", &self.matcher.as_ref().map_or(0, |m| m.num_ignores()))
            .finish()
    }
}

impl IgnoreFilter {
    /// A filter that excludes nothing.
    pub fn none() -> Self {
        Self { matcher: None }
    }

    pub fn from_patterns(patterns: &[&str]) -> FsResult<Self> {
        let mut builder = GitignoreBuilder::new(".");
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| FsError::invalid_pattern(*pattern, e))?;
        }
        let matcher = builder
            .build()
            .map_err(|e| FsError::Provider(anyhow!("Failed to compile ignore rules: {e}")))?;
        Ok(Self {
            matcher: Some(Arc::new(matcher)),
        })
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        let Some(matcher) = &self.matcher else {
            return false;
        };
        let is_dir = path.ends_with('/');
        let relative = normalize_relative(path);
        if relative.is_empty() {
            return false;
        }
        matcher
            .matched_path_or_any_parents(Path::new(&relative), is_dir)
            .is_ignore()
    }
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreFilterBuilder {
    config: IgnoreConfig,
}

impl IgnoreFilterBuilder {
    pub fn new(config: IgnoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IgnoreConfig {
        &self.config
    }

    /// Compile the defaults plus both ignore files found at the provider root.
    /// A missing file is skipped; a failing provider call is returned.
    pub async fn build(&self, provider: &dyn Provider) -> FsResult<IgnoreFilter> {
        let mut builder = GitignoreBuilder::new(".");

        for pattern in DEFAULT_IGNORE_PATTERNS {
            add_rule(&mut builder, pattern, "defaults");
        }
        for pattern in &self.config.extra_patterns {
            add_rule(&mut builder, pattern, "settings");
        }

        for file in [&self.config.primary_file, &self.config.secondary_file] {
            if !provider.exists(file).await? {
                debug!(provider = provider.name(), file = %file, "Ignore file not present");
                continue;
            }
            let Some(content) = provider.read_file(file, ReadEncoding::Binary).await? else {
                continue;
            };
            let Some(text) = content.as_text() else {
                warn!(provider = provider.name(), file = %file, "Ignore file is not UTF-8, skipping");
                continue;
            };
            for line in text.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                add_rule(&mut builder, line, file);
            }
        }

        let matcher = builder
            .build()
            .map_err(|e| FsError::Provider(anyhow!("Failed to compile ignore rules: {e}")))?;
        debug!(
            provider = provider.name(),
            rules = matcher.num_ignores(),
            "Built ignore filter"
        );
        Ok(IgnoreFilter {
            matcher: Some(Arc::new(matcher)),
        })
    }
}

fn add_rule(builder: &mut GitignoreBuilder, line: &str, source: &str) {
    if let Err(e) = builder.add_line(None, line) {
        warn!(source, line, error = %e, "Skipping invalid ignore rule");
    }
}
