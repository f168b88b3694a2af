//! Command safety classification.
//!
//! A command line is classified as `safe`, `unknown` or `dangerous` before it
//! is handed to a provider for execution. This is string matching, not shell
//! parsing: operators are split naively, so a quoted `;` or `|` is treated as a
//! separator (`echo "a;b"` becomes `echo "a` and `b"`). Mis-splitting can only
//! demote a line to `unknown`, which still goes through confirmation.
//!
//! Precedence is dangerous > unknown > safe. Dangerous patterns are matched
//! against the whole line first because some of them span operators.

pub mod config;
pub mod patterns;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{info, warn};

use crate::error::{FsError, FsResult};

pub use config::SafetyConfig;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SafetyVerdict {
    Safe,
    Unknown,
    Dangerous,
}

impl SafetyVerdict {
    /// Whether a human has to confirm before the command may run.
    pub fn requires_confirmation(&self) -> bool {
        !matches!(self, SafetyVerdict::Safe)
    }
}

/// A verdict plus the evidence that produced it, for logs and prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub verdict: SafetyVerdict,
    pub subcommands: Vec<String>,
    /// The dangerous pattern that matched, if any.
    pub matched_pattern: Option<String>,
    /// Subcommands that matched no safe pattern.
    pub unlisted: Vec<String>,
}

const CONTROL_OPERATORS: &[&str] = &["&&", "||", ";", "|"];
const REDIRECTION_OPERATORS: &[&str] = &[">>", ">"];

/// Split a compound command line into subcommands.
///
/// Each operator is applied in turn over the pieces produced by the previous
/// one. Longer operators go first so `||` is not read as two pipes.
pub fn parse_compound_command(line: &str, split_redirections: bool) -> Vec<String> {
    let mut operators: Vec<&str> = CONTROL_OPERATORS.to_vec();
    if split_redirections {
        operators.extend_from_slice(REDIRECTION_OPERATORS);
    }

    let mut pieces = vec![line.to_string()];
    for op in operators {
        pieces = pieces
            .iter()
            .flat_map(|piece| piece.split(op).map(str::to_string).collect::<Vec<_>>())
            .collect();
    }

    pieces
        .into_iter()
        .map(|piece| piece.trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

#[derive(Debug, Clone)]
pub struct CommandSafetyClassifier {
    dangerous: Vec<(String, Regex)>,
    safe: Vec<String>,
    split_redirections: bool,
    lowercase_command_names: bool,
}

impl CommandSafetyClassifier {
    pub fn new(config: &SafetyConfig) -> FsResult<Self> {
        let mut dangerous = Vec::with_capacity(config.dangerous_patterns.len());
        for pattern in &config.dangerous_patterns {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| FsError::invalid_pattern(pattern.clone(), e))?;
            dangerous.push((pattern.clone(), regex));
        }

        let safe = config
            .safe_patterns
            .iter()
            .map(|p| normalize_whitespace(p, config.lowercase_command_names))
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            dangerous,
            safe,
            split_redirections: config.split_redirections,
            lowercase_command_names: config.lowercase_command_names,
        })
    }

    pub fn classify(&self, line: &str) -> SafetyVerdict {
        self.explain(line).verdict
    }

    pub fn explain(&self, line: &str) -> Classification {
        let subcommands = parse_compound_command(line, self.split_redirections);

        if let Some((pattern, _)) = self.dangerous.iter().find(|(_, re)| re.is_match(line)) {
            warn!(command = %line, pattern = %pattern, "Command classified as dangerous");
            return Classification {
                verdict: SafetyVerdict::Dangerous,
                subcommands,
                matched_pattern: Some(pattern.clone()),
                unlisted: Vec::new(),
            };
        }

        let unlisted: Vec<String> = subcommands
            .iter()
            .filter(|sub| !self.is_listed_safe(sub))
            .cloned()
            .collect();

        // An empty line has no subcommands and is vacuously safe; rejecting
        // empty input is the caller's job.
        let verdict = if unlisted.is_empty() {
            SafetyVerdict::Safe
        } else {
            SafetyVerdict::Unknown
        };

        info!(command = %line, %verdict, unlisted = ?unlisted, "Command classified");

        Classification {
            verdict,
            subcommands,
            matched_pattern: None,
            unlisted,
        }
    }

    fn is_listed_safe(&self, subcommand: &str) -> bool {
        let normalized = normalize_whitespace(subcommand, self.lowercase_command_names);
        self.safe.iter().any(|pattern| {
            normalized == *pattern
                || (normalized.starts_with(pattern.as_str())
                    && normalized[pattern.len()..].starts_with(' '))
        })
    }
}

impl Default for CommandSafetyClassifier {
    /// Built-in pattern sets. These are covered by `test_builtin_patterns_compile`.
    fn default() -> Self {
        Self::new(&SafetyConfig::default()).expect("built-in safety patterns compile")
    }
}

fn normalize_whitespace(text: &str, lowercase: bool) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if lowercase {
        joined.to_lowercase()
    } else {
        joined
    }
}
