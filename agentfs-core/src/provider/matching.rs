//! Glob and grep matching shared by the bundled providers.

use globset::{GlobBuilder, GlobMatcher};
use regex::{Regex, RegexBuilder};

use crate::error::{FsError, FsResult};
use crate::provider::GrepResult;

/// `*` stays within one path segment, `**` crosses segments.
pub fn compile_glob(pattern: &str) -> FsResult<GlobMatcher> {
    let pattern = pattern.trim_start_matches("./");
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| FsError::invalid_pattern(pattern, e))
}

pub fn compile_patterns(patterns: &[String], case_insensitive: bool) -> FsResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| FsError::invalid_pattern(pattern.clone(), e))
        })
        .collect()
}

/// One result per matching line; the first pattern that matches supplies
/// `matched_text`.
pub fn grep_text(
    file: &str,
    text: &str,
    regexes: &[Regex],
    include_content: bool,
) -> Vec<GrepResult> {
    let mut results = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let Some(found) = regexes.iter().find_map(|re| re.find(line)) else {
            continue;
        };
        results.push(GrepResult {
            file: file.to_string(),
            line: index + 1,
            matched_text: found.as_str().to_string(),
            content: include_content.then(|| line.to_string()),
        });
    }
    results
}
