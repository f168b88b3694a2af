use serde::Serialize;

use crate::search::config::FileSearchConfig;
use crate::search::ranker::LineMatch;

/// A contiguous window of a file around one or more hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub lines: Vec<String>,
}

impl Snippet {
    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }

    /// Lines prefixed with their line numbers.
    pub fn render(&self) -> String {
        let width = self.end_line.to_string().len();
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>width$}: {}", self.start_line + i, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Context windows around `line_matches`. Overlapping or touching windows are
/// merged. At most `max_snippets` are kept, and no snippet is added that would
/// push coverage past `max_snippet_fraction` of the file. The first snippet is
/// always kept so a match never renders empty.
pub fn extract_snippets(
    content: &str,
    line_matches: &[LineMatch],
    config: &FileSearchConfig,
) -> Vec<Snippet> {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();
    if total == 0 || config.max_snippets == 0 {
        return Vec::new();
    }

    let mut hits: Vec<usize> = line_matches
        .iter()
        .map(|m| m.line)
        .filter(|line| (1..=total).contains(line))
        .collect();
    hits.sort_unstable();
    hits.dedup();

    let mut windows: Vec<(usize, usize)> = Vec::new();
    for hit in hits {
        let start = hit.saturating_sub(config.context_lines_before).max(1);
        let end = (hit + config.context_lines_after).min(total);
        match windows.last_mut() {
            Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
            _ => windows.push((start, end)),
        }
    }

    let budget = (config.max_snippet_fraction * total as f64).ceil() as usize;
    let mut covered = 0;
    let mut snippets = Vec::new();
    for (start, end) in windows {
        if snippets.len() >= config.max_snippets {
            break;
        }
        let len = end + 1 - start;
        if !snippets.is_empty() && covered + len > budget {
            break;
        }
        covered += len;
        snippets.push(Snippet {
            start_line: start,
            end_line: end,
            lines: lines[start - 1..end].iter().map(|l| l.to_string()).collect(),
        });
    }
    snippets
}
