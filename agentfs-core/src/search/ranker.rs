use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, warn};

use crate::error::FsResult;
use crate::ignore_filter::IgnoreFilter;
use crate::provider::{GlobOptions, GrepOptions, GrepResult, Provider};
use crate::search::fuzzy::fuzzy_score;
use crate::search::keywords::{extract_keywords, infer_extensions, is_content_term};

/// What ranked search needs from a backend.
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn glob(&self, pattern: &str) -> FsResult<Vec<String>>;

    /// Case-insensitive search for any of `patterns`, whole lines included.
    async fn grep(&self, patterns: &[String]) -> FsResult<Vec<GrepResult>>;
}

/// A provider seen through one ignore filter.
pub struct ScopedSource {
    pub provider: Arc<dyn Provider>,
    pub ignore_filter: Option<IgnoreFilter>,
}

#[async_trait]
impl SearchSource for ScopedSource {
    async fn glob(&self, pattern: &str) -> FsResult<Vec<String>> {
        self.provider
            .glob(
                pattern,
                GlobOptions {
                    ignore_filter: self.ignore_filter.clone(),
                    ..GlobOptions::default()
                },
            )
            .await
    }

    async fn grep(&self, patterns: &[String]) -> FsResult<Vec<GrepResult>> {
        self.provider
            .grep(
                patterns,
                GrepOptions {
                    ignore_filter: self.ignore_filter.clone(),
                    include_content: true,
                    case_insensitive: true,
                },
            )
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchType {
    Filename,
    Content,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMatch {
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub file_path: String,
    pub score: f64,
    pub match_type: MatchType,
    pub line_matches: Vec<LineMatch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankerWeights {
    pub exact_filename: f64,
    pub exact_stem: f64,
    pub fuzzy_filename: f64,
    pub fuzzy_path: f64,
    pub extension_bonus: f64,
    /// Subtracted per directory level.
    pub depth_penalty: f64,
    /// Floor for a file that matched at all, after the depth penalty.
    pub min_path_score: f64,
    /// Fuzzy scores below this are treated as no match.
    pub min_fuzzy: f64,
    pub content_per_line: f64,
    pub content_cap: f64,
}

impl Default for RankerWeights {
    fn default() -> Self {
        Self {
            exact_filename: 100.0,
            exact_stem: 80.0,
            fuzzy_filename: 50.0,
            fuzzy_path: 20.0,
            extension_bonus: 15.0,
            depth_penalty: 1.5,
            min_path_score: 1.0,
            min_fuzzy: 0.3,
            content_per_line: 5.0,
            content_cap: 40.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchRanker {
    weights: RankerWeights,
}

impl SearchRanker {
    pub fn new(weights: RankerWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RankerWeights {
        &self.weights
    }

    /// Ranked files for `query`, best first, at most `max_results`.
    ///
    /// Candidates come from a full recursive glob. Content hits come from one
    /// grep over the identifier-like keywords; if that grep fails the failure
    /// is logged and path scores are returned on their own.
    pub async fn search(
        &self,
        query: &str,
        source: &dyn SearchSource,
        max_results: usize,
    ) -> FsResult<Vec<SearchMatch>> {
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            debug!(query, "No keywords extracted, skipping search");
            return Ok(Vec::new());
        }
        let extensions = infer_extensions(query);
        debug!(query, ?keywords, ?extensions, "Searching");

        let mut path_scores: BTreeMap<String, f64> = BTreeMap::new();
        for path in source.glob("**/*").await? {
            let score = self.score_path(&path, &keywords, &extensions);
            if score > 0.0 {
                path_scores.insert(path, score);
            }
        }

        let terms: Vec<String> = keywords
            .iter()
            .filter(|k| is_content_term(k))
            .map(|k| regex::escape(k))
            .collect();
        let content = if terms.is_empty() {
            BTreeMap::new()
        } else {
            match source.grep(&terms).await {
                Ok(results) => self.aggregate_grep(results),
                Err(e) => {
                    warn!(query, error = %e, "Content search failed, using path scores only");
                    BTreeMap::new()
                }
            }
        };

        let mut matches = self.fuse(path_scores, content);
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        matches.truncate(max_results);
        Ok(matches)
    }

    /// Path relevance. Zero means the path is not a candidate.
    pub fn score_path(&self, path: &str, keywords: &[String], extensions: &[String]) -> f64 {
        let w = &self.weights;
        let lower_path = path.to_lowercase();
        let filename = lower_path.rsplit('/').next().unwrap_or(&lower_path);
        let (stem, extension) = match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (filename, None),
        };

        let mut score = 0.0;
        for keyword in keywords {
            let keyword = keyword.to_lowercase();
            let best = if keyword == filename || keyword == lower_path {
                w.exact_filename
            } else if keyword == stem {
                w.exact_stem
            } else {
                let on_name = fuzzy_score(&keyword, filename);
                let on_path = fuzzy_score(&keyword, &lower_path);
                let name_score = if on_name >= w.min_fuzzy {
                    w.fuzzy_filename * on_name
                } else {
                    0.0
                };
                let path_score = if on_path >= w.min_fuzzy {
                    w.fuzzy_path * on_path
                } else {
                    0.0
                };
                name_score.max(path_score)
            };
            score += best;
        }

        if extension.is_some_and(|ext| extensions.iter().any(|e| e == ext)) {
            score += w.extension_bonus;
        }

        if score <= 0.0 {
            return 0.0;
        }
        let depth = path.matches('/').count() as f64;
        (score - w.depth_penalty * depth).max(w.min_path_score)
    }

    /// Hits grouped per file, one entry per line, ordered by line.
    pub fn aggregate_grep(&self, results: Vec<GrepResult>) -> BTreeMap<String, Vec<LineMatch>> {
        let mut grouped: BTreeMap<String, BTreeMap<usize, String>> = BTreeMap::new();
        for result in results {
            let content = result.content.unwrap_or(result.matched_text);
            grouped
                .entry(result.file)
                .or_default()
                .entry(result.line)
                .or_insert(content);
        }
        grouped
            .into_iter()
            .map(|(file, lines)| {
                let matches = lines
                    .into_iter()
                    .map(|(line, content)| LineMatch { line, content })
                    .collect();
                (file, matches)
            })
            .collect()
    }

    fn content_score(&self, hits: usize) -> f64 {
        (self.weights.content_per_line * hits as f64).min(self.weights.content_cap)
    }

    fn fuse(
        &self,
        mut path_scores: BTreeMap<String, f64>,
        content: BTreeMap<String, Vec<LineMatch>>,
    ) -> Vec<SearchMatch> {
        let files: BTreeSet<String> = path_scores
            .keys()
            .chain(content.keys())
            .cloned()
            .collect();
        let mut content = content;

        files
            .into_iter()
            .map(|file| {
                let path_score = path_scores.remove(&file);
                let line_matches = content.remove(&file).unwrap_or_default();
                let content_score = self.content_score(line_matches.len());
                let (score, match_type) = match (path_score, line_matches.is_empty()) {
                    (Some(p), false) => (p + content_score, MatchType::Both),
                    (Some(p), true) => (p, MatchType::Filename),
                    (None, _) => (content_score, MatchType::Content),
                };
                SearchMatch {
                    file_path: file,
                    score,
                    match_type,
                    line_matches,
                }
            })
            .collect()
    }
}
