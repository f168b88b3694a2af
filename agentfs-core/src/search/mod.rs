//! Relevance-ranked file search.
//!
//! A query is reduced to keywords and implied extensions, every candidate
//! path is scored against them, content hits from one grep are folded in,
//! and the best files are returned.

pub mod config;
pub mod fuzzy;
pub mod keywords;
pub mod ranker;
pub mod snippets;

pub use config::FileSearchConfig;
pub use fuzzy::fuzzy_score;
pub use keywords::{extract_keywords, infer_extensions};
pub use ranker::{
    LineMatch, MatchType, RankerWeights, ScopedSource, SearchMatch, SearchRanker, SearchSource,
};
pub use snippets::{extract_snippets, Snippet};
