//! Per-conversation state: provider binding, selected files, dirty flag.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FsError, FsResult};
use crate::ignore_filter::IgnoreFilter;

/// Files the user or agent pinned into context. Order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectedFileSet {
    files: BTreeSet<String>,
}

impl SelectedFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the path was already selected.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.files.insert(path.into())
    }

    pub fn remove(&mut self, path: &str) -> FsResult<()> {
        if self.files.remove(path) {
            Ok(())
        } else {
            Err(FsError::not_found(path))
        }
    }

    pub fn replace<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = paths.into_iter().map(Into::into).collect();
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Provider bound to this session. `None` falls back to the registry default.
    pub active_provider: Option<String>,
    #[serde(default)]
    pub selected_files: SelectedFileSet,
    /// Set once any mutation through the facade succeeded.
    #[serde(default)]
    pub dirty: bool,
    #[serde(skip)]
    ignore_cache: Option<IgnoreFilter>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            active_provider: None,
            selected_files: SelectedFileSet::new(),
            dirty: false,
            ignore_cache: None,
        }
    }

    /// Back to a fresh state, keeping the identity.
    pub fn reset(&mut self) {
        self.active_provider = None;
        self.selected_files.clear();
        self.dirty = false;
        self.ignore_cache = None;
    }

    pub fn to_json(&self) -> FsResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| FsError::Provider(e.into()))
    }

    pub fn from_json(json: &str) -> FsResult<Self> {
        serde_json::from_str(json).map_err(|e| FsError::Provider(e.into()))
    }

    pub(crate) fn cached_ignore_filter(&self) -> Option<&IgnoreFilter> {
        self.ignore_cache.as_ref()
    }

    pub(crate) fn cache_ignore_filter(&mut self, filter: IgnoreFilter) {
        self.ignore_cache = Some(filter);
    }

    pub(crate) fn invalidate_ignore_filter(&mut self) {
        self.ignore_cache = None;
    }

    pub fn has_cached_ignore_filter(&self) -> bool {
        self.ignore_cache.is_some()
    }
}
