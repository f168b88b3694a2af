//! The provider contract.
//!
//! A provider is one storage backend (local disk, in-memory scratch space, a
//! remote host...) exposing the same capability set. Paths handed to a
//! provider are relative to its root and use `/` separators; directories in
//! tree output carry a trailing `/`.
//!
//! `watch` and `execute_command` have default implementations that report the
//! capability as unsupported, so read/write-only backends stay small.

pub mod config;
pub mod local;
pub mod matching;
pub mod memory;
pub mod registry;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};
use crate::ignore_filter::IgnoreFilter;

pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use registry::ProviderRegistry;

/// Lazily produced relative paths. Dropping the stream stops the walk.
pub type PathStream = BoxStream<'static, FsResult<String>>;

/// Change notifications. Dropping the stream releases the watcher.
pub type WatchStream = BoxStream<'static, WatchEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadEncoding {
    #[default]
    Utf8,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text(text) => Some(text),
            FileContent::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub is_file: bool,
    pub is_directory: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TreeOptions {
    pub ignore_filter: Option<IgnoreFilter>,
    pub recursive: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            ignore_filter: None,
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobOptions {
    pub ignore_filter: Option<IgnoreFilter>,
    /// Return paths joined onto the provider root instead of relative paths.
    pub absolute: bool,
    pub include_directories: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GrepOptions {
    pub ignore_filter: Option<IgnoreFilter>,
    /// Fill `GrepResult::content` with the whole matching line.
    pub include_content: bool,
    pub case_insensitive: bool,
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub ignore_filter: Option<IgnoreFilter>,
    pub recursive: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            ignore_filter: None,
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepResult {
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    pub matched_text: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Forwarded to the provider; the core does not enforce it itself.
    pub timeout: Duration,
    pub env: HashMap<String, String>,
    pub working_directory: Option<String>,
    pub max_output_bytes: Option<usize>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            env: HashMap::new(),
            working_directory: None,
            max_output_bytes: None,
        }
    }
}

/// Result of running a command. Timeouts and non-zero exits are reported
/// here with `ok == false`; only provider failures surface as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CommandOutcome {
    pub ok: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn exists(&self, path: &str) -> FsResult<bool>;

    async fn stat(&self, path: &str) -> FsResult<FileStat>;

    /// Returns `None` when the file does not exist.
    async fn read_file(&self, path: &str, encoding: ReadEncoding)
        -> FsResult<Option<FileContent>>;

    async fn write_file(&self, path: &str, content: &[u8]) -> FsResult<bool>;

    async fn append_file(&self, path: &str, content: &[u8]) -> FsResult<bool>;

    async fn delete_file(&self, path: &str) -> FsResult<bool>;

    async fn rename(&self, from: &str, to: &str) -> FsResult<bool>;

    async fn copy(&self, from: &str, to: &str) -> FsResult<bool>;

    async fn create_directory(&self, path: &str) -> FsResult<bool>;

    async fn directory_tree(&self, path: &str, options: TreeOptions) -> FsResult<PathStream>;

    async fn glob(&self, pattern: &str, options: GlobOptions) -> FsResult<Vec<String>>;

    async fn grep(&self, patterns: &[String], options: GrepOptions) -> FsResult<Vec<GrepResult>>;

    async fn watch(&self, _path: &str, _options: WatchOptions) -> FsResult<WatchStream> {
        Err(FsError::unsupported(self.name(), "watch"))
    }

    async fn execute_command(
        &self,
        _command: &str,
        _options: CommandOptions,
    ) -> FsResult<CommandOutcome> {
        Err(FsError::unsupported(self.name(), "command execution"))
    }
}

/// Normalise a caller supplied path into the provider-relative form:
/// no leading `/` or `./`, no empty or `.` segments, no trailing `/`.
pub fn normalize_relative(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
