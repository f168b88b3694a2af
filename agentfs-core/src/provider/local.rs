//! Local disk provider rooted at one directory.
//!
//! Every caller path is resolved under the canonical root. Paths that climb
//! out through `..` or a symlink are rejected with `PathEscapesRoot`.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{FsError, FsResult};
use crate::ignore_filter::IgnoreFilter;
use crate::provider::config::CommandExecutionMode;
use crate::provider::matching::{compile_glob, compile_patterns, grep_text};
use crate::provider::{
    normalize_relative, CommandOptions, CommandOutcome, FileContent, FileStat, GlobOptions,
    GrepOptions, GrepResult, PathStream, Provider, ReadEncoding, TreeOptions, WatchEvent,
    WatchEventKind, WatchOptions, WatchStream,
};

const TREE_CHANNEL_CAPACITY: usize = 64;

pub struct LocalProvider {
    name: String,
    root: PathBuf,
    execution_mode: CommandExecutionMode,
}

impl LocalProvider {
    /// The root must exist; it is canonicalised once here.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> FsResult<Self> {
        let root_ref = root.as_ref();
        let root = root_ref
            .canonicalize()
            .map_err(|e| FsError::io(root_ref.display().to_string(), e))?;
        if !root.is_dir() {
            return Err(FsError::io(
                root.display().to_string(),
                std::io::Error::other("provider root is not a directory"),
            ));
        }
        Ok(Self {
            name: name.into(),
            root,
            execution_mode: CommandExecutionMode::default(),
        })
    }

    pub fn with_execution_mode(mut self, mode: CommandExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a provider path onto disk, refusing anything outside the root.
    pub fn resolve(&self, path: &str) -> FsResult<PathBuf> {
        let mut segments: Vec<&str> = Vec::new();
        for segment in path.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(FsError::PathEscapesRoot {
                            path: path.to_string(),
                        });
                    }
                }
                other => segments.push(other),
            }
        }

        let full = segments
            .iter()
            .fold(self.root.clone(), |acc, segment| acc.join(segment));

        // Symlinks: canonicalise the deepest existing ancestor and check it.
        let mut existing = full.as_path();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }
        let canonical = existing
            .canonicalize()
            .map_err(|e| FsError::io(path, e))?;
        if !canonical.starts_with(&self.root) {
            return Err(FsError::PathEscapesRoot {
                path: path.to_string(),
            });
        }
        Ok(full)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        relative_to(&self.root, path)
    }
}

fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let stripped = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = stripped
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

fn io_err(path: &str) -> impl FnOnce(std::io::Error) -> FsError + '_ {
    move |e| FsError::io(path, e)
}

fn is_not_found(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::NotFound
}

fn tree_entry(relative: &str, is_dir: bool) -> String {
    if is_dir {
        format!("{relative}/")
    } else {
        relative.to_string()
    }
}

fn filtered(filter: &Option<IgnoreFilter>, relative: &str, is_dir: bool) -> bool {
    filter
        .as_ref()
        .is_some_and(|f| f.is_ignored(&tree_entry(relative, is_dir)))
}

/// Walk under `start`, skipping ignored entries and pruning ignored
/// directories. Yields `(relative path, is_dir)` in file name order.
fn walk(
    root: PathBuf,
    start: PathBuf,
    max_depth: Option<usize>,
    filter: Option<IgnoreFilter>,
) -> impl Iterator<Item = Result<(String, bool, PathBuf), walkdir::Error>> {
    let mut walker = WalkDir::new(start).min_depth(1).sort_by_file_name();
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }
    let prune_root = root.clone();
    walker
        .into_iter()
        .filter_entry(move |entry| match relative_to(&prune_root, entry.path()) {
            Some(relative) => !filtered(&filter, &relative, entry.file_type().is_dir()),
            None => false,
        })
        .map(move |entry| {
            entry.map(|entry| {
                let relative = relative_to(&root, entry.path()).unwrap_or_default();
                (relative, entry.file_type().is_dir(), entry.into_path())
            })
        })
}

fn walk_error(err: walkdir::Error) -> FsError {
    let path = err
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    match err.into_io_error() {
        Some(io) => FsError::io(path, io),
        None => FsError::io(path, std::io::Error::other("filesystem loop")),
    }
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        let target = to.join(
            entry
                .path()
                .strip_prefix(from)
                .map_err(std::io::Error::other)?,
        );
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Keep the head and tail of oversized output with a marker between them.
pub fn compact_output(output: &str, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output.to_string();
    }

    let half = max_bytes / 2;
    let mut start_end = half;
    while !output.is_char_boundary(start_end) {
        start_end -= 1;
    }
    let mut end_start = output.len().saturating_sub(half);
    while !output.is_char_boundary(end_start) {
        end_start += 1;
    }

    let start = &output[..start_end];
    let end = &output[end_start..];
    let omitted = output.len() - start.len() - end.len();

    format!("{start}\n... [output truncated: {omitted} bytes omitted] ...\n{end}")
}

fn failed_outcome(error: String) -> CommandOutcome {
    CommandOutcome {
        ok: false,
        error: Some(error),
        ..CommandOutcome::default()
    }
}

#[async_trait]
impl Provider for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &str) -> FsResult<bool> {
        let full = self.resolve(path)?;
        tokio::fs::try_exists(&full).await.map_err(io_err(path))
    }

    async fn stat(&self, path: &str) -> FsResult<FileStat> {
        let full = self.resolve(path)?;
        let metadata = match tokio::fs::metadata(&full).await {
            Ok(metadata) => metadata,
            Err(e) if is_not_found(&e) => return Err(FsError::not_found(path)),
            Err(e) => return Err(FsError::io(path, e)),
        };
        Ok(FileStat {
            is_file: metadata.is_file(),
            is_directory: metadata.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn read_file(
        &self,
        path: &str,
        encoding: ReadEncoding,
    ) -> FsResult<Option<FileContent>> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Ok(None);
        }
        let bytes = match tokio::fs::read(&full).await {
            Ok(bytes) => bytes,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(FsError::io(path, e)),
        };
        match encoding {
            ReadEncoding::Binary => Ok(Some(FileContent::Bytes(bytes))),
            ReadEncoding::Utf8 => String::from_utf8(bytes)
                .map(|text| Some(FileContent::Text(text)))
                .map_err(|e| {
                    FsError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                }),
        }
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> FsResult<bool> {
        let full = self.resolve(path)?;
        if full == self.root || full.is_dir() {
            return Ok(false);
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_err(path))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(io_err(path))?;
        debug!(provider = %self.name, path, bytes = content.len(), "Wrote file");
        Ok(true)
    }

    async fn append_file(&self, path: &str, content: &[u8]) -> FsResult<bool> {
        let full = self.resolve(path)?;
        if full == self.root || full.is_dir() {
            return Ok(false);
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_err(path))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .await
            .map_err(io_err(path))?;
        file.write_all(content).await.map_err(io_err(path))?;
        file.flush().await.map_err(io_err(path))?;
        Ok(true)
    }

    async fn delete_file(&self, path: &str) -> FsResult<bool> {
        let full = self.resolve(path)?;
        if full == self.root {
            return Ok(false);
        }
        let metadata = match tokio::fs::symlink_metadata(&full).await {
            Ok(metadata) => metadata,
            Err(e) if is_not_found(&e) => return Ok(false),
            Err(e) => return Err(FsError::io(path, e)),
        };
        if metadata.is_dir() {
            // Only empty directories; recursive removal is never implicit.
            tokio::fs::remove_dir(&full).await.map_err(io_err(path))?;
        } else {
            tokio::fs::remove_file(&full).await.map_err(io_err(path))?;
        }
        info!(provider = %self.name, path, "Deleted");
        Ok(true)
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<bool> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if source == self.root || target == self.root || !source.exists() {
            return Ok(false);
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err(to))?;
        }
        tokio::fs::rename(&source, &target)
            .await
            .map_err(io_err(from))?;
        Ok(true)
    }

    async fn copy(&self, from: &str, to: &str) -> FsResult<bool> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if source == self.root || target == self.root || !source.exists() {
            return Ok(false);
        }
        if source.is_dir() {
            let from_owned = from.to_string();
            tokio::task::spawn_blocking(move || copy_tree(&source, &target))
                .await
                .map_err(|e| FsError::Provider(e.into()))?
                .map_err(|e| FsError::io(from_owned, e))?;
        } else {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err(to))?;
            }
            tokio::fs::copy(&source, &target)
                .await
                .map_err(io_err(from))?;
        }
        Ok(true)
    }

    async fn create_directory(&self, path: &str) -> FsResult<bool> {
        let full = self.resolve(path)?;
        if full.is_file() {
            return Ok(false);
        }
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(io_err(path))?;
        Ok(true)
    }

    async fn directory_tree(&self, path: &str, options: TreeOptions) -> FsResult<PathStream> {
        let start = self.resolve(path)?;
        match tokio::fs::metadata(&start).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(FsError::io(
                    path,
                    std::io::Error::other("not a directory"),
                ))
            }
            Err(e) if is_not_found(&e) => return Err(FsError::not_found(path)),
            Err(e) => return Err(FsError::io(path, e)),
        }

        let (tx, mut rx) = mpsc::channel::<FsResult<String>>(TREE_CHANNEL_CAPACITY);
        let root = self.root.clone();
        let max_depth = (!options.recursive).then_some(1);
        tokio::task::spawn_blocking(move || {
            for entry in walk(root, start, max_depth, options.ignore_filter) {
                let item = entry
                    .map(|(relative, is_dir, _)| tree_entry(&relative, is_dir))
                    .map_err(walk_error);
                // Receiver gone: the consumer stopped early.
                if tx.blocking_send(item).is_err() {
                    break;
                }
            }
        });

        let stream = async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        };
        Ok(stream.boxed())
    }

    async fn glob(&self, pattern: &str, options: GlobOptions) -> FsResult<Vec<String>> {
        let matcher = compile_glob(pattern)?;
        let root = self.root.clone();
        let start = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut matches = Vec::new();
            for entry in walk(root, start, None, options.ignore_filter) {
                let (relative, is_dir, full) = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable entry during glob");
                        continue;
                    }
                };
                if is_dir && !options.include_directories {
                    continue;
                }
                if !matcher.is_match(&relative) {
                    continue;
                }
                matches.push(if options.absolute {
                    full.display().to_string()
                } else {
                    relative
                });
            }
            matches
        })
        .await
        .map_err(|e| FsError::Provider(e.into()))
    }

    async fn grep(&self, patterns: &[String], options: GrepOptions) -> FsResult<Vec<GrepResult>> {
        let regexes = compile_patterns(patterns, options.case_insensitive)?;
        let root = self.root.clone();
        let start = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut results = Vec::new();
            for entry in walk(root, start, None, options.ignore_filter) {
                let Ok((relative, is_dir, full)) = entry else {
                    continue;
                };
                if is_dir {
                    continue;
                }
                // Binary and unreadable files are not searchable.
                let Ok(text) = std::fs::read_to_string(&full) else {
                    continue;
                };
                results.extend(grep_text(&relative, &text, &regexes, options.include_content));
            }
            results
        })
        .await
        .map_err(|e| FsError::Provider(e.into()))
    }

    async fn watch(&self, path: &str, options: WatchOptions) -> FsResult<WatchStream> {
        let target = self.resolve(path)?;
        let root = self.root.clone();
        let (tx, mut rx) = mpsc::unbounded_channel::<WatchEvent>();
        let filter = options.ignore_filter;

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else {
                    return;
                };
                let kind = match event.kind {
                    EventKind::Create(_) => WatchEventKind::Created,
                    EventKind::Modify(_) => WatchEventKind::Modified,
                    EventKind::Remove(_) => WatchEventKind::Removed,
                    _ => return,
                };
                for changed in &event.paths {
                    let Some(relative) = relative_to(&root, changed) else {
                        continue;
                    };
                    if relative.is_empty() || filtered(&filter, &relative, false) {
                        continue;
                    }
                    let _ = tx.send(WatchEvent {
                        kind,
                        path: relative,
                    });
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| FsError::Provider(e.into()))?;

        let mode = if options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&target, mode)
            .map_err(|e| FsError::Provider(e.into()))?;
        debug!(provider = %self.name, path = %normalize_relative(path), "Watching");

        let stream = async_stream::stream! {
            // Dropping the stream drops the watcher.
            let _watcher = watcher;
            while let Some(event) = rx.recv().await {
                yield event;
            }
        };
        Ok(stream.boxed())
    }

    async fn execute_command(
        &self,
        command: &str,
        options: CommandOptions,
    ) -> FsResult<CommandOutcome> {
        let dir = match &options.working_directory {
            Some(dir) => self.resolve(dir)?,
            None => self.root.clone(),
        };
        info!(
            provider = %self.name,
            ?dir,
            command,
            mode = ?self.execution_mode,
            "Running command"
        );

        let mut cmd = match self.execution_mode {
            CommandExecutionMode::Direct => {
                let parts = match shell_words::split(command) {
                    Ok(parts) => parts,
                    Err(e) => return Ok(failed_outcome(format!("Failed to parse command: {e}"))),
                };
                let Some((program, args)) = parts.split_first() else {
                    return Err(FsError::EmptyCommand);
                };
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            CommandExecutionMode::Bash => {
                let mut cmd = Command::new("bash");
                cmd.args(["-c", command]);
                cmd
            }
        };

        let child = cmd
            .current_dir(&dir)
            .envs(&options.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(command, error = %e, "Failed to spawn command");
                return Ok(failed_outcome(format!("Failed to spawn command: {e}")));
            }
        };

        let output = match tokio::time::timeout(options.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Ok(failed_outcome(format!("Failed to wait for command: {e}"))),
            Err(_) => {
                warn!(command, timeout = ?options.timeout, "Command timed out");
                return Ok(failed_outcome(format!(
                    "Command timed out after {}s",
                    options.timeout.as_secs()
                )));
            }
        };

        let mut stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let mut stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if let Some(max) = options.max_output_bytes {
            stdout = compact_output(&stdout, max);
            stderr = compact_output(&stderr, max);
        }

        Ok(CommandOutcome {
            ok: output.status.success(),
            exit_code: output.status.code(),
            stdout,
            stderr,
            error: None,
        })
    }
}
