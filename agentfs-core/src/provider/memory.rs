//! In-memory provider.
//!
//! Used for scratch space and testing. All data is ephemeral. Commands are
//! never executed: they are recorded and answered from scripted outcomes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;

use crate::error::{FsError, FsResult};
use crate::ignore_filter::IgnoreFilter;
use crate::provider::matching::{compile_glob, compile_patterns, grep_text};
use crate::provider::{
    normalize_relative, CommandOptions, CommandOutcome, FileContent, FileStat, GlobOptions,
    GrepOptions, GrepResult, PathStream, Provider, ReadEncoding, TreeOptions, WatchEvent,
    WatchEventKind, WatchOptions, WatchStream,
};

#[derive(Debug, Clone)]
enum Entry {
    File {
        data: Vec<u8>,
        modified: DateTime<Utc>,
    },
    Directory {
        modified: DateTime<Utc>,
    },
}

impl Entry {
    fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory { .. })
    }
}

#[derive(Debug, Default)]
struct Faults {
    reads: bool,
    grep: bool,
}

/// In-memory provider. Thread-safe via internal locks.
pub struct MemoryProvider {
    name: String,
    entries: RwLock<BTreeMap<String, Entry>>,
    events: broadcast::Sender<WatchEvent>,
    scripted: Mutex<HashMap<String, CommandOutcome>>,
    executed: Mutex<Vec<String>>,
    faults: Mutex<Faults>,
}

impl MemoryProvider {
    pub fn new(name: impl Into<String>) -> Self {
        let mut entries = BTreeMap::new();
        // Root directory always exists
        entries.insert(
            String::new(),
            Entry::Directory {
                modified: Utc::now(),
            },
        );
        let (events, _) = broadcast::channel(256);
        Self {
            name: name.into(),
            entries: RwLock::new(entries),
            events,
            scripted: Mutex::new(HashMap::new()),
            executed: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Seed a file without going through the async API.
    pub fn insert_file(&self, path: &str, content: impl AsRef<[u8]>) {
        let path = normalize_relative(path);
        let mut entries = self.entries.write().expect("lock poisoned");
        insert_parents(&mut entries, &path);
        entries.insert(
            path,
            Entry::File {
                data: content.as_ref().to_vec(),
                modified: Utc::now(),
            },
        );
    }

    /// Answer `command` with `outcome` from now on.
    pub fn script_command(&self, command: impl Into<String>, outcome: CommandOutcome) {
        self.scripted
            .lock()
            .expect("lock poisoned")
            .insert(command.into(), outcome);
    }

    /// Every command this provider was asked to run, in order.
    pub fn executed_commands(&self) -> Vec<String> {
        self.executed.lock().expect("lock poisoned").clone()
    }

    /// Make `exists`, `read_file`, `stat` and `glob` fail as a flaky backend would.
    pub fn fail_reads(&self, fail: bool) {
        self.faults.lock().expect("lock poisoned").reads = fail;
    }

    pub fn fail_grep(&self, fail: bool) {
        self.faults.lock().expect("lock poisoned").grep = fail;
    }

    fn check_reads(&self) -> FsResult<()> {
        if self.faults.lock().expect("lock poisoned").reads {
            return Err(FsError::Provider(anyhow!(
                "{}: backend unavailable",
                self.name
            )));
        }
        Ok(())
    }

    fn notify(&self, kind: WatchEventKind, path: &str) {
        // No subscribers is fine.
        let _ = self.events.send(WatchEvent {
            kind,
            path: path.to_string(),
        });
    }

    fn snapshot(&self) -> BTreeMap<String, Entry> {
        self.entries.read().expect("lock poisoned").clone()
    }
}

fn insert_parents(entries: &mut BTreeMap<String, Entry>, path: &str) {
    let mut current = String::new();
    let segments: Vec<&str> = path.split('/').collect();
    for segment in &segments[..segments.len().saturating_sub(1)] {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        entries
            .entry(current.clone())
            .or_insert_with(|| Entry::Directory {
                modified: Utc::now(),
            });
    }
}

fn is_under(path: &str, base: &str) -> bool {
    base.is_empty() || path == base || path.starts_with(&format!("{base}/"))
}

fn display_path(path: &str, is_dir: bool) -> String {
    if is_dir {
        format!("{path}/")
    } else {
        path.to_string()
    }
}

fn excluded(filter: &Option<IgnoreFilter>, path: &str, is_dir: bool) -> bool {
    filter
        .as_ref()
        .is_some_and(|f| f.is_ignored(&display_path(path, is_dir)))
}

#[async_trait]
impl Provider for MemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &str) -> FsResult<bool> {
        self.check_reads()?;
        let path = normalize_relative(path);
        Ok(self
            .entries
            .read()
            .expect("lock poisoned")
            .contains_key(&path))
    }

    async fn stat(&self, path: &str) -> FsResult<FileStat> {
        self.check_reads()?;
        let path = normalize_relative(path);
        let entries = self.entries.read().expect("lock poisoned");
        match entries.get(&path) {
            Some(Entry::File { data, modified }) => Ok(FileStat {
                is_file: true,
                is_directory: false,
                size: data.len() as u64,
                modified: Some(*modified),
            }),
            Some(Entry::Directory { modified }) => Ok(FileStat {
                is_file: false,
                is_directory: true,
                size: 0,
                modified: Some(*modified),
            }),
            None => Err(FsError::not_found(path)),
        }
    }

    async fn read_file(
        &self,
        path: &str,
        encoding: ReadEncoding,
    ) -> FsResult<Option<FileContent>> {
        self.check_reads()?;
        let path = normalize_relative(path);
        let entries = self.entries.read().expect("lock poisoned");
        let Some(Entry::File { data, .. }) = entries.get(&path) else {
            return Ok(None);
        };
        match encoding {
            ReadEncoding::Binary => Ok(Some(FileContent::Bytes(data.clone()))),
            ReadEncoding::Utf8 => String::from_utf8(data.clone())
                .map(|text| Some(FileContent::Text(text)))
                .map_err(|e| {
                    FsError::io(
                        path.clone(),
                        std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                    )
                }),
        }
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> FsResult<bool> {
        let path = normalize_relative(path);
        let existed = {
            let mut entries = self.entries.write().expect("lock poisoned");
            if entries.get(&path).is_some_and(Entry::is_dir) {
                return Ok(false);
            }
            insert_parents(&mut entries, &path);
            entries
                .insert(
                    path.clone(),
                    Entry::File {
                        data: content.to_vec(),
                        modified: Utc::now(),
                    },
                )
                .is_some()
        };
        let kind = if existed {
            WatchEventKind::Modified
        } else {
            WatchEventKind::Created
        };
        self.notify(kind, &path);
        Ok(true)
    }

    async fn append_file(&self, path: &str, content: &[u8]) -> FsResult<bool> {
        let path = normalize_relative(path);
        let existed = {
            let mut entries = self.entries.write().expect("lock poisoned");
            match entries.get_mut(&path) {
                Some(Entry::File { data, modified }) => {
                    data.extend_from_slice(content);
                    *modified = Utc::now();
                    true
                }
                Some(Entry::Directory { .. }) => return Ok(false),
                None => {
                    insert_parents(&mut entries, &path);
                    entries.insert(
                        path.clone(),
                        Entry::File {
                            data: content.to_vec(),
                            modified: Utc::now(),
                        },
                    );
                    false
                }
            }
        };
        let kind = if existed {
            WatchEventKind::Modified
        } else {
            WatchEventKind::Created
        };
        self.notify(kind, &path);
        Ok(true)
    }

    async fn delete_file(&self, path: &str) -> FsResult<bool> {
        let path = normalize_relative(path);
        if path.is_empty() {
            return Ok(false);
        }
        {
            let mut entries = self.entries.write().expect("lock poisoned");
            match entries.get(&path) {
                None => return Ok(false),
                Some(Entry::Directory { .. }) => {
                    let has_children = entries
                        .keys()
                        .any(|key| key != &path && is_under(key, &path));
                    if has_children {
                        return Err(FsError::io(
                            path.clone(),
                            std::io::Error::other("directory not empty"),
                        ));
                    }
                }
                Some(Entry::File { .. }) => {}
            }
            entries.remove(&path);
        }
        self.notify(WatchEventKind::Removed, &path);
        Ok(true)
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<bool> {
        let from = normalize_relative(from);
        let to = normalize_relative(to);
        if from.is_empty() || to.is_empty() {
            return Ok(false);
        }
        {
            let mut entries = self.entries.write().expect("lock poisoned");
            if !entries.contains_key(&from) {
                return Ok(false);
            }
            let moved: Vec<String> = entries
                .keys()
                .filter(|key| is_under(key, &from))
                .cloned()
                .collect();
            insert_parents(&mut entries, &to);
            for key in moved {
                if let Some(entry) = entries.remove(&key) {
                    let target = format!("{to}{}", &key[from.len()..]);
                    entries.insert(target, entry);
                }
            }
        }
        self.notify(WatchEventKind::Removed, &from);
        self.notify(WatchEventKind::Created, &to);
        Ok(true)
    }

    async fn copy(&self, from: &str, to: &str) -> FsResult<bool> {
        let from = normalize_relative(from);
        let to = normalize_relative(to);
        {
            let mut entries = self.entries.write().expect("lock poisoned");
            if from.is_empty() || to.is_empty() || !entries.contains_key(&from) {
                return Ok(false);
            }
            let copied: Vec<(String, Entry)> = entries
                .iter()
                .filter(|(key, _)| is_under(key, &from))
                .map(|(key, entry)| (format!("{to}{}", &key[from.len()..]), entry.clone()))
                .collect();
            insert_parents(&mut entries, &to);
            entries.extend(copied);
        }
        self.notify(WatchEventKind::Created, &to);
        Ok(true)
    }

    async fn create_directory(&self, path: &str) -> FsResult<bool> {
        let path = normalize_relative(path);
        {
            let mut entries = self.entries.write().expect("lock poisoned");
            match entries.get(&path) {
                Some(Entry::Directory { .. }) => return Ok(true),
                Some(Entry::File { .. }) => return Ok(false),
                None => {}
            }
            insert_parents(&mut entries, &path);
            entries.insert(
                path.clone(),
                Entry::Directory {
                    modified: Utc::now(),
                },
            );
        }
        self.notify(WatchEventKind::Created, &path);
        Ok(true)
    }

    async fn directory_tree(&self, path: &str, options: TreeOptions) -> FsResult<PathStream> {
        self.check_reads()?;
        let base = normalize_relative(path);
        let entries = self.snapshot();
        match entries.get(&base) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => {
                return Err(FsError::io(
                    base,
                    std::io::Error::other("not a directory"),
                ))
            }
            None => return Err(FsError::not_found(base)),
        }

        let base_depth = if base.is_empty() {
            0
        } else {
            base.split('/').count()
        };
        let paths: Vec<FsResult<String>> = entries
            .into_iter()
            .filter(|(key, _)| key != &base && is_under(key, &base))
            .filter(|(key, _)| options.recursive || key.split('/').count() == base_depth + 1)
            .filter(|(key, entry)| !excluded(&options.ignore_filter, key, entry.is_dir()))
            .map(|(key, entry)| Ok(display_path(&key, entry.is_dir())))
            .collect();

        Ok(stream::iter(paths).boxed())
    }

    async fn glob(&self, pattern: &str, options: GlobOptions) -> FsResult<Vec<String>> {
        self.check_reads()?;
        let matcher = compile_glob(pattern)?;
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|(key, _)| !key.is_empty())
            .filter(|(_, entry)| options.include_directories || !entry.is_dir())
            .filter(|(key, entry)| !excluded(&options.ignore_filter, key, entry.is_dir()))
            .filter(|(key, _)| matcher.is_match(key))
            .map(|(key, _)| if options.absolute { format!("/{key}") } else { key })
            .collect())
    }

    async fn grep(&self, patterns: &[String], options: GrepOptions) -> FsResult<Vec<GrepResult>> {
        self.check_reads()?;
        if self.faults.lock().expect("lock poisoned").grep {
            return Err(FsError::Provider(anyhow!("{}: grep unavailable", self.name)));
        }
        let regexes = compile_patterns(patterns, options.case_insensitive)?;
        let mut results = Vec::new();
        for (key, entry) in self.snapshot() {
            let Entry::File { data, .. } = entry else {
                continue;
            };
            if excluded(&options.ignore_filter, &key, false) {
                continue;
            }
            let Ok(text) = std::str::from_utf8(&data) else {
                continue;
            };
            results.extend(grep_text(&key, text, &regexes, options.include_content));
        }
        Ok(results)
    }

    async fn watch(&self, path: &str, options: WatchOptions) -> FsResult<WatchStream> {
        let base = normalize_relative(path);
        let mut receiver = self.events.subscribe();
        let stream = async_stream::stream! {
            loop {
                let event = match receiver.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if !is_under(&event.path, &base) || event.path == base {
                    continue;
                }
                if !options.recursive {
                    let rest = if base.is_empty() { event.path.as_str() } else { &event.path[base.len() + 1..] };
                    if rest.contains('/') {
                        continue;
                    }
                }
                if excluded(&options.ignore_filter, &event.path, false) {
                    continue;
                }
                yield event;
            }
        };
        Ok(stream.boxed())
    }

    async fn execute_command(
        &self,
        command: &str,
        _options: CommandOptions,
    ) -> FsResult<CommandOutcome> {
        self.executed
            .lock()
            .expect("lock poisoned")
            .push(command.to_string());
        let scripted = self
            .scripted
            .lock()
            .expect("lock poisoned")
            .get(command)
            .cloned();
        Ok(scripted.unwrap_or_else(|| CommandOutcome {
            ok: false,
            exit_code: Some(127),
            stdout: String::new(),
            stderr: format!("{command}: command not found"),
            error: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(stream: PathStream) -> Vec<String> {
        stream
            .map(|item| item.unwrap())
            .collect::<Vec<_>>()
            .await
    }

    #[tokio::test]
    async fn test_write_read_roundtrip_creates_parents() {
        let provider = MemoryProvider::new("mem");
        assert!(provider.write_file("a/b/c.txt", b"hello").await.unwrap());
        assert!(provider.exists("a/b").await.unwrap());
        assert!(provider.stat("a").await.unwrap().is_directory);

        let content = provider
            .read_file("/a/b/c.txt", ReadEncoding::Utf8)
            .await
            .unwrap();
        assert_eq!(content, Some(FileContent::Text("hello".to_string())));
        assert_eq!(
            provider.read_file("missing", ReadEncoding::Utf8).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_append_and_stat() {
        let provider = MemoryProvider::new("mem");
        provider.append_file("log.txt", b"one\n").await.unwrap();
        provider.append_file("log.txt", b"two\n").await.unwrap();
        let stat = provider.stat("log.txt").await.unwrap();
        assert!(stat.is_file);
        assert_eq!(stat.size, 8);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let provider = MemoryProvider::new("mem");
        provider.insert_file("dir/file.txt", "x");
        assert!(provider.delete_file("dir").await.is_err());
        assert!(provider.delete_file("dir/file.txt").await.unwrap());
        assert!(provider.delete_file("dir").await.unwrap());
        assert!(!provider.delete_file("dir").await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_and_copy_subtrees() {
        let provider = MemoryProvider::new("mem");
        provider.insert_file("src/a.rs", "a");
        provider.insert_file("src/sub/b.rs", "b");

        assert!(provider.copy("src", "backup").await.unwrap());
        assert!(provider.exists("backup/sub/b.rs").await.unwrap());

        assert!(provider.rename("src", "lib").await.unwrap());
        assert!(!provider.exists("src/a.rs").await.unwrap());
        assert!(provider.exists("lib/sub/b.rs").await.unwrap());
        assert!(!provider.rename("nope", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_directory_tree_marks_dirs_and_filters() {
        let provider = MemoryProvider::new("mem");
        provider.insert_file("src/main.rs", "");
        provider.insert_file("src/util/mod.rs", "");
        provider.insert_file("node_modules/x/index.js", "");

        let filter = IgnoreFilter::from_patterns(&["node_modules"]).unwrap();
        let all = collect(
            provider
                .directory_tree(
                    "",
                    TreeOptions {
                        ignore_filter: Some(filter),
                        recursive: true,
                    },
                )
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(all, vec!["src/", "src/main.rs", "src/util/", "src/util/mod.rs"]);

        let shallow = collect(
            provider
                .directory_tree(
                    "src",
                    TreeOptions {
                        ignore_filter: None,
                        recursive: false,
                    },
                )
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(shallow, vec!["src/main.rs", "src/util/"]);
    }

    #[tokio::test]
    async fn test_glob_and_grep() {
        let provider = MemoryProvider::new("mem");
        provider.insert_file("src/main.rs", "fn main() {}\n");
        provider.insert_file("src/lib.rs", "pub fn lib() {}\n");
        provider.insert_file("README.md", "main docs\n");

        let rust = provider.glob("**/*.rs", GlobOptions::default()).await.unwrap();
        assert_eq!(rust, vec!["src/lib.rs", "src/main.rs"]);

        let hits = provider
            .grep(&["main".to_string()], GrepOptions::default())
            .await
            .unwrap();
        let files: Vec<&str> = hits.iter().map(|h| h.file.as_str()).collect();
        assert_eq!(files, vec!["README.md", "src/main.rs"]);
    }

    #[tokio::test]
    async fn test_watch_reports_mutations_under_path() {
        let provider = MemoryProvider::new("mem");
        let mut events = provider
            .watch("src", WatchOptions::default())
            .await
            .unwrap();

        provider.write_file("other.txt", b"x").await.unwrap();
        provider.write_file("src/a.rs", b"x").await.unwrap();

        let event = events.next().await.unwrap();
        assert_eq!(
            event,
            WatchEvent {
                kind: WatchEventKind::Created,
                path: "src/a.rs".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_scripted_commands() {
        let provider = MemoryProvider::new("mem");
        provider.script_command(
            "npm test",
            CommandOutcome {
                ok: true,
                exit_code: Some(0),
                stdout: "passed".to_string(),
                ..CommandOutcome::default()
            },
        );

        let ok = provider
            .execute_command("npm test", CommandOptions::default())
            .await
            .unwrap();
        assert!(ok.ok);
        let missing = provider
            .execute_command("nope", CommandOptions::default())
            .await
            .unwrap();
        assert_eq!(missing.exit_code, Some(127));
        assert_eq!(provider.executed_commands(), vec!["npm test", "nope"]);
    }
}
