//! The entry point hosts talk to.
//!
//! Every call resolves the session's active provider, injects the session's
//! ignore filter where the operation walks the tree, and keeps the session's
//! dirty flag and ignore cache current. Commands pass through the safety
//! classifier and, unless safe, a `CommandApprover`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{FsError, FsResult};
use crate::ignore_filter::{IgnoreConfig, IgnoreFilter, IgnoreFilterBuilder};
use crate::provider::config::ExecutionConfig;
use crate::provider::{
    normalize_relative, CommandOptions, CommandOutcome, FileContent, FileStat, GlobOptions,
    GrepOptions, GrepResult, PathStream, Provider, ProviderRegistry, ReadEncoding, TreeOptions,
    WatchOptions, WatchStream,
};
use crate::safety::{Classification, CommandSafetyClassifier, SafetyVerdict};
use crate::search::{extract_snippets, FileSearchConfig, ScopedSource, SearchMatch, SearchRanker};
use crate::session::Session;
use crate::settings::Settings;

/// Asked before a command that is not classified safe may run.
#[async_trait]
pub trait CommandApprover: Send + Sync {
    async fn approve(&self, command: &str, classification: &Classification) -> bool;
}

pub struct AlwaysApprove;

#[async_trait]
impl CommandApprover for AlwaysApprove {
    async fn approve(&self, _command: &str, _classification: &Classification) -> bool {
        true
    }
}

pub struct AlwaysDeny;

#[async_trait]
impl CommandApprover for AlwaysDeny {
    async fn approve(&self, _command: &str, _classification: &Classification) -> bool {
        false
    }
}

pub struct FilesystemFacade {
    registry: ProviderRegistry,
    classifier: CommandSafetyClassifier,
    ignore_builder: IgnoreFilterBuilder,
    ranker: SearchRanker,
    search_config: FileSearchConfig,
    execution: ExecutionConfig,
}

impl FilesystemFacade {
    pub fn new(
        registry: ProviderRegistry,
        classifier: CommandSafetyClassifier,
        ignore_config: IgnoreConfig,
    ) -> Self {
        Self {
            registry,
            classifier,
            ignore_builder: IgnoreFilterBuilder::new(ignore_config),
            ranker: SearchRanker::default(),
            search_config: FileSearchConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }

    /// Wire everything from settings. The registry keeps its own default
    /// provider if it already has one.
    pub fn from_settings(registry: ProviderRegistry, settings: &Settings) -> FsResult<Self> {
        let classifier = CommandSafetyClassifier::new(&settings.safety)?;
        let registry = match registry.default_provider() {
            Some(_) => registry,
            None => registry.with_default(settings.default_provider.clone()),
        };
        Ok(Self::new(registry, classifier, settings.ignore.clone())
            .with_search_config(settings.file_search.clone())
            .with_execution_config(settings.execution.clone()))
    }

    pub fn with_search_config(mut self, config: FileSearchConfig) -> Self {
        self.search_config = config;
        self
    }

    pub fn with_execution_config(mut self, config: ExecutionConfig) -> Self {
        self.execution = config;
        self
    }

    pub fn with_ranker(mut self, ranker: SearchRanker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &CommandSafetyClassifier {
        &self.classifier
    }

    pub fn search_config(&self) -> &FileSearchConfig {
        &self.search_config
    }

    /// Options built from the execution settings.
    pub fn command_options(&self) -> CommandOptions {
        self.execution.command_options()
    }

    pub fn provider(&self, session: &Session) -> FsResult<Arc<dyn Provider>> {
        self.registry.active(session)
    }

    pub fn set_active_provider(&self, session: &mut Session, name: &str) -> FsResult<()> {
        self.registry.set_active(session, name)
    }

    /// The session's ignore filter, built on first use and cached until an
    /// ignore file changes or the provider is switched.
    pub async fn ignore_filter(&self, session: &mut Session) -> FsResult<IgnoreFilter> {
        if let Some(filter) = session.cached_ignore_filter() {
            return Ok(filter.clone());
        }
        let provider = self.provider(session)?;
        let filter = self.ignore_builder.build(provider.as_ref()).await?;
        debug!(session = %session.id, provider = provider.name(), "Cached ignore filter");
        session.cache_ignore_filter(filter.clone());
        Ok(filter)
    }

    fn after_mutation(&self, session: &mut Session, succeeded: bool, paths: &[&str]) {
        if !succeeded {
            return;
        }
        session.dirty = true;
        let ignore = self.ignore_builder.config();
        if paths.iter().any(|path| ignore.is_ignore_file(path)) {
            debug!(session = %session.id, "Ignore file changed, dropping cached filter");
            session.invalidate_ignore_filter();
        }
    }

    // Reads

    pub async fn exists(&self, session: &Session, path: &str) -> FsResult<bool> {
        self.provider(session)?.exists(path).await
    }

    pub async fn stat(&self, session: &Session, path: &str) -> FsResult<FileStat> {
        self.provider(session)?.stat(path).await
    }

    pub async fn read_file(
        &self,
        session: &Session,
        path: &str,
        encoding: ReadEncoding,
    ) -> FsResult<Option<FileContent>> {
        self.provider(session)?.read_file(path, encoding).await
    }

    pub async fn read_to_string(&self, session: &Session, path: &str) -> FsResult<Option<String>> {
        let content = self.read_file(session, path, ReadEncoding::Utf8).await?;
        Ok(content.map(|c| match c {
            FileContent::Text(text) => text,
            FileContent::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }))
    }

    // Mutations

    pub async fn write_file(
        &self,
        session: &mut Session,
        path: &str,
        content: impl AsRef<[u8]>,
    ) -> FsResult<bool> {
        let written = self
            .provider(session)?
            .write_file(path, content.as_ref())
            .await?;
        self.after_mutation(session, written, &[path]);
        Ok(written)
    }

    pub async fn append_file(
        &self,
        session: &mut Session,
        path: &str,
        content: impl AsRef<[u8]>,
    ) -> FsResult<bool> {
        let appended = self
            .provider(session)?
            .append_file(path, content.as_ref())
            .await?;
        self.after_mutation(session, appended, &[path]);
        Ok(appended)
    }

    pub async fn delete_file(&self, session: &mut Session, path: &str) -> FsResult<bool> {
        let deleted = self.provider(session)?.delete_file(path).await?;
        self.after_mutation(session, deleted, &[path]);
        Ok(deleted)
    }

    pub async fn rename(&self, session: &mut Session, from: &str, to: &str) -> FsResult<bool> {
        let renamed = self.provider(session)?.rename(from, to).await?;
        self.after_mutation(session, renamed, &[from, to]);
        Ok(renamed)
    }

    pub async fn copy(&self, session: &mut Session, from: &str, to: &str) -> FsResult<bool> {
        let copied = self.provider(session)?.copy(from, to).await?;
        self.after_mutation(session, copied, &[to]);
        Ok(copied)
    }

    pub async fn create_directory(&self, session: &mut Session, path: &str) -> FsResult<bool> {
        let created = self.provider(session)?.create_directory(path).await?;
        self.after_mutation(session, created, &[]);
        Ok(created)
    }

    // Tree-wide operations. The session filter is used unless the caller
    // passed one explicitly.

    pub async fn directory_tree(
        &self,
        session: &mut Session,
        path: &str,
        mut options: TreeOptions,
    ) -> FsResult<PathStream> {
        if options.ignore_filter.is_none() {
            options.ignore_filter = Some(self.ignore_filter(session).await?);
        }
        self.provider(session)?.directory_tree(path, options).await
    }

    pub async fn glob(
        &self,
        session: &mut Session,
        pattern: &str,
        mut options: GlobOptions,
    ) -> FsResult<Vec<String>> {
        if options.ignore_filter.is_none() {
            options.ignore_filter = Some(self.ignore_filter(session).await?);
        }
        self.provider(session)?.glob(pattern, options).await
    }

    pub async fn grep(
        &self,
        session: &mut Session,
        patterns: &[String],
        mut options: GrepOptions,
    ) -> FsResult<Vec<GrepResult>> {
        if options.ignore_filter.is_none() {
            options.ignore_filter = Some(self.ignore_filter(session).await?);
        }
        self.provider(session)?.grep(patterns, options).await
    }

    pub async fn watch(
        &self,
        session: &mut Session,
        path: &str,
        mut options: WatchOptions,
    ) -> FsResult<WatchStream> {
        if options.ignore_filter.is_none() {
            options.ignore_filter = Some(self.ignore_filter(session).await?);
        }
        self.provider(session)?.watch(path, options).await
    }

    // Commands

    /// Classify, ask for approval unless safe, then run on the active provider.
    pub async fn execute_command(
        &self,
        session: &mut Session,
        command: &str,
        options: CommandOptions,
        approver: &dyn CommandApprover,
    ) -> FsResult<CommandOutcome> {
        if command.trim().is_empty() {
            return Err(FsError::EmptyCommand);
        }
        let provider = self.provider(session)?;

        let classification = self.classifier.explain(command);
        if classification.verdict != SafetyVerdict::Safe {
            if !approver.approve(command, &classification).await {
                warn!(command, verdict = %classification.verdict, "Command was not approved");
                return Err(FsError::NotApproved {
                    command: command.to_string(),
                    verdict: classification.verdict,
                });
            }
            info!(command, verdict = %classification.verdict, "Command approved");
        }

        let outcome = provider.execute_command(command, options).await?;
        if outcome.ok {
            session.dirty = true;
        }
        Ok(outcome)
    }

    // Selected files

    async fn validate_paths(&self, session: &Session, paths: &[String]) -> FsResult<Vec<String>> {
        let provider = self.provider(session)?;
        let mut normalized = Vec::with_capacity(paths.len());
        for path in paths {
            if !provider.exists(path).await? {
                return Err(FsError::not_found(path.clone()));
            }
            normalized.push(normalize_relative(path));
        }
        Ok(normalized)
    }

    /// All paths must exist; on failure the selection is unchanged.
    pub async fn add_selected_files(&self, session: &mut Session, paths: &[String]) -> FsResult<()> {
        let validated = self.validate_paths(session, paths).await?;
        for path in validated {
            session.selected_files.insert(path);
        }
        Ok(())
    }

    pub fn remove_selected_file(&self, session: &mut Session, path: &str) -> FsResult<()> {
        session.selected_files.remove(&normalize_relative(path))
    }

    pub async fn set_selected_files(&self, session: &mut Session, paths: &[String]) -> FsResult<()> {
        let validated = self.validate_paths(session, paths).await?;
        session.selected_files.replace(validated);
        Ok(())
    }

    // Search

    /// Ranked search over the active provider. `None` uses the configured
    /// result count.
    pub async fn search(
        &self,
        session: &mut Session,
        query: &str,
        max_results: Option<usize>,
    ) -> FsResult<Vec<SearchMatch>> {
        let source = ScopedSource {
            provider: self.provider(session)?,
            ignore_filter: Some(self.ignore_filter(session).await?),
        };
        let max = max_results.unwrap_or(self.search_config.max_results);
        self.ranker.search(query, &source, max).await
    }

    /// Matches with snippets around their content hits, ready for a prompt.
    pub async fn render_search_context(
        &self,
        session: &Session,
        matches: &[SearchMatch],
    ) -> FsResult<String> {
        let provider = self.provider(session)?;
        let mut output = String::from("Search Results:\n");
        for found in matches {
            output.push_str(&format!(
                "\n=== {} (score {:.1}, {}) ===\n",
                found.file_path, found.score, found.match_type
            ));
            if found.line_matches.is_empty() {
                continue;
            }
            let content = match provider.read_file(&found.file_path, ReadEncoding::Utf8).await {
                Ok(Some(content)) => content,
                Ok(None) => {
                    warn!(path = %found.file_path, "Matched file disappeared before rendering");
                    continue;
                }
                Err(e) => {
                    warn!(path = %found.file_path, error = %e, "Failed to read matched file");
                    continue;
                }
            };
            let Some(text) = content.as_text() else {
                continue;
            };
            let rendered: Vec<String> =
                extract_snippets(text, &found.line_matches, &self.search_config)
                    .iter()
                    .map(|snippet| snippet.render())
                    .collect();
            output.push_str(&rendered.join("\n...\n"));
            output.push('\n');
        }
        Ok(output)
    }

    /// Selected files with their contents, or `None` when nothing is selected.
    pub async fn render_selected_files(&self, session: &Session) -> FsResult<Option<String>> {
        if session.selected_files.is_empty() {
            return Ok(None);
        }
        let provider = self.provider(session)?;
        let mut output = String::from("Selected Files:\n");
        for path in session.selected_files.iter() {
            match provider.read_file(path, ReadEncoding::Utf8).await {
                Ok(Some(content)) => {
                    let text = content.as_text().unwrap_or("<binary>");
                    output.push_str(&format!("\n=== {path} ===\n{text}"));
                }
                Ok(None) => warn!(path = %path, "Selected file no longer exists"),
                Err(e) => warn!(path = %path, error = %e, "Failed to read selected file"),
            }
        }
        Ok(Some(output))
    }
}
