pub mod error;
pub mod facade;
pub mod ignore_filter;
pub mod provider;
pub mod safety;
pub mod search;
pub mod session;
pub mod settings;

// Library surface most hosts need. Everything else stays reachable through
// the modules above.
pub use error::{FsError, FsResult};
pub use facade::{AlwaysApprove, AlwaysDeny, CommandApprover, FilesystemFacade};
pub use ignore_filter::{IgnoreConfig, IgnoreFilter, IgnoreFilterBuilder};
pub use provider::{LocalProvider, MemoryProvider, Provider, ProviderRegistry};
pub use safety::{Classification, CommandSafetyClassifier, SafetyConfig, SafetyVerdict};
pub use search::{SearchMatch, SearchRanker};
pub use session::{SelectedFileSet, Session};
pub use settings::{Settings, SettingsManager};
