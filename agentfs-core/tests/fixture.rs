use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentfs_core::{
    FilesystemFacade, LocalProvider, MemoryProvider, ProviderRegistry, Session, Settings,
    SettingsManager,
};
use tempfile::TempDir;

/// Files every fixture workspace starts with.
pub const SAMPLE_FILES: &[(&str, &str)] = &[
    (
        "src/main.rs",
        "mod config;\n\nfn main() {\n    let cfg = config::load();\n    println!(\"{cfg:?}\");\n}\n",
    ),
    (
        "src/config.rs",
        "#[derive(Debug)]\npub struct AppConfig;\n\npub fn load() -> AppConfig {\n    AppConfig\n}\n",
    ),
    (
        "src/auth/login_handler.rs",
        "pub fn handle_login(user: &str) -> bool {\n    !user.is_empty()\n}\n",
    ),
    (
        "docs/guide.md",
        "# Guide\n\nThe config loader reads settings.\n",
    ),
    ("node_modules/pkg/index.js", "module.exports = {};\n"),
    ("target/debug/app", "binary"),
    (".gitignore", "target/\n"),
];

/// A temp workspace on disk behind a `LocalProvider` named "local" (the
/// default), plus an empty `MemoryProvider` named "memory".
pub struct Fixture {
    pub facade: FilesystemFacade,
    pub session: Session,
    pub memory: Arc<MemoryProvider>,
    pub settings: SettingsManager,
    workspace_dir: TempDir,
}

// A `Drop` impl forbids partial moves, so `async move` blocks capture the
// whole fixture and the temp workspace outlives the test body.
impl Drop for Fixture {
    fn drop(&mut self) {}
}

impl Fixture {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    pub fn with_settings<F>(update: F) -> Self
    where
        F: FnOnce(&mut Settings),
    {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let workspace_dir = TempDir::new().unwrap();
        for (path, content) in SAMPLE_FILES {
            write(workspace_dir.path(), path, content);
        }

        // Settings live in the temp dir, never in the user's home.
        let settings_path = workspace_dir.path().join(".agentfs").join("settings.toml");
        let settings = SettingsManager::from_path(settings_path).unwrap();
        settings.update_setting(update);

        let registry = ProviderRegistry::new();
        registry.register(
            "local",
            Arc::new(LocalProvider::new("local", workspace_dir.path()).unwrap()),
        );
        let memory = Arc::new(MemoryProvider::new("memory"));
        registry.register("memory", memory.clone());

        let facade = FilesystemFacade::from_settings(registry, &settings.settings()).unwrap();

        Fixture {
            facade,
            session: Session::new(),
            memory,
            settings,
            workspace_dir,
        }
    }

    #[allow(dead_code)]
    pub fn workspace_path(&self) -> PathBuf {
        self.workspace_dir.path().to_path_buf()
    }

    #[allow(dead_code)]
    pub fn write(&self, path: &str, content: &str) {
        write(self.workspace_dir.path(), path, content);
    }
}

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, content).unwrap();
}

/// Run an async test on a current-thread runtime with a timeout.
#[allow(dead_code)]
pub fn run<F, Fut>(test_fn: F)
where
    F: FnOnce(Fixture) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    run_with_settings(|_| {}, test_fn)
}

pub fn run_with_settings<S, F, Fut>(update: S, test_fn: F)
where
    S: FnOnce(&mut Settings),
    F: FnOnce(Fixture) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    use tokio::time::{timeout, Duration};

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    runtime.block_on(async {
        let fixture = Fixture::with_settings(update);
        timeout(Duration::from_secs(30), test_fn(fixture))
            .await
            .expect("Test timed out after 30 seconds");
    });
}
