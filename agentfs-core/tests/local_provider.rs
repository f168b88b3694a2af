use std::time::Duration;

use agentfs_core::provider::config::CommandExecutionMode;
use agentfs_core::provider::{
    CommandOptions, FileContent, GlobOptions, GrepOptions, ReadEncoding, TreeOptions,
    WatchOptions,
};
use agentfs_core::{FsError, IgnoreFilter, LocalProvider, Provider};
use futures::StreamExt;
use tempfile::TempDir;

fn provider() -> (TempDir, LocalProvider) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = TempDir::new().unwrap();
    let provider = LocalProvider::new("local", dir.path()).unwrap();
    (dir, provider)
}

#[tokio::test]
async fn test_file_lifecycle() {
    let (dir, provider) = provider();

    assert!(provider.write_file("a/b/notes.txt", b"one\n").await.unwrap());
    assert!(provider.append_file("a/b/notes.txt", b"two\n").await.unwrap());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("a/b/notes.txt")).unwrap(),
        "one\ntwo\n"
    );

    let stat = provider.stat("a/b/notes.txt").await.unwrap();
    assert!(stat.is_file);
    assert_eq!(stat.size, 8);
    assert!(stat.modified.is_some());
    assert!(provider.stat("a").await.unwrap().is_directory);

    assert!(provider.copy("a", "copy").await.unwrap());
    assert!(provider.exists("copy/b/notes.txt").await.unwrap());

    assert!(provider.rename("a/b/notes.txt", "moved.txt").await.unwrap());
    assert!(!provider.exists("a/b/notes.txt").await.unwrap());
    assert_eq!(
        provider.read_file("moved.txt", ReadEncoding::Utf8).await.unwrap(),
        Some(FileContent::Text("one\ntwo\n".to_string()))
    );

    assert!(provider.delete_file("moved.txt").await.unwrap());
    assert!(!provider.delete_file("moved.txt").await.unwrap());
}

#[tokio::test]
async fn test_binary_reads() {
    let (dir, provider) = provider();
    std::fs::write(dir.path().join("blob.bin"), [0xff, 0x00, 0xfe]).unwrap();

    let bytes = provider
        .read_file("blob.bin", ReadEncoding::Binary)
        .await
        .unwrap();
    assert_eq!(bytes, Some(FileContent::Bytes(vec![0xff, 0x00, 0xfe])));

    let err = provider
        .read_file("blob.bin", ReadEncoding::Utf8)
        .await
        .unwrap_err();
    assert!(matches!(err, FsError::Io { .. }));
}

#[tokio::test]
async fn test_delete_non_empty_directory_fails() {
    let (_dir, provider) = provider();
    provider.write_file("dir/file.txt", b"x").await.unwrap();
    assert!(matches!(
        provider.delete_file("dir").await,
        Err(FsError::Io { .. })
    ));
    provider.delete_file("dir/file.txt").await.unwrap();
    assert!(provider.delete_file("dir").await.unwrap());
}

#[tokio::test]
async fn test_escaping_paths_rejected() {
    let (_dir, provider) = provider();
    let err = provider.write_file("../escape.txt", b"x").await.unwrap_err();
    assert!(matches!(err, FsError::PathEscapesRoot { .. }));
    let err = provider.read_file("../../etc/passwd", ReadEncoding::Utf8).await.unwrap_err();
    assert!(matches!(err, FsError::PathEscapesRoot { .. }));
}

#[tokio::test]
async fn test_directory_tree_streams_and_prunes() {
    let (_dir, provider) = provider();
    for path in ["src/lib.rs", "src/util/mod.rs", "node_modules/x/index.js", "README.md"] {
        provider.write_file(path, b"").await.unwrap();
    }
    let filter = IgnoreFilter::from_patterns(&["node_modules"]).unwrap();

    let paths: Vec<String> = provider
        .directory_tree(
            "",
            TreeOptions {
                ignore_filter: Some(filter),
                recursive: true,
            },
        )
        .await
        .unwrap()
        .map(|p| p.unwrap())
        .collect()
        .await;
    assert_eq!(
        paths,
        vec!["README.md", "src/", "src/lib.rs", "src/util/", "src/util/mod.rs"]
    );

    let shallow: Vec<String> = provider
        .directory_tree(
            "src",
            TreeOptions {
                ignore_filter: None,
                recursive: false,
            },
        )
        .await
        .unwrap()
        .map(|p| p.unwrap())
        .collect()
        .await;
    assert_eq!(shallow, vec!["src/lib.rs", "src/util/"]);
}

#[tokio::test]
async fn test_directory_tree_can_stop_early() {
    let (_dir, provider) = provider();
    for i in 0..500 {
        provider
            .write_file(&format!("many/file_{i:03}.txt"), b"")
            .await
            .unwrap();
    }
    let first: Vec<String> = provider
        .directory_tree("many", TreeOptions::default())
        .await
        .unwrap()
        .take(3)
        .map(|p| p.unwrap())
        .collect()
        .await;
    assert_eq!(
        first,
        vec!["many/file_000.txt", "many/file_001.txt", "many/file_002.txt"]
    );
}

#[tokio::test]
async fn test_directory_tree_missing_path() {
    let (_dir, provider) = provider();
    let result = provider.directory_tree("nope", TreeOptions::default()).await;
    assert!(matches!(result, Err(FsError::NotFound { .. })));
}

#[tokio::test]
async fn test_glob_and_grep() {
    let (dir, provider) = provider();
    provider
        .write_file("src/lib.rs", b"pub fn parse() {}\n// TODO: tests\n")
        .await
        .unwrap();
    provider.write_file("src/main.rs", b"fn main() {}\n").await.unwrap();
    provider.write_file("notes.md", b"parse later\n").await.unwrap();

    let rust = provider.glob("**/*.rs", GlobOptions::default()).await.unwrap();
    assert_eq!(rust, vec!["src/lib.rs", "src/main.rs"]);

    let top = provider.glob("*.md", GlobOptions::default()).await.unwrap();
    assert_eq!(top, vec!["notes.md"]);

    let absolute = provider
        .glob(
            "notes.md",
            GlobOptions {
                absolute: true,
                ..GlobOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        absolute,
        vec![dir.path().canonicalize().unwrap().join("notes.md").display().to_string()]
    );

    let hits = provider
        .grep(
            &["PARSE".to_string()],
            GrepOptions {
                include_content: true,
                case_insensitive: true,
                ..GrepOptions::default()
            },
        )
        .await
        .unwrap();
    let found: Vec<(&str, usize)> = hits.iter().map(|h| (h.file.as_str(), h.line)).collect();
    assert_eq!(found, vec![("notes.md", 1), ("src/lib.rs", 1)]);
    assert_eq!(hits[1].content.as_deref(), Some("pub fn parse() {}"));

    let err = provider
        .grep(&["(".to_string()], GrepOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FsError::InvalidPattern { .. }));
}

#[tokio::test]
async fn test_execute_command_bash_mode() {
    let (_dir, provider) = provider();
    provider.write_file("sub/marker.txt", b"").await.unwrap();

    let mut options = CommandOptions::default();
    options.env.insert("AGENTFS_GREETING".to_string(), "hello".to_string());
    options.working_directory = Some("sub".to_string());

    let outcome = provider
        .execute_command("echo $AGENTFS_GREETING && ls", options)
        .await
        .unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.stdout, "hello\nmarker.txt\n");

    let failed = provider
        .execute_command("exit 3", CommandOptions::default())
        .await
        .unwrap();
    assert!(!failed.ok);
    assert_eq!(failed.exit_code, Some(3));
}

#[tokio::test]
async fn test_execute_command_direct_mode() {
    let (_dir, provider) = provider();
    let provider = provider.with_execution_mode(CommandExecutionMode::Direct);

    let outcome = provider
        .execute_command("echo 'a b' c", CommandOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.stdout, "a b c\n");

    // No shell: operators are plain arguments.
    let literal = provider
        .execute_command("echo x && echo y", CommandOptions::default())
        .await
        .unwrap();
    assert_eq!(literal.stdout, "x && echo y\n");

    let missing = provider
        .execute_command("definitely-not-a-binary-agentfs", CommandOptions::default())
        .await
        .unwrap();
    assert!(!missing.ok);
    assert!(missing.error.is_some());
}

#[tokio::test]
async fn test_execute_command_timeout_is_an_outcome() {
    let (_dir, provider) = provider();
    let options = CommandOptions {
        timeout: Duration::from_millis(200),
        ..CommandOptions::default()
    };
    let outcome = provider.execute_command("sleep 5", options).await.unwrap();
    assert!(!outcome.ok);
    assert_eq!(outcome.exit_code, None);
    assert!(outcome.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_execute_command_output_compacted() {
    let (_dir, provider) = provider();
    let options = CommandOptions {
        max_output_bytes: Some(100),
        ..CommandOptions::default()
    };
    let outcome = provider
        .execute_command("head -c 1000 /dev/zero | tr '\\0' 'x'", options)
        .await
        .unwrap();
    assert!(outcome.ok);
    assert!(outcome.stdout.contains("[output truncated: 900 bytes omitted]"));
}

#[tokio::test]
async fn test_watch_reports_new_file() {
    let (_dir, provider) = provider();
    let mut events = provider.watch("", WatchOptions::default()).await.unwrap();

    provider.write_file("watched.txt", b"hello").await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.next().await {
                Some(event) if event.path == "watched.txt" => return Some(event),
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await
    .expect("no watch event within 5s");
    assert!(event.is_some());
}
