use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agentfs_core::provider::{GrepOptions, TreeOptions};
use agentfs_core::{
    FilesystemFacade, LocalProvider, MemoryProvider, ProviderRegistry, Session, Settings,
    SettingsManager,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod approver;

use approver::StdinApprover;

#[derive(Parser, Debug)]
#[command(
    name = "agentfs",
    version = env!("CARGO_PKG_VERSION"),
    about = "Virtual filesystem toolbox for coding agents"
)]
struct Args {
    /// Workspace root served by the local provider (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Settings file to use instead of ~/.agentfs/settings.toml
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Mirror logs to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a command line without running it
    Classify {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        line: Vec<String>,
    },
    /// Rank workspace files against a natural language query
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long)]
        max: Option<usize>,
        /// Render matches with snippets
        #[arg(long)]
        context: bool,
    },
    /// List the workspace tree
    Tree {
        path: Option<String>,
        /// Only list direct children
        #[arg(long)]
        shallow: bool,
    },
    /// List files matching a glob
    Glob { pattern: String },
    /// Search file contents with regular expressions
    Grep {
        #[arg(required = true)]
        patterns: Vec<String>,
        #[arg(long, short = 'i')]
        ignore_case: bool,
    },
    /// Run a command in the workspace after a safety check
    Run {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
        /// Approve without prompting
        #[arg(long)]
        yes: bool,
        /// Timeout in seconds (overrides settings)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Print the settings JSON schema
    Schema,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let Args {
        root,
        settings,
        command,
        ..
    } = args;

    match command {
        // Needs no workspace and must not create a settings file.
        Command::Schema => {
            println!("{}", render_schema()?);
            Ok(())
        }
        command => {
            let settings = match settings {
                Some(path) => SettingsManager::from_path(path)?,
                None => SettingsManager::new()?,
            }
            .settings();
            let root = match root {
                Some(root) => root,
                None => std::env::current_dir().context("Failed to read current directory")?,
            };
            let facade = build_facade(&root, &settings)?;
            dispatch(&facade, command).await
        }
    }
}

fn render_schema() -> Result<String> {
    Ok(serde_json::to_string_pretty(&Settings::json_schema())?)
}

async fn dispatch(facade: &FilesystemFacade, command: Command) -> Result<()> {
    let mut session = Session::new();

    match command {
        Command::Classify { line } => {
            let line = line.join(" ");
            let classification = facade.classifier().explain(&line);
            println!("{}", classification.verdict);
            for subcommand in &classification.subcommands {
                println!("  {subcommand}");
            }
            if let Some(pattern) = &classification.matched_pattern {
                println!("matched: {pattern}");
            }
        }
        Command::Search {
            query,
            max,
            context,
        } => {
            let matches = facade.search(&mut session, &query, max).await?;
            if context {
                print!("{}", facade.render_search_context(&session, &matches).await?);
            } else {
                for m in &matches {
                    println!("{:>7.1}  {:<8}  {}", m.score, m.match_type, m.file_path);
                }
            }
        }
        Command::Tree { path, shallow } => {
            let options = TreeOptions {
                ignore_filter: None,
                recursive: !shallow,
            };
            let mut paths = facade
                .directory_tree(&mut session, path.as_deref().unwrap_or(""), options)
                .await?;
            while let Some(path) = paths.next().await {
                println!("{}", path?);
            }
        }
        Command::Glob { pattern } => {
            for path in facade.glob(&mut session, &pattern, Default::default()).await? {
                println!("{path}");
            }
        }
        Command::Grep {
            patterns,
            ignore_case,
        } => {
            let options = GrepOptions {
                include_content: true,
                case_insensitive: ignore_case,
                ..GrepOptions::default()
            };
            for hit in facade.grep(&mut session, &patterns, options).await? {
                println!(
                    "{}:{}: {}",
                    hit.file,
                    hit.line,
                    hit.content.as_deref().unwrap_or(&hit.matched_text)
                );
            }
        }
        Command::Run {
            command,
            yes,
            timeout,
        } => {
            let command = command.join(" ");
            let mut options = facade.command_options();
            if let Some(secs) = timeout {
                options.timeout = Duration::from_secs(secs);
            }

            let approver = StdinApprover { assume_yes: yes };
            let outcome = facade
                .execute_command(&mut session, &command, options, &approver)
                .await?;

            print!("{}", outcome.stdout);
            eprint!("{}", outcome.stderr);
            if let Some(error) = &outcome.error {
                eprintln!("{error}");
            }
            if !outcome.ok {
                std::process::exit(outcome.exit_code.unwrap_or(1));
            }
        }
        Command::Schema => println!("{}", render_schema()?),
    }

    Ok(())
}

fn build_facade(root: &std::path::Path, settings: &Settings) -> Result<FilesystemFacade> {
    let local = LocalProvider::new("local", root)
        .with_context(|| format!("Failed to open workspace {}", root.display()))?
        .with_execution_mode(settings.execution.execution_mode);

    let registry = ProviderRegistry::new();
    registry.register("local", Arc::new(local));
    registry.register("memory", Arc::new(MemoryProvider::new("memory")));

    Ok(FilesystemFacade::from_settings(registry, settings)?)
}

fn setup_tracing(verbose: bool) -> Result<()> {
    let home = dirs::home_dir().context("Failed to get home directory")?;
    let trace_dir = home.join(".agentfs").join("trace");
    std::fs::create_dir_all(&trace_dir).context("Failed to create trace directory")?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(trace_dir.join("agentfs.log"))
        .context("Failed to open log file")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(verbose.then(|| fmt::layer().with_writer(std::io::stderr).with_target(false)))
        .with(filter)
        .init();

    Ok(())
}
