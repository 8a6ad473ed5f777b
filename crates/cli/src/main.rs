//! toolhost: local tool servers for LLM agents.
//!
//! `start` launches a tool server in the foreground or detached; `stop`
//! signals a running instance; `init` bootstraps the config directory.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::process::ExitCode;
use std::path::PathBuf;
use toolhost_filesystem::config::ConfigOverrides;
use toolhost_filesystem::{http, FilesystemConfig, FilesystemService};
use toolhost_sandbox::Sandbox;
use toolhost_supervisor::{
    DetachedLauncher, FsRecordStore, InlineLauncher, RecordStore, ServerKind, ServerRecord,
    StartOutcome, Supervisor,
};

mod bootstrap;

#[derive(Parser)]
#[command(name = "toolhost")]
#[command(about = "Local tool servers for LLM agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a tool server
    Start(StartArgs),

    /// Stop a running tool server
    Stop(StopArgs),

    /// Create the config directory with example settings files
    Init(InitArgs),

    /// Run a tool server in the foreground (internal helper used by
    /// detached starts)
    #[command(hide = true)]
    Serve(ServeArgs),
}

#[derive(Args)]
struct StartArgs {
    #[command(flatten)]
    serve: ServeArgs,

    /// Run the server in detached (daemon) mode
    #[arg(long)]
    detach: bool,
}

#[derive(Args, Clone)]
struct ServeArgs {
    /// Type of server to run
    #[arg(long, value_parser = parse_server_kind)]
    server: ServerKind,

    /// Root directory for file operations (default:
    /// $TOOLHOST_FILESYSTEM_ALLOWED_DIR, then the working directory)
    #[arg(long)]
    allowed_dir: Option<PathBuf>,

    /// Host address to bind the server to
    #[arg(long)]
    host: Option<String>,

    /// Port to run the server on (0 picks an ephemeral port)
    #[arg(long)]
    port: Option<u16>,

    /// Allow binding a non-loopback host
    #[arg(long)]
    public: bool,
}

fn parse_server_kind(raw: &str) -> Result<ServerKind, String> {
    raw.parse()
        .map_err(|err: toolhost_supervisor::ParseServerKindError| err.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stderr only: in detached mode stderr is redirected to the .err log.
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    // Operator settings live in the config dir; a missing .env is fine.
    dotenvy::from_path(bootstrap::config_dir().join(".env")).ok();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Start(args) => {
            if args.detach {
                start_detached(&args.serve)
            } else {
                run_server(&args.serve)
            }
        }
        Commands::Serve(args) => run_server(&args),
        Commands::Stop(args) => stop(args),
        Commands::Init(args) => init(args),
    }
}

#[derive(Args)]
struct StopArgs {
    /// Type of server to stop
    #[arg(long, value_parser = parse_server_kind)]
    server: ServerKind,
}

#[derive(Args)]
struct InitArgs {
    /// Recreate the entire config directory from scratch
    #[arg(long)]
    force: bool,
}

/// Foreground path, shared by `start` (without --detach) and the internal
/// `serve` subcommand that detached children re-exec into.
fn run_server(args: &ServeArgs) -> Result<()> {
    if args.server != ServerKind::Filesystem {
        anyhow::bail!(
            "no launcher registered for server type {}; this binary serves only 'filesystem' (the search adapters run externally)",
            args.server
        );
    }

    let config = FilesystemConfig::from_env(ConfigOverrides {
        allowed_dir: args.allowed_dir.clone(),
        host: args.host.clone(),
        port: args.port,
        public: args.public,
    })?;

    let supervisor = Supervisor::with_default_store();
    let mut launcher =
        InlineLauncher::new(move || serve_filesystem(config).map_err(Into::into));
    supervisor.start(ServerKind::Filesystem, &mut launcher)?;
    Ok(())
}

/// Run the filesystem server until a termination or interrupt signal,
/// then tear down through a single path: drain in-flight requests,
/// release the listener, delete the PID record, exit cleanly.
fn serve_filesystem(config: FilesystemConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async {
        let sandbox = Sandbox::new(&config.allowed_dir).with_context(|| {
            format!("invalid allowed root {}", config.allowed_dir.display())
        })?;
        let listener = http::bind(&config).await?;
        let local_addr = listener.local_addr().context("listener address")?;

        let store = FsRecordStore::from_env();
        let record = ServerRecord {
            server: ServerKind::Filesystem,
            pid: std::process::id(),
            host: config.host.clone(),
            port: local_addr.port(),
            started_at_ms: unix_ms_now(),
        };
        store.write(&record)?;

        log::info!(
            "filesystem server listening on http://{local_addr} (allowed root {})",
            sandbox.root().display()
        );

        let service = FilesystemService::new(sandbox);
        let result = http::serve(listener, service, shutdown_signal()).await;

        if let Err(err) = store.delete(ServerKind::Filesystem) {
            log::warn!("failed to remove PID record during shutdown: {err}");
        }
        log::info!("filesystem server stopped");
        result
    })
}

/// Resolves on SIGTERM or Ctrl+C; axum then stops accepting new requests
/// and drains in-flight ones.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                log::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("received interrupt, shutting down gracefully");
        }
        _ = terminate => {
            log::info!("received termination signal, shutting down gracefully");
        }
    }
}

fn start_detached(args: &ServeArgs) -> Result<()> {
    let supervisor = Supervisor::with_default_store();
    let exe = std::env::current_exe()
        .context("cannot locate this executable for a detached start")?;

    let mut serve_args: Vec<OsString> = vec![
        OsString::from("serve"),
        OsString::from("--server"),
        OsString::from(args.server.as_str()),
    ];
    if let Some(dir) = &args.allowed_dir {
        serve_args.push(OsString::from("--allowed-dir"));
        serve_args.push(dir.as_os_str().to_os_string());
    }
    if let Some(host) = &args.host {
        serve_args.push(OsString::from("--host"));
        serve_args.push(OsString::from(host));
    }
    if let Some(port) = args.port {
        serve_args.push(OsString::from("--port"));
        serve_args.push(OsString::from(port.to_string()));
    }
    if args.public {
        serve_args.push(OsString::from("--public"));
    }

    let mut launcher = DetachedLauncher::new(exe, serve_args);
    if let StartOutcome::Detached { record } =
        supervisor.start(args.server, &mut launcher)?
    {
        println!(
            "Started {} server in detached mode (PID {}) on http://{}:{}",
            record.server, record.pid, record.host, record.port
        );
        println!(
            "Logs: {}",
            supervisor.store().stderr_path(args.server).display()
        );
    }
    Ok(())
}

fn stop(args: StopArgs) -> Result<()> {
    let supervisor = Supervisor::with_default_store();
    let record = supervisor.stop(args.server)?;
    println!(
        "Sent shutdown signal to {} server (PID {}).",
        record.server, record.pid
    );
    Ok(())
}

fn init(args: InitArgs) -> Result<()> {
    let dir = bootstrap::config_dir();
    let report = bootstrap::initialize(&dir, args.force)?;

    println!("Config directory ready at {}", report.dir.display());
    match report.env_file {
        Some(path) => println!("Example settings written to {}", path.display()),
        None => println!("Existing settings left untouched"),
    }
    if let Some(path) = report.searxng_settings {
        println!("Default searxng settings written to {}", path.display());
    }
    Ok(())
}

fn unix_ms_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
