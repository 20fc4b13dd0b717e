//! Stub emulator entry point
//!
//! Accepts the same arguments the controller passes to
//! `gcloud beta emulators datastore`, e.g.
//! `stub-emulator beta emulators datastore start --host-port=localhost:8714 --project=test`.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

use shared::{component_debug, component_info, logging, ComponentId, ConnectionInfo, EnvInit};
use tester::{bind_host, StubError, StubResult, StubServer};

const COMMAND_PREFIX: [&str; 3] = ["beta", "emulators", "datastore"];

#[derive(Parser, Debug)]
#[command(name = "stub-emulator")]
#[command(about = "Stub Datastore emulator for controller tests")]
struct Args {
    /// Command path: `beta emulators datastore start|env-init`
    #[arg(required = true)]
    command: Vec<String>,

    #[arg(long, default_value = "localhost:8081")]
    host_port: String,

    #[arg(long, default_value = "test")]
    project: String,

    #[arg(long, default_value_t = 1.0)]
    consistency: f64,

    #[arg(long)]
    no_store_on_disk: bool,

    /// Accepted for compatibility; nothing is persisted
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Wait this long before binding the port
    #[arg(long, default_value_t = 0)]
    startup_delay_ms: u64,

    /// Stay alive without ever binding the port
    #[arg(long)]
    never_ready: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> StubResult<()> {
    let args = Args::parse();
    logging::init_tracing(ComponentId::StubEmulator, Some(&args.log_level));

    let connection = ConnectionInfo::from_host_port(&args.host_port, args.project.clone())?;

    match subcommand(&args.command)? {
        Mode::EnvInit => {
            print!("{}", EnvInit::render(&connection));
            Ok(())
        }
        Mode::Start => run_start(args, connection).await,
    }
}

#[derive(Debug, PartialEq)]
enum Mode {
    Start,
    EnvInit,
}

fn subcommand(words: &[String]) -> StubResult<Mode> {
    let unsupported = || StubError::UnsupportedCommand(words.join(" "));
    let (last, prefix) = words.split_last().ok_or_else(unsupported)?;

    if *prefix != COMMAND_PREFIX {
        return Err(unsupported());
    }
    match last.as_str() {
        "start" => Ok(Mode::Start),
        "env-init" => Ok(Mode::EnvInit),
        _ => Err(unsupported()),
    }
}

async fn run_start(args: Args, connection: ConnectionInfo) -> StubResult<()> {
    if !(0.0..=1.0).contains(&args.consistency) {
        return Err(StubError::InvalidConsistency(args.consistency));
    }

    println!("Executing: stub-emulator --host={} --port={}", connection.host, connection.port);
    logging::log_startup(ComponentId::StubEmulator, &format!("stub emulator for project {}", connection.project));
    component_debug!(
        ComponentId::StubEmulator,
        "consistency={} in_memory={} data_dir={:?}",
        args.consistency,
        args.no_store_on_disk || args.data_dir.is_none(),
        args.data_dir
    );

    if args.never_ready {
        component_info!(ComponentId::StubEmulator, "⏸️ Never becoming ready (--never-ready)");
        shutdown_signal().await;
        return Ok(());
    }

    if args.startup_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(args.startup_delay_ms)).await;
    }

    let addr = format!("{}:{}", bind_host(&connection.host), connection.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StubError::Bind { addr: addr.clone(), source })?;

    println!("[datastore] API endpoint: {}", connection.base_url());
    println!("[datastore] Dev App Server is now running.");

    StubServer::new(connection.project.clone())
        .serve(listener, shutdown_signal())
        .await?;

    logging::log_success(ComponentId::StubEmulator, "Stub emulator stopped gracefully");
    Ok(())
}

/// Resolves on SIGTERM or Ctrl+C
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            logging::log_error(ComponentId::StubEmulator, "Signal handling", &err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                logging::log_error(ComponentId::StubEmulator, "SIGTERM handler", &err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => logging::log_shutdown(ComponentId::StubEmulator, "Received Ctrl+C signal"),
        _ = terminate => logging::log_shutdown(ComponentId::StubEmulator, "Received SIGTERM"),
    }
}
