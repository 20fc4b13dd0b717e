//! Command line entry point for the emulator controller
//!
//! `dsemu start` keeps one emulator running so that later test sessions can
//! attach to it; the other commands operate on the advertised instance.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;

use dsemu::{
    env, ControlClient, ControlEndpoint, Emulator, EmulatorConfig, EmulatorConfigBuilder,
    EmulatorError, EmulatorResult,
};
use shared::{component_debug, component_error, env_vars, logging, ComponentId, ConnectionInfo, EnvInit};

/// Datastore emulator lifecycle controller
#[derive(Parser)]
#[command(name = "dsemu")]
#[command(about = "Starts, resets and inspects a local Datastore emulator")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start (or attach to) an emulator and keep it until Ctrl+C
    Start(StartArgs),
    /// Clear all data in the advertised emulator
    Reset,
    /// Probe the advertised emulator; exits non-zero when unreachable
    Status,
    /// Print the environment lines for the advertised emulator
    Env,
}

#[derive(clap::Args)]
pub struct StartArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub project: Option<String>,

    /// Persist data here instead of keeping it in memory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Emulator launcher (defaults to `gcloud` on PATH)
    #[arg(long)]
    pub binary: Option<PathBuf>,

    /// Passed through to the emulator unchanged
    #[arg(last = true)]
    pub extra: Vec<String>,
}

impl StartArgs {
    fn into_config(self, base: EmulatorConfig) -> EmulatorConfig {
        let mut builder = EmulatorConfigBuilder::from_config(base).extra_args(self.extra);

        if let Some(host) = self.host {
            builder = builder.host(host);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(project) = self.project {
            builder = builder.project(project);
        }
        if let Some(dir) = self.data_dir {
            builder = builder.data_dir(dir);
        }
        if let Some(secs) = self.timeout_secs {
            builder = builder.startup_timeout(Duration::from_secs(secs));
        }
        if let Some(binary) = self.binary {
            builder = builder.binary(binary);
        }

        builder.build()
    }
}

#[tokio::main]
async fn main() -> EmulatorResult<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    logging::init_tracing(ComponentId::Controller, Some(&args.log_level));

    match args.command {
        Command::Start(start) => run_start(start).await,
        Command::Reset => {
            let connection = advertised()?;
            ControlClient::new(&connection)?.reset().await?;
            logging::log_success(ComponentId::Controller, &format!("Emulator at {} reset", connection.base_url()));
            Ok(())
        }
        Command::Status => {
            let connection = advertised()?;
            if ControlClient::new(&connection)?.health().await {
                println!("{} is running ({})", connection.base_url(), connection.project);
                Ok(())
            } else {
                component_error!(ComponentId::Controller, "❌ No emulator answering at {}", connection.base_url());
                std::process::exit(1);
            }
        }
        Command::Env => {
            print!("{}", EnvInit::render(&advertised()?));
            Ok(())
        }
    }
}

async fn run_start(start: StartArgs) -> EmulatorResult<()> {
    let config = start.into_config(EmulatorConfig::from_env()?);
    logging::log_startup(ComponentId::Controller, &format!("emulator on {}:{}", config.host, config.port));

    let mut emulator = Emulator::new(config);
    let connection = emulator.acquire().await?;
    print!("{}", EnvInit::render(&connection));

    match signal::ctrl_c().await {
        Ok(()) => logging::log_shutdown(ComponentId::Controller, "Received Ctrl+C signal"),
        Err(err) => logging::log_error(ComponentId::Controller, "Signal handling", &err),
    }

    emulator.release().await;
    component_debug!(ComponentId::Controller, "Controller exiting");
    Ok(())
}

/// Connection advertised in the environment
fn advertised() -> EmulatorResult<ConnectionInfo> {
    env::discover().ok_or_else(|| {
        EmulatorError::config(
            env_vars::DATASTORE_HOST,
            std::env::var(env_vars::DATASTORE_HOST).unwrap_or_default(),
        )
    })
}
