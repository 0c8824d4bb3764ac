//! Command-line entry point for the fan controller bridge.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use fancontrol_bridge::{launch, BridgeConfig, BridgeError, SerialTransport};
use fancontrol_bus::StopSignal;

/// Bridge an event bus to a fan/temperature controller on a serial port.
#[derive(Parser, Debug)]
#[command(name = "fancontrolbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, overriding the configuration.
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overriding the configuration.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Serve Prometheus metrics on this address.
    #[cfg(feature = "prometheus")]
    #[arg(long)]
    metrics_addr: Option<std::net::SocketAddr>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(verbose)
        .with_thread_names(verbose)
        .init();
}

#[cfg(feature = "prometheus")]
fn start_metrics(addr: Option<std::net::SocketAddr>) {
    let Some(addr) = addr else { return };
    match fancontrol_metrics::install_prometheus(addr) {
        Ok(()) => info!("serving metrics on {}", addr),
        Err(e) => error!("could not start metrics exporter: {}", e),
    }
}

fn run(args: Args) -> Result<(), BridgeError> {
    let (mut config, source) = BridgeConfig::load(args.config.as_deref())?;
    match &source {
        Some(path) => info!("loaded configuration from {}", path.display()),
        None => info!("no configuration file found, using defaults"),
    }
    if let Some(port) = args.port {
        config.serial.port = port;
    }
    if let Some(baud) = args.baud {
        config.serial.baud = baud;
    }

    #[cfg(feature = "prometheus")]
    start_metrics(args.metrics_addr);

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            info!("stopping");
            stop.stop();
        })?;
    }

    let transport = SerialTransport::open(&config.serial)?;
    let bridge = launch(&config, transport, stop)?;
    info!(units = ?bridge.unit_names(), "bridge running on {}", config.serial.port);

    bridge.join()
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
