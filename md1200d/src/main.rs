//! MD1200 fan controller daemon
//!
//! Opens the enclosure's serial console, sends the configured commands on a
//! schedule, logs every line the controller prints, and shuts down cleanly
//! on SIGINT or SIGTERM.

use anyhow::Result;
use clap::Parser;
use md1200_hardware::available_ports;
use md1200d::config::{self, Overrides};
use md1200d::{logging, Daemon, TerminationListener};
use std::path::PathBuf;
use tracing::{error, info};

/// MD1200 fan controller daemon
#[derive(Parser, Debug)]
#[command(name = "md1200d")]
#[command(version, about = "Dell PowerEdge MD1200 fan controller daemon", long_about = None)]
struct Args {
    /// Path to configuration file
    ///
    /// Defaults to $MD1200_CONFIG, then ~/.config/md1200/config.toml if present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Serial device path (e.g., /dev/ttyS0, /dev/ttyUSB0)
    #[arg(long)]
    device: Option<String>,

    /// Baud rate of the serial console
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Firing schedule (e.g., "@every 30s", "*/5 * * * *")
    #[arg(long)]
    schedule: Option<String>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_ports {
        for port in available_ports()? {
            println!("{}", port);
        }
        return Ok(());
    }

    let overrides = Overrides {
        device: args.device.clone(),
        baud_rate: args.baud_rate,
        schedule: args.schedule.clone(),
    };

    let config = match config::resolve(args.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet; use the default level
            let _ = logging::init_tracing(&Default::default(), args.verbose);
            error!("Configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    logging::init_tracing(&config.logging, args.verbose)?;
    info!("MD1200 fan controller starting...");
    logging::report_telemetry(&config.telemetry);

    let mut listener = TerminationListener::install()?;

    let daemon = match Daemon::from_config(&config) {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let summary = daemon.run_until(listener.recv()).await?;

    if !summary.line_closed {
        error!("Serial port was not released cleanly");
    }
    info!(
        signal = %summary.signal,
        firings = summary.firings,
        frames = summary.frames,
        "Shutdown complete"
    );

    Ok(())
}
