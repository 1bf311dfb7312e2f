//! Lode - GNSS Receiver Emulator
//!
//! Main entry point for the emulator.
//!
//! # Usage
//!
//! ```bash
//! # Drive in circles around a point at 36 km/h, 1 km radius
//! lode dynamic 55.7522 37.6156 36 1 1
//!
//! # Replay a route, two seconds per point, waiting for Enter before starting
//! lode --wait geojson route.geojson --duration 2
//!
//! # Make the current options the defaults for later runs
//! lode --port 10110 --save-config dynamic 48.1173 11.5167
//! ```
//!
//! Pressing Enter releases the start gate and advances manual fixes.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use lode::config::{self, AppConfig};
use lode::fix::TransitionMode;
use lode::pacing::AdvanceSignal;
use lode::server::{BroadcastServer, LogObserver};
use lode::source::circular::{DEFAULT_DURATION_SECS, DEFAULT_RADIUS_KM, DEFAULT_SPEED_KMH};
use lode::source::{self, CircularParams, RouteParams, SourceConfig, SourceKind};
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Lode - stream emulated GNSS fixes as NMEA 0183 over TCP
#[derive(Parser)]
#[command(name = "lode")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: the per-user config.toml, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TCP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long)]
    bind: Option<String>,

    /// Wait for Enter before emitting the first fix
    #[arg(short, long)]
    wait: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    save_config: bool,

    /// Source to stream; the configured source is used if omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate driving around a circle that starts at the given point
    Dynamic {
        /// Start latitude in degrees
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        /// Start longitude in degrees
        #[arg(allow_negative_numbers = true)]
        longitude: f64,

        /// Speed in km/h
        #[arg(default_value_t = DEFAULT_SPEED_KMH)]
        speed: f64,

        /// Seconds between fixes
        #[arg(default_value_t = DEFAULT_DURATION_SECS)]
        duration: f64,

        /// Circle radius in km
        #[arg(default_value_t = DEFAULT_RADIUS_KM)]
        radius: f64,

        /// auto, or manual (alias key) to advance on Enter
        #[arg(default_value_t = TransitionMode::Auto)]
        transition: TransitionMode,
    },

    /// Replay the points of a GeoJSON FeatureCollection
    Geojson(RouteArgs),

    /// Replay the rows of a CSV route
    Csv(RouteArgs),

    /// Replay a recorded RMC/GGA log
    Nmea(RouteArgs),
}

#[derive(Args)]
struct RouteArgs {
    /// Route file
    path: PathBuf,

    /// Seconds to hold every point, replacing the file's values
    #[arg(short, long)]
    duration: Option<f64>,

    /// Sequence index of the first point
    #[arg(short, long, allow_negative_numbers = true)]
    index: Option<i64>,
}

impl RouteArgs {
    fn into_source(self, kind: SourceKind) -> anyhow::Result<SourceConfig> {
        let params = RouteParams {
            path: self.path,
            duration: self.duration,
            index: self.index,
        };
        Ok(SourceConfig::route(kind, params)?)
    }
}

impl Commands {
    fn into_source(self) -> anyhow::Result<SourceConfig> {
        match self {
            Commands::Dynamic {
                latitude,
                longitude,
                speed,
                duration,
                radius,
                transition,
            } => Ok(SourceConfig::Dynamic(CircularParams {
                latitude,
                longitude,
                speed_kmh: speed,
                duration_secs: duration,
                radius_km: radius,
                transition,
            })),
            Commands::Geojson(route) => route.into_source(SourceKind::GeoJson),
            Commands::Csv(route) => route.into_source(SourceKind::Csv),
            Commands::Nmea(route) => route.into_source(SourceKind::Nmea),
        }
    }
}

/// Config file first, then command-line overrides.
fn build_config(cli: Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        // Saving may create the file
        Some(path) if cli.save_config && !path.exists() => AppConfig::default(),
        Some(path) => config::load_config_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => config::load_config().context("Failed to load config")?,
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if cli.wait {
        config.server.wait_for_keypress = true;
    }
    if let Some(command) = cli.command {
        config.source = command.into_source()?;
    }

    Ok(config)
}

/// Trigger `signal` on every line read from stdin.
///
/// Runs on a plain thread: a blocking stdin read cannot be cancelled and
/// would otherwise hold up runtime shutdown.
fn spawn_keypress_reader(signal: AdvanceSignal) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() {
                break;
            }
            signal.trigger();
        }
        tracing::debug!("stdin closed, keypress advance unavailable");
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lode v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let save_to = cli
        .save_config
        .then(|| cli.config.clone().unwrap_or_else(config::get_config_path));

    let config = build_config(cli)?;
    config.validate().context("Invalid configuration")?;

    if let Some(path) = save_to {
        config::save_config_to(&config, &path)
            .with_context(|| format!("Failed to save config {}", path.display()))?;
        tracing::info!("Configuration saved to {}", path.display());
        return Ok(());
    }

    let source = source::build_source(&config.source)
        .with_context(|| format!("Failed to create {} source", config.source.kind()))?;

    let advance = AdvanceSignal::new();
    let mut server = BroadcastServer::bind(config.server.server_config())
        .await?
        .with_advance_signal(advance.clone());
    server.add_observer(LogObserver);

    spawn_keypress_reader(advance);
    if config.server.wait_for_keypress {
        tracing::info!("Press Enter to start streaming");
    }

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.shutdown(),
            Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    let summary = server.run(source).await?;
    tracing::info!("Finished: {:?}", summary.reason);

    Ok(())
}
