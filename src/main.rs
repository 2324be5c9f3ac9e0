//! Sensor node entry point
//!
//! Wires configuration into the connectivity manager, sensor source, clock
//! and publish cycle, then runs until SIGINT or SIGTERM.

use clap::{Parser, Subcommand};
use sensor_node::clock::{FixedClock, SystemClock, TimeSource};
use sensor_node::config::{ClockKind, NodeConfig, SensorKind};
use sensor_node::connectivity::ConnectivityManager;
use sensor_node::cycle::PublishCycle;
use sensor_node::encoding::PayloadEncoder;
use sensor_node::error::{NodeError, NodeResult};
use sensor_node::observability::init_default_logging;
use sensor_node::sensor::{SensorSource, SyntheticSource, SysfsSource};
use sensor_node::shutdown::{ShutdownSignal, ShutdownTrigger};
use sensor_node::transport::mqtt::{MqttSession, SessionSettings};
use sensor_node::transport::network::HostLink;
use sensor_node::transport::Credentials;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{error, info};

/// Connectivity and telemetry loop for an MQTT sensor node
#[derive(Parser)]
#[command(name = "sensor-node")]
#[command(about = "Publishes sensor records to an MQTT broker on a fixed cadence")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "SENSOR_NODE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the publish loop
    Run,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting sensor node v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_node(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Sensor node shutdown complete");
}

fn load_configuration(config_path: Option<&PathBuf>) -> NodeResult<NodeConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(NodeConfig::load_from_file(path)?);
    }

    for path_str in NodeConfig::DEFAULT_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(NodeConfig::load_from_file(&path)?);
        }
    }

    Err(NodeError::startup(
        "No configuration file found. Provide one with -c/--config or create sensor-node.toml",
    ))
}

fn build_sensor_source(config: &NodeConfig) -> Box<dyn SensorSource> {
    match config.sensors.source {
        SensorKind::Synthetic => Box::new(SyntheticSource::new()),
        SensorKind::Sysfs => Box::new(SysfsSource::from_config(&config.sensors.channels)),
    }
}

fn build_clock(config: &NodeConfig) -> Box<dyn TimeSource> {
    match config.clock.source {
        ClockKind::System => Box::new(SystemClock),
        ClockKind::Fixed => Box::new(FixedClock(config.clock.fixed_timestamp)),
    }
}

/// Bootstrap: build the cycle with its injected collaborators
fn build_cycle(
    config: &NodeConfig,
    shutdown: ShutdownSignal,
) -> NodeResult<PublishCycle<HostLink, MqttSession>> {
    let (host, port) = config.broker_endpoint()?;
    let link = HostLink::new(host.clone(), port);
    let session = MqttSession::new(SessionSettings::from_config(host, port, &config.mqtt));
    let credentials = Credentials {
        ssid: config.network.ssid.clone(),
        password: config.require_network_password()?,
    };

    let manager = ConnectivityManager::new(link, session, credentials)
        .with_client_id_prefix(config.device.client_id_prefix.clone())
        .with_poll_interval(config.poll_interval())
        .with_retry_policy(config.retry_policy())
        .with_shutdown(shutdown);

    Ok(PublishCycle::new(
        manager,
        build_sensor_source(config),
        build_clock(config),
        config.device.id.clone(),
        config.mqtt.topic.clone(),
    )
    .with_encoder(PayloadEncoder::new(config.publish.max_payload_bytes))
    .with_interval(config.publish_interval()))
}

async fn run_node(config: NodeConfig) -> NodeResult<()> {
    info!(
        device_id = %config.device.id,
        broker = %config.mqtt.broker_url,
        "Sensor node starting"
    );

    let (trigger, shutdown) = ShutdownSignal::channel();
    let mut cycle = build_cycle(&config, shutdown.clone())?;

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::spawn(forward_signals(trigger, async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
    }));

    cycle.run(shutdown).await;
    Ok(())
}

async fn forward_signals(trigger: ShutdownTrigger, received: impl std::future::Future<Output = ()>) {
    received.await;
    let _ = trigger.send(true);
}

fn handle_config_command(config: &NodeConfig, show: bool) -> NodeResult<()> {
    if show {
        let rendered = toml::to_string_pretty(config)
            .map_err(|e| NodeError::startup(format!("Failed to render configuration: {e}")))?;
        println!("{rendered}");
    }

    info!("Configuration validation complete");
    Ok(())
}
