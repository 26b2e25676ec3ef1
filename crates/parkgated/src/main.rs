//! parkgated - Parking gate edge gateway daemon
//!
//! Bridges camera webhooks, the MQTT command bus, Modbus-TCP barrier
//! controllers, LED signs and the gate display WebSockets.
//!
//! Usage:
//!   parkgated [config.toml]
//!
//! Without a config file, defaults are used. Environment variables
//! (`ADDR`, `SERVER_URL`, `PARKING_CODE`, `MQTT_HOST`, ...) override both,
//! and device keys (`ENT_GATE_01`, `HIK_LED_MAIN_ENT_01`, ...) are looked up
//! in the config's `[devices]` table first, then in the environment.

use std::sync::Arc;
use std::time::Duration;

use parkgate_api::{create_router, AppState, HttpCloudClient};
use parkgate_core::{
    AddressSource, DedupCache, DeviceDirectory, EnvSource, GatewayConfig, LayeredSource,
};
use parkgate_fetch::{DigestSnapshotClient, HedgedFetcher};
use parkgate_field::{
    Actuator, BarrierCommander, BusListener, BusListenerConfig, CommandDispatcher,
    ModbusTcpConnector,
};
use parkgate_hub::{Hub, HubConfig};
use parkgate_sign::{SignDisplay, UdpSignSink};
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HUB_DRAIN: Duration = Duration::from_secs(5);

/// Parsed command-line arguments
#[derive(Debug, Default, PartialEq)]
struct Args {
    /// Gateway config file (TOML)
    config_path: Option<String>,
    help: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Args {
    let mut result = Args::default();

    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => result.help = true,
            arg if !arg.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(arg.to_string());
            }
            _ => {
                tracing::warn!("Unknown argument: {}", arg);
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"parkgated - Parking gate edge gateway

Usage: parkgated [OPTIONS] [config.toml]

Options:
  -h, --help  Print this help message

Environment overrides:
  ADDR, SERVER_URL, PARKING_CODE, CAMERA_USER, CAMERA_PASS,
  SNAPSHOT_TIMEOUT_MS, MODBUS_PORT, MODBUS_TIMEOUT_MS, MODBUS_PULSE_MS,
  MODBUS_SLAVE_ID, MQTT_HOST, MQTT_PORT, LED_PORT, DEDUP_TTL_SECS

Examples:
  # Run with defaults and environment only
  parkgated

  # Run with config file
  parkgated gateway.toml
"#
    );
}

fn load_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    let mut config = match args.config_path {
        Some(ref path) => {
            tracing::info!("Loading config from: {}", path);
            GatewayConfig::load(path)?
        }
        None => {
            tracing::info!("No config file provided, using defaults");
            GatewayConfig::default()
        }
    };

    config.apply_overrides(&EnvSource)?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parkgated=info,parkgate_api=info,parkgate_field=debug,parkgate_hub=info,parkgate_fetch=info,parkgate_sign=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args(std::env::args().skip(1));
    if args.help {
        print_help();
        return Ok(());
    }

    tracing::info!("Starting parkgated (parking gate edge gateway)");
    let config = load_config(&args)?;

    // Device keys: config table first, then the process environment
    let devices: Arc<dyn AddressSource> = Arc::new(config.devices.clone());
    let source = LayeredSource::new()
        .with_layer(devices)
        .with_layer(Arc::new(EnvSource));
    let directory = DeviceDirectory::new(Arc::new(source));
    let coils = Arc::new(config.coils.clone());

    // Broadcast hub
    let (hub, hub_task) = Hub::spawn(HubConfig::default());

    // Field bus: one connector, two pulse lengths
    let connector = Arc::new(ModbusTcpConnector::new(
        config.modbus.port,
        config.modbus_timeout(),
        config.modbus.unit_id,
    ));
    let http_barriers = BarrierCommander::new(
        Arc::new(Actuator::new(connector.clone(), config.http_pulse())),
        directory.clone(),
        coils.clone(),
    );
    let bus_barriers = BarrierCommander::new(
        Arc::new(Actuator::new(connector, config.bus_pulse())),
        directory,
        coils,
    );

    // Cameras, signs, cloud
    let cameras = Arc::new(DigestSnapshotClient::new(&config.camera)?);
    let fetcher = HedgedFetcher::new(
        cameras,
        config.camera.min_useful_bytes,
        config.snapshot_timeout(),
    );
    let signs = SignDisplay::new(
        Arc::new(UdpSignSink::new(config.sign_timeout())),
        config.sign.port,
    );
    let cloud = Arc::new(HttpCloudClient::new(
        &config.cloud.server_url,
        config.cloud_timeout(),
    )?);
    let dedup = Arc::new(DedupCache::new(config.dedup_ttl()));

    // Command bus
    let shutdown = CancellationToken::new();
    let bus_task = match config.mqtt.host {
        Some(ref host) => {
            let client_id = config
                .mqtt
                .client_id
                .clone()
                .unwrap_or_else(|| format!("parkgate-{}", std::process::id()));
            let mut bus = BusListenerConfig::new(host.clone(), config.mqtt.port, client_id);
            bus.keep_alive = Duration::from_secs(config.mqtt.keep_alive_secs);
            if !config.cloud.parking_code.is_empty() {
                bus.parking_code = Some(config.cloud.parking_code.clone());
            }
            let dispatcher = Arc::new(CommandDispatcher::new(bus_barriers));
            Some(BusListener::new(bus, dispatcher).spawn(shutdown.clone()))
        }
        None => {
            tracing::info!("MQTT_HOST not set, command bus disabled");
            None
        }
    };

    let state = AppState::new(
        hub,
        http_barriers,
        fetcher,
        signs,
        cloud,
        dedup,
        config.cloud.parking_code.clone(),
    );
    let app = create_router(state).layer(TimeoutLayer::new(config.request_timeout()));

    let addr = config.listen_addr()?;
    tracing::info!("Listening on {}", addr);
    tracing::info!("Parking code: {}", config.cloud.parking_code);
    tracing::info!("Cloud: {}", config.cloud.server_url);

    // Run the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, shutting down");
    shutdown.cancel();
    if let Some(task) = bus_task {
        if let Err(e) = task.await {
            tracing::warn!("Command bus task ended abnormally: {}", e);
        }
    }
    // The router held the last hub handle; the hub now closes every display socket.
    if tokio::time::timeout(HUB_DRAIN, hub_task).await.is_err() {
        tracing::warn!("Hub did not stop within {:?}", HUB_DRAIN);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
