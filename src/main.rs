use clap::Parser;
use log::{error, info, warn};
use shade_bridge::command::ShadeCommand;
use shade_bridge::config::{Config, DebugLevel, ForceUpdateInterval, load_dotenv};
use shade_bridge::coordinator::UpdateCoordinator;
use shade_bridge::gateway::simulation::SimulatedGateway;
use shade_bridge::gateway::{GatewayClient, GatewayEvent};
use shade_bridge::shade::DeviceId;
use shade_bridge::store::LoggingStore;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;

/// Bridge motorized roller shades behind a vendor WiFi/433MHz gateway to a
/// host automation platform.
#[derive(Parser, Debug)]
#[command(name = "shade-bridge", version)]
struct Cli {
    /// IP address of the vendor WiFi bridge
    #[arg(long, env = "SHADE_BRIDGE_ADDRESS")]
    bridge_address: Option<String>,

    /// API key of the bridge (from the vendor app, settings > about)
    #[arg(long, env = "SHADE_BRIDGE_API_KEY")]
    api_key: Option<String>,

    /// Force-refresh interval in hours (1, 6, 12 or 24)
    #[arg(long, env = "FORCE_UPDATE_INTERVAL_HOURS")]
    force_update_hours: Option<u64>,

    /// Debug verbosity: off, debug or trace
    #[arg(long, env = "SHADE_BRIDGE_DEBUG")]
    debug_level: Option<String>,

    /// Number of shades in the simulated gateway
    #[arg(long, default_value_t = 4)]
    simulated_shades: usize,

    /// Periodically issue commands against a shade (development aid)
    #[arg(long)]
    exercise: bool,
}

fn init_logger(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .init();
}

fn mask_key(key: &str) -> String {
    if key.is_empty() {
        "(not set)".to_string()
    } else {
        let prefix: String = key.chars().take(4).collect();
        format!("{}****", prefix)
    }
}

fn apply_cli(config: &mut Config, cli: &Cli) {
    if let Some(address) = &cli.bridge_address {
        config.bridge_address = address.clone();
    }
    if let Some(key) = &cli.api_key {
        config.api_key = key.clone();
    }
    if let Some(hours) = cli.force_update_hours {
        match ForceUpdateInterval::from_hours(hours) {
            Some(interval) => config.force_update_interval = interval,
            None => {
                eprintln!("Invalid --force-update-hours {hours}, expected 1, 6, 12 or 24");
                std::process::exit(2);
            }
        }
    }
    if let Some(level) = &cli.debug_level {
        config.debug_level = match level.to_lowercase().as_str() {
            "trace" => DebugLevel::Trace,
            "debug" => DebugLevel::Debug,
            _ => DebugLevel::Off,
        };
    }
}

#[tokio::main]
async fn main() {
    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    apply_cli(&mut config, &cli);

    init_logger(config.debug_level.log_filter());
    info!("Starting Shade Bridge");
    info!("Configuration loaded:");
    info!("  Bridge Address: {}", config.bridge_address);
    info!("  API Key: {}", mask_key(&config.api_key));
    info!(
        "  Force Update Interval: {}h",
        config.force_update_interval.hours()
    );
    info!("  Heartbeat: {:?}", config.heartbeat());

    // The vendor transport is out of scope here; the shipped daemon runs
    // against the in-memory gateway simulation.
    let gateway = Arc::new(SimulatedGateway::new(cli.simulated_shades));

    let discovered = match gateway.discover().await {
        Ok(shades) if shades.is_empty() => {
            error!("Discovery returned no shades, refusing to start");
            std::process::exit(1);
        }
        Ok(shades) => shades,
        Err(e) => {
            error!("Failed to reach bridge: {}", e);
            std::process::exit(1);
        }
    };

    let coordinator = Arc::new(UpdateCoordinator::new(
        discovered,
        Arc::new(LoggingStore),
        config.force_update_interval.as_duration(),
    ));
    let device_ids: Vec<DeviceId> = coordinator.device_ids().cloned().collect();
    info!("Tracking {} shade(s):", coordinator.len());
    for id in &device_ids {
        info!("  - {}", id);
    }

    let cancel = CancellationToken::new();
    let (event_tx, mut event_rx) = mpsc::channel::<GatewayEvent>(64);

    // Gateway multicast listener
    let listener_task = {
        let gateway = gateway.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = gateway.listen(event_tx) => {}
            }
        })
    };

    // Notification pump: gateway events into the coordinator
    let pump_task = {
        let coordinator = coordinator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = event_rx.recv() => {
                        let Some(event) = event else { break };
                        coordinator.on_notification(&event.id, event.telemetry).await;
                    }
                }
            }
        })
    };

    // Heartbeat ticker driving the staleness checks
    let heartbeat_task = {
        let coordinator = coordinator.clone();
        let cancel = cancel.clone();
        let cadence = config.heartbeat();
        tokio::spawn(async move {
            let mut ticker = interval(cadence);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => coordinator.on_tick(Instant::now()),
                }
            }
        })
    };

    // Optional command exerciser for development
    let exercise_task = cli.exercise.then(|| {
        let coordinator = coordinator.clone();
        let cancel = cancel.clone();
        let ids = device_ids.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(25));
            let mut step = 0usize;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let id = &ids[step % ids.len()];
                        let command = match step % 3 {
                            0 => ShadeCommand::Open,
                            1 => ShadeCommand::Close,
                            _ => ShadeCommand::SetLevel(50),
                        };
                        info!("[Exercise] {} -> {}", command, id);
                        if let Err(e) = coordinator.dispatch_command(id, command).await {
                            warn!("[Exercise] Command failed: {}", e);
                        }
                        step += 1;
                    }
                }
            }
        })
    });

    info!("Shade Bridge is running");
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    // Stop the daemon tasks first, then drain in-flight refreshes
    cancel.cancel();
    let _ = listener_task.await;
    let _ = pump_task.await;
    let _ = heartbeat_task.await;
    if let Some(task) = exercise_task {
        let _ = task.await;
    }

    coordinator.shutdown().await;
    info!("Shade Bridge stopped");
}
