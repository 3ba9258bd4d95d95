//! Launchpad GW - grid controller driver
//!
//! Connects the configured Launchpads, unlocks them through the challenge
//! handshake and combines them into one session grid.

use anyhow::{Context, Result};
use clap::Parser;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use launchpad_gw::config::{AppConfig, DeviceConfig, HandshakeConfig};
use launchpad_gw::device::{self, DeviceConnection, InboundMidi};
use launchpad_gw::launchpad::address::{AddressMapper, DeviceVariant, GridButton, GRID_SIZE};
use launchpad_gw::launchpad::handshake::{ChallengeResponder, FixedRandom, RandomSource, ThreadRandom};
use launchpad_gw::launchpad::responder::ResponseTable;
use launchpad_gw::launchpad::selector::SessionSelector;
use launchpad_gw::{InstanceId, Launchpad, LaunchpadSettings, SurfaceEvent, SurfaceHost};

/// Launchpad GW - drive Novation Launchpad grids
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print the note/CC layout of every Launchpad model
    #[arg(long)]
    print_layout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        device::list_ports_formatted()?;
        return Ok(());
    }

    if args.print_layout {
        print_layout();
        return Ok(());
    }

    info!("Starting Launchpad GW...");
    info!("Configuration file: {}", args.config);

    let config = AppConfig::load(&args.config).await?;
    info!("Configuration loaded ({} devices)", config.devices.len());

    run_app(config, shutdown_signal()).await?;

    info!("Launchpad GW shutdown complete");
    Ok(())
}

async fn run_app(config: AppConfig, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
    let responder = load_responder(&config.handshake)?;
    let (event_tx, mut event_rx) = mpsc::channel::<InboundMidi>(1000);

    let mut host = SurfaceHost::new(config.combine);
    let mut connections: Vec<DeviceConnection> = Vec::new();

    for device in &config.devices {
        let id = host.next_instance_id();
        let (connection, transport) = match device::open(id, device, event_tx.clone()) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Skipping device '{}': {:#}", device.name, e);
                continue;
            }
        };

        info!(
            "'{}' on {} / {}",
            device.name,
            connection.input_port,
            transport.port_name()
        );

        let surface = build_surface(id, device, &config.handshake, Box::new(transport), Rc::clone(&responder));
        if let Some(combination) = host.connect(surface)? {
            debug!("Combination now {:?}", combination.offsets);
        }
        connections.push(connection);
    }

    if connections.is_empty() {
        anyhow::bail!("No Launchpad could be connected");
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(config.handshake.tick_ms));
    tokio::pin!(shutdown);

    info!("Main loop running, {} surfaces", connections.len());

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match host.handle_midi(event.instance, &event.data) {
                    Ok(Some(surface_event)) => log_event(event.instance, &surface_event),
                    Ok(None) => {}
                    Err(e) => debug!("Inbound MIDI dropped: {}", e),
                }
            }
            _ = ticker.tick() => {
                host.tick(1);
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }

    host.disconnect_all();
    drop(connections);
    Ok(())
}

/// The platform responder: a captured table, or an empty one that never answers
fn load_responder(handshake: &HandshakeConfig) -> Result<Rc<dyn ChallengeResponder>> {
    let table = match &handshake.response_table {
        Some(path) => ResponseTable::load(path)
            .with_context(|| format!("Failed to load response table: {}", path))?,
        None => {
            warn!("No response table configured, surfaces will stay locked");
            ResponseTable::default()
        }
    };
    Ok(Rc::new(table))
}

fn build_surface(
    id: InstanceId,
    device: &DeviceConfig,
    handshake: &HandshakeConfig,
    transport: Box<device::MidirTransport>,
    responder: Rc<dyn ChallengeResponder>,
) -> Launchpad {
    let mut settings = LaunchpadSettings::new(device.name.clone(), device.variant);
    settings.probe_delay_ticks = handshake.probe_delay_ticks;

    let random: Box<dyn RandomSource> = match handshake.fixed_challenge() {
        Some(challenge) => {
            info!("Using pinned challenge {} for '{}'", challenge, device.name);
            Box::new(FixedRandom(challenge.value()))
        }
        None => Box::new(ThreadRandom),
    };

    Launchpad::new(
        id,
        settings,
        transport,
        Box::new(SessionSelector::new(device.session_width, device.device_component)),
        responder,
        random,
    )
}

fn log_event(instance: InstanceId, event: &SurfaceEvent) {
    match event {
        SurfaceEvent::Button { role, value } => debug!("{} {:?} = {}", instance, role, value),
        SurfaceEvent::ProbeResolved { shadowed: true } => {
            warn!("{} is driven by another script, staying silent", instance)
        }
        SurfaceEvent::ProbeResolved { shadowed: false } => info!("{} probe ok", instance),
        SurfaceEvent::Enabled => info!("{} unlocked", instance),
    }
}

/// Print the wire address of every control, per model
fn print_layout() {
    use colored::*;

    for variant in [DeviceVariant::Classic, DeviceVariant::Mk2Rgb] {
        let mapper = AddressMapper::new(variant);
        println!("\n{}", format!("=== {} ===", variant).bold().cyan());

        let top: Vec<String> = mapper.top_buttons().iter().map(|cc| format!("{:>3}", cc)).collect();
        println!("{}  {}", "Top (CC)".bold(), top.join(" "));

        println!("{}", "Grid (note) | Side (note)".bold());
        for row in 0..GRID_SIZE {
            let notes: Vec<String> = (0..GRID_SIZE)
                .map(|column| format!("{:>3}", mapper.note_for(GridButton::new(row, column))))
                .collect();
            println!(
                "  {} | {:>3}",
                notes.join(" "),
                mapper.side_buttons()[row as usize]
            );
        }

        let drums: Vec<String> = mapper.drum_notes().iter().map(|n| n.to_string()).collect();
        println!("{} {}", "Drum pads:".bold(), drums.join(" ").dimmed());
        println!(
            "{} {}",
            "Suggested ports:".bold(),
            variant.suggested_ports().join(", ")
        );
    }
    println!();
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
