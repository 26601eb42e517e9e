mod can;
mod state;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use can::CanManager;
use g4_sensorless::params::{MAX_SETPOINT, POLE_PAIRS};
use state::{AppState, Command, ConnectionState};

/// Topside console for the sensorless BLDC driver
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// SocketCAN interface
    #[arg(short, long, default_value = "can0")]
    interface: String,

    /// Speed change per `+` / `-`
    #[arg(long, default_value_t = 50)]
    step: u16,

    /// Speed to command right after connecting
    #[arg(long)]
    initial_speed: Option<u16>,

    /// Motor pole pairs, for RPM display
    #[arg(long, default_value_t = POLE_PAIRS)]
    pole_pairs: u8,

    /// Status receive timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    status_timeout_ms: u64,

    /// Minimum time between printed status lines in milliseconds
    #[arg(long, default_value_t = 1000)]
    display_interval_ms: u64,
}

enum Event {
    Input(std::io::Result<Option<String>>),
    Frame(Result<Option<tokio_socketcan::CANFrame>>),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("g4_sensorless_controller=debug,info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let mut manager = CanManager::new();
    let mut state = AppState::new(args.step);
    if let Err(e) = manager.connect(&args.interface).await {
        state.connection_state = ConnectionState::Error(format!("{:#}", e));
        eprintln!("{}", ui::render_connection(&state.connection_state, &args.interface));
        return Err(e).context("Make sure the CAN interface is set up correctly");
    }
    state.connection_state = ConnectionState::Connected;
    println!("{}", ui::render_connection(&state.connection_state, manager.interface_name()));

    println!("{}", ui::BANNER);
    println!("{}", ui::HELP);

    if let Some(speed) = args.initial_speed {
        if let Some(speed) = state.apply(Command::Set(speed)) {
            send_speed(&manager, speed).await;
        }
    }
    println!("{}", ui::render_speed(&state));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let display_interval = Duration::from_millis(args.display_interval_ms);
    let mut last_printed: Option<Instant> = None;

    loop {
        let event = tokio::select! {
            line = lines.next_line() => Event::Input(line),
            frame = manager.receive_frame(args.status_timeout_ms) => Event::Frame(frame),
        };

        match event {
            Event::Input(line) => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("stdin closed");
                    break;
                };
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Some(speed) = state.apply(command) {
                            if speed > MAX_SETPOINT {
                                warn!(
                                    "Speed {} is above {}, the driver accepts it unclamped",
                                    speed, MAX_SETPOINT
                                );
                            }
                            send_speed(&manager, speed).await;
                            println!("{}", ui::render_speed(&state));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{}", e),
                }
            }
            Event::Frame(Ok(Some(frame))) => {
                if let Some(status) = CanManager::parse_motor_status(&frame) {
                    state.update_status(status);
                    if ui::should_display(last_printed.map(|t| t.elapsed()), display_interval) {
                        println!("{}", ui::render_status(&status, args.pole_pairs));
                        last_printed = Some(Instant::now());
                    }
                }
            }
            Event::Frame(Ok(None)) => {
                match state.status_age() {
                    Some(age) => debug!(
                        "No status received within {} ms (last one {:?} ago)",
                        args.status_timeout_ms, age
                    ),
                    None => debug!("No status received within {} ms", args.status_timeout_ms),
                }
            }
            Event::Frame(Err(e)) if CanManager::is_socket_closed(&e) => {
                warn!("{} closed, disconnecting", manager.interface_name());
                break;
            }
            Event::Frame(Err(e)) => {
                error!("Failed to receive status: {:#}", e);
                if !manager.is_connected().await {
                    break;
                }
                // back off so a persistent error does not spin
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }

    manager.disconnect().await;
    state.connection_state = ConnectionState::Disconnected;
    println!("{}", ui::render_connection(&state.connection_state, &args.interface));
    debug!(
        "Final state: {:?}, last status: {:?}",
        state.connection_state, state.motor_status
    );
    Ok(())
}

async fn send_speed(manager: &CanManager, speed: u16) {
    match manager.send_speed_command(speed).await {
        Ok(_) => info!("Sent speed command: {}", speed),
        Err(e) => error!("Failed to send speed command: {:#}", e),
    }
}
