//! Console rendering for the topside tool

use std::time::Duration;

use g4_sensorless::can_protocol::MotorStatus;

use crate::state::{AppState, ConnectionState};

pub const BANNER: &str = "G4 sensorless topside";

pub const HELP: &str = "Commands (press Enter after each):
  +      : Increase speed
  -      : Decrease speed
  s      : Stop motor
  q      : Quit
  <0-1000>: Set speed directly";

/// One-line rendering of a status frame
pub fn render_status(status: &MotorStatus, pole_pairs: u8) -> String {
    format!(
        "Status: speed={:4}  step={}  period={}us  ({:.0} eRPM, {:.0} RPM)",
        status.setpoint,
        status.step,
        status.period_us,
        status.electrical_rpm(),
        status.mechanical_rpm(pole_pairs)
    )
}

/// Connection line shown at startup
pub fn render_connection(state: &ConnectionState, interface: &str) -> String {
    match state {
        ConnectionState::Disconnected => "Disconnected".to_string(),
        ConnectionState::Connected => format!("Connected to {}", interface),
        ConnectionState::Error(e) => format!("Error on {}: {}", interface, e),
    }
}

/// Current requested speed, as shown after each change
pub fn render_speed(state: &AppState) -> String {
    format!("Current Speed: {}", state.speed)
}

/// Whether a status line should be printed now
///
/// Status frames arrive every 100 ms; printing is throttled to `interval`.
pub fn should_display(last_printed: Option<Duration>, interval: Duration) -> bool {
    match last_printed {
        None => true,
        Some(elapsed) => elapsed >= interval,
    }
}
