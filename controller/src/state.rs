use std::fmt;
use std::time::{Duration, Instant};

use g4_sensorless::can_protocol::MotorStatus;
use g4_sensorless::params::MAX_SETPOINT;

/// Connection state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    Error(String),
}

/// Operator command, one per input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `+`
    Increase,
    /// `-`
    Decrease,
    /// `s`
    Stop,
    /// `q`
    Quit,
    /// bare integer
    Set(u16),
}

/// Why an input line was not understood
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(pub String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command '{}' (use +, -, s, q or a number)", self.0)
    }
}

impl std::error::Error for ParseCommandError {}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>, ParseCommandError> {
        let line = line.trim();
        let command = match line {
            "" => return Ok(None),
            "+" => Command::Increase,
            "-" => Command::Decrease,
            "s" | "S" => Command::Stop,
            "q" | "Q" => Command::Quit,
            other => match other.parse::<u16>() {
                Ok(speed) => Command::Set(speed),
                Err(_) => return Err(ParseCommandError(other.to_string())),
            },
        };
        Ok(Some(command))
    }
}

/// Application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection state
    pub connection_state: ConnectionState,
    /// Requested speed (0-1000)
    pub speed: u16,
    /// Increment for `+` / `-`
    pub speed_step: u16,
    /// Last received motor status
    pub motor_status: Option<MotorStatus>,
    /// When the last status arrived
    pub last_status_update: Option<Instant>,
}

impl AppState {
    pub fn new(speed_step: u16) -> Self {
        Self {
            connection_state: ConnectionState::Disconnected,
            speed: 0,
            speed_step,
            motor_status: None,
            last_status_update: None,
        }
    }

    /// Apply a command to the requested speed
    ///
    /// # Returns
    /// * `Some(speed)` if a speed command must be sent
    /// * `None` for `Quit`
    pub fn apply(&mut self, command: Command) -> Option<u16> {
        self.speed = match command {
            Command::Increase => self.speed.saturating_add(self.speed_step).min(MAX_SETPOINT),
            Command::Decrease => self.speed.saturating_sub(self.speed_step),
            Command::Stop => 0,
            Command::Set(speed) => speed,
            Command::Quit => return None,
        };
        Some(self.speed)
    }

    pub fn update_status(&mut self, status: MotorStatus) {
        self.motor_status = Some(status);
        self.last_status_update = Some(Instant::now());
    }

    /// Time since the last status frame, if any arrived
    pub fn status_age(&self) -> Option<Duration> {
        self.last_status_update.map(|t| t.elapsed())
    }
}
