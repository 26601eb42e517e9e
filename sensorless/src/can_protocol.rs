// CAN communication protocol definitions for the sensorless controller

use embedded_can::{nb::Can, Error as _, ErrorKind, Frame, Id, StandardId};

use crate::context::Setpoint;

/// CAN message IDs (11-bit standard)
pub mod can_ids {
    /// Speed command (u16 big-endian, 0-1000, 2 bytes)
    pub const SPEED_CMD: u16 = 0x123;

    /// Status feedback (setpoint: u16 BE, step: u8, period_us: u32 BE, 7 bytes)
    pub const STATUS: u16 = 0x456;
}

/// Length of the status frame payload
pub const STATUS_LEN: usize = 7;

/// Motor status structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorStatus {
    pub setpoint: u16,
    pub step: u8,
    pub period_us: u32,
}

impl MotorStatus {
    pub const fn new() -> Self {
        Self {
            setpoint: 0,
            step: 0,
            period_us: 0,
        }
    }

    /// Electrical revolutions per minute implied by the commutation period
    pub fn electrical_rpm(&self) -> f32 {
        if self.period_us == 0 {
            return 0.0;
        }
        60_000_000.0 / self.period_us as f32
    }

    /// Mechanical revolutions per minute for a motor with `pole_pairs` pole pairs
    pub fn mechanical_rpm(&self, pole_pairs: u8) -> f32 {
        if pole_pairs == 0 {
            return 0.0;
        }
        self.electrical_rpm() / pole_pairs as f32
    }
}

/// Parse speed command from CAN data
///
/// # Arguments
/// * `data` - CAN frame data (at least 2 bytes, extra bytes are ignored)
///
/// # Returns
/// * `Some(setpoint)` if parsing successful (no range clamping)
/// * `None` if data length is too short
pub fn parse_speed_command(data: &[u8]) -> Option<Setpoint> {
    if data.len() < 2 {
        warn!("Speed command: invalid data length {}", data.len());
        return None;
    }

    let raw = u16::from_be_bytes([data[0], data[1]]);
    let setpoint = Setpoint::new(raw);
    if setpoint.is_out_of_range() {
        warn!("Speed command {} is above the nominal maximum, accepted as-is", raw);
    }
    Some(setpoint)
}

/// Encode speed command into CAN data
pub fn encode_speed_command(speed: u16) -> [u8; 2] {
    speed.to_be_bytes()
}

/// Encode motor status into CAN data
///
/// # Returns
/// 7-byte array: setpoint (bytes 0-1), step (byte 2), period (bytes 3-6), all big-endian
pub fn encode_status(status: &MotorStatus) -> [u8; STATUS_LEN] {
    let mut data = [0u8; STATUS_LEN];
    data[0..2].copy_from_slice(&status.setpoint.to_be_bytes());
    data[2] = status.step;
    data[3..7].copy_from_slice(&status.period_us.to_be_bytes());
    data
}

/// Decode motor status from CAN data
///
/// # Returns
/// * `Some(MotorStatus)` if parsing successful
/// * `None` if data length is incorrect
pub fn decode_status(data: &[u8]) -> Option<MotorStatus> {
    if data.len() < STATUS_LEN {
        warn!("Status: invalid data length {}", data.len());
        return None;
    }

    Some(MotorStatus {
        setpoint: u16::from_be_bytes([data[0], data[1]]),
        step: data[2],
        period_us: u32::from_be_bytes([data[3], data[4], data[5], data[6]]),
    })
}

/// Standard identifier of the status frame
pub fn status_id() -> StandardId {
    StandardId::new(can_ids::STATUS).unwrap_or(StandardId::ZERO)
}

/// Decode a received frame into a setpoint
///
/// Only standard-id data frames carrying the speed command id are accepted.
pub fn decode_command<F: Frame>(frame: &F) -> Option<Setpoint> {
    match frame.id() {
        Id::Standard(id) if id.as_raw() == can_ids::SPEED_CMD => {}
        _ => return None,
    }
    if frame.is_remote_frame() {
        debug!("Speed command: remote frame ignored");
        return None;
    }
    parse_speed_command(frame.data())
}

/// Short name of a bus error for logging
pub fn error_kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Overrun => "overrun",
        ErrorKind::Bit => "bit",
        ErrorKind::Stuff => "stuff",
        ErrorKind::Crc => "crc",
        ErrorKind::Form => "form",
        ErrorKind::Acknowledge => "ack",
        _ => "other",
    }
}

/// Non-blocking command reception
///
/// Checks for at most one frame per call. Absent frames and bus errors both
/// leave the setpoint unchanged.
#[derive(Debug, Default)]
pub struct CommandInterface {
    received: u32,
    ignored: u32,
}

impl CommandInterface {
    pub const fn new() -> Self {
        Self {
            received: 0,
            ignored: 0,
        }
    }

    /// Poll the bus once
    ///
    /// # Returns
    /// * `Some(setpoint)` if a valid speed command arrived
    /// * `None` otherwise
    pub fn poll<B: Can>(&mut self, bus: &mut B) -> Option<Setpoint> {
        let frame = match bus.receive() {
            Ok(frame) => frame,
            Err(nb::Error::WouldBlock) => return None,
            Err(nb::Error::Other(e)) => {
                debug!("CAN receive error: {}", error_kind_name(e.kind()));
                return None;
            }
        };

        match decode_command(&frame) {
            Some(setpoint) => {
                self.received = self.received.wrapping_add(1);
                Some(setpoint)
            }
            None => {
                self.ignored = self.ignored.wrapping_add(1);
                trace!("Ignored CAN frame, dlc={}", frame.dlc());
                None
            }
        }
    }

    /// Number of accepted speed commands
    pub fn received(&self) -> u32 {
        self.received
    }

    /// Number of frames that were read but not accepted
    pub fn ignored(&self) -> u32 {
        self.ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, MockFrame};
    use embedded_can::ExtendedId;

    fn std_frame(id: u16, data: &[u8]) -> MockFrame {
        MockFrame::new(StandardId::new(id).unwrap(), data).unwrap()
    }

    #[test]
    fn test_parse_speed_command() {
        assert_eq!(parse_speed_command(&[0x01, 0xF4]), Some(Setpoint::new(500)));
        assert_eq!(parse_speed_command(&[0x03, 0xE8, 0xFF]), Some(Setpoint::new(1000)));
        assert_eq!(parse_speed_command(&[0x01]), None);
        assert_eq!(parse_speed_command(&[]), None);
    }

    #[test]
    fn test_parse_speed_command_no_clamp() {
        assert_eq!(parse_speed_command(&[0xFF, 0xFF]), Some(Setpoint::new(u16::MAX)));
    }

    #[test]
    fn test_encode_speed_command() {
        assert_eq!(encode_speed_command(500), [0x01, 0xF4]);
        let encoded = encode_speed_command(750);
        assert_eq!(parse_speed_command(&encoded), Some(Setpoint::new(750)));
    }

    #[test]
    fn test_encode_decode_status() {
        let status = MotorStatus {
            setpoint: 650,
            step: 4,
            period_us: 12_345,
        };

        let encoded = encode_status(&status);
        assert_eq!(encoded, [0x02, 0x8A, 0x04, 0x00, 0x00, 0x30, 0x39]);
        assert_eq!(decode_status(&encoded), Some(status));
        assert_eq!(decode_status(&encoded[..6]), None);
    }

    #[test]
    fn test_rpm() {
        let status = MotorStatus {
            setpoint: 500,
            step: 0,
            period_us: 6_000,
        };
        assert_eq!(status.electrical_rpm(), 10_000.0);
        assert!((status.mechanical_rpm(7) - 10_000.0 / 7.0).abs() < 1e-3);
        assert_eq!(MotorStatus::new().electrical_rpm(), 0.0);
    }

    #[test]
    fn test_decode_command_filters_id() {
        assert_eq!(
            decode_command(&std_frame(0x123, &[0x01, 0xF4])),
            Some(Setpoint::new(500))
        );
        assert_eq!(decode_command(&std_frame(0x124, &[0x01, 0xF4])), None);

        let ext = MockFrame::new(ExtendedId::new(0x123).unwrap(), &[0x01, 0xF4]).unwrap();
        assert_eq!(decode_command(&ext), None);

        let remote = MockFrame::new_remote(StandardId::new(0x123).unwrap(), 2).unwrap();
        assert_eq!(decode_command(&remote), None);
    }

    #[test]
    fn test_poll_reads_one_frame_per_call() {
        let mut bus = MockBus::new();
        bus.push_rx(std_frame(0x123, &[0x00, 0xC8]));
        bus.push_rx(std_frame(0x123, &[0x01, 0x2C]));

        let mut cmd = CommandInterface::new();
        assert_eq!(cmd.poll(&mut bus), Some(Setpoint::new(200)));
        assert_eq!(cmd.poll(&mut bus), Some(Setpoint::new(300)));
        assert_eq!(cmd.poll(&mut bus), None);
        assert_eq!(cmd.received(), 2);
    }

    #[test]
    fn test_poll_ignores_errors_and_foreign_frames() {
        let mut bus = MockBus::new();
        bus.push_rx_error(ErrorKind::Overrun);
        bus.push_rx(std_frame(0x456, &[0x01, 0xF4]));
        bus.push_rx(std_frame(0x123, &[0x01]));

        let mut cmd = CommandInterface::new();
        assert_eq!(cmd.poll(&mut bus), None);
        assert_eq!(cmd.poll(&mut bus), None);
        assert_eq!(cmd.poll(&mut bus), None);
        assert_eq!(cmd.received(), 0);
        assert_eq!(cmd.ignored(), 2);
    }
}
