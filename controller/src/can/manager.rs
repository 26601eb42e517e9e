use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tokio_socketcan::{CANFrame, CANSocket};
use tracing::{debug, info};

use super::protocol::{self, can_ids, MotorStatus};

/// The socket stream ended; the interface is gone and will not deliver more frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketClosed;

impl std::fmt::Display for SocketClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CAN socket closed")
    }
}

impl std::error::Error for SocketClosed {}

/// CAN Manager for handling CAN communication
pub struct CanManager {
    socket: Arc<Mutex<Option<CANSocket>>>,
    interface_name: String,
}

impl CanManager {
    /// Create a new CAN manager
    pub fn new() -> Self {
        Self {
            socket: Arc::new(Mutex::new(None)),
            interface_name: String::new(),
        }
    }

    /// Connect to CAN interface
    ///
    /// # Arguments
    /// * `interface` - CAN interface name (e.g., "can0", "vcan0")
    pub async fn connect(&mut self, interface: &str) -> Result<()> {
        info!("Connecting to CAN interface: {}", interface);

        let socket = CANSocket::open(interface)
            .with_context(|| format!("Failed to open CAN interface: {}", interface))?;

        *self.socket.lock().await = Some(socket);
        self.interface_name = interface.to_string();

        info!("Successfully connected to {}", interface);
        Ok(())
    }

    /// Disconnect from CAN interface
    pub async fn disconnect(&mut self) {
        info!("Disconnecting from CAN interface");
        *self.socket.lock().await = None;
        self.interface_name.clear();
    }

    /// Check if connected
    pub async fn is_connected(&self) -> bool {
        self.socket.lock().await.is_some()
    }

    /// Get current interface name
    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    /// Send speed command
    ///
    /// # Arguments
    /// * `speed` - Commanded speed (0-1000)
    pub async fn send_speed_command(&self, speed: u16) -> Result<()> {
        let data = protocol::encode_speed_command(speed);
        self.send_frame(can_ids::SPEED_CMD as u32, &data).await
    }

    /// Receive next CAN frame with timeout
    ///
    /// # Arguments
    /// * `timeout_ms` - Timeout in milliseconds
    ///
    /// # Returns
    /// * `Ok(Some(frame))` if frame received
    /// * `Ok(None)` if timeout occurred
    /// * `Err` if receive error
    pub async fn receive_frame(&self, timeout_ms: u64) -> Result<Option<CANFrame>> {
        let mut socket_guard = self.socket.lock().await;
        if let Some(socket) = socket_guard.as_mut() {
            match timeout(Duration::from_millis(timeout_ms), socket.next()).await {
                Ok(Some(Ok(frame))) => Ok(Some(frame)),
                Ok(Some(Err(e))) => Err(anyhow::anyhow!("CAN receive error: {}", e)),
                Ok(None) => Err(SocketClosed.into()),
                Err(_) => Ok(None), // Timeout
            }
        } else {
            Err(anyhow::anyhow!("Not connected to CAN interface"))
        }
    }

    /// Whether a receive error means the socket stream has ended
    pub fn is_socket_closed(err: &anyhow::Error) -> bool {
        err.downcast_ref::<SocketClosed>().is_some()
    }

    /// Parse motor status from CAN frame
    pub fn parse_motor_status(frame: &CANFrame) -> Option<MotorStatus> {
        parse_status(frame.id(), frame.is_extended(), frame.data())
    }

    /// Send a CAN frame
    ///
    /// # Arguments
    /// * `id` - CAN message ID
    /// * `data` - CAN frame data
    async fn send_frame(&self, id: u32, data: &[u8]) -> Result<()> {
        let socket_guard = self.socket.lock().await;
        if let Some(socket) = socket_guard.as_ref() {
            let frame = CANFrame::new(id, data, false, false)
                .with_context(|| format!("Failed to create CAN frame with ID 0x{:X}", id))?;

            debug!("Sending CAN frame: ID=0x{:X}, len={}", id, data.len());

            socket
                .write_frame(frame)?
                .await
                .with_context(|| format!("Failed to send CAN frame with ID 0x{:X}", id))?;

            Ok(())
        } else {
            Err(anyhow::anyhow!("Not connected to CAN interface"))
        }
    }
}

impl Default for CanManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a status frame given its raw id, format flag and payload
fn parse_status(id: u32, extended: bool, data: &[u8]) -> Option<MotorStatus> {
    if extended || id != can_ids::STATUS as u32 {
        return None;
    }
    protocol::decode_status(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_filters_id() {
        let status = MotorStatus {
            setpoint: 300,
            step: 5,
            period_us: 9_000,
        };
        let data = protocol::encode_status(&status);

        assert_eq!(parse_status(0x456, false, &data), Some(status));
        assert_eq!(parse_status(0x123, false, &data), None);
        assert_eq!(parse_status(0x456, true, &data), None);
        assert_eq!(parse_status(0x456, false, &data[..3]), None);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let manager = CanManager::new();
        assert!(!manager.is_connected().await);
        assert!(manager.send_speed_command(100).await.is_err());
        assert!(manager.receive_frame(10).await.is_err());
        assert_eq!(manager.interface_name(), "");
    }

    #[tokio::test]
    async fn test_socket_closed_is_distinguished() {
        let closed: anyhow::Error = SocketClosed.into();
        assert!(CanManager::is_socket_closed(&closed));

        let manager = CanManager::new();
        let Err(not_connected) = manager.receive_frame(10).await else {
            panic!("receive without a socket should fail");
        };
        assert!(!CanManager::is_socket_closed(&not_connected));
        assert!(!CanManager::is_socket_closed(&anyhow::anyhow!("CAN receive error: bus-off")));
    }
}
