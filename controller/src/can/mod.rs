pub mod manager;

pub use g4_sensorless::can_protocol as protocol;
pub use manager::*;
