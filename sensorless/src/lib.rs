//! センサレス6ステップBLDC制御（CAN速度指令）
//!
//! ハードウェア非依存の制御ロジック。ピン・ADC・CAN・時刻源は
//! `embedded-hal` / `embedded-can` のトレイト越しに受け取るので、
//! ホスト上でモックを使ってテストできます。

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod can_protocol;
pub mod context;
pub mod controller;
pub mod params;
pub mod power_stage;
pub mod scheduler;
pub mod six_step;
pub mod speed_modulator;
pub mod telemetry;
pub mod time;
pub mod zero_crossing;

#[cfg(test)]
mod mock;

pub use context::{ControllerContext, ElectricalPeriod, Mode, Setpoint};
pub use controller::{Controller, ControllerConfig, Error, IterationReport};
pub use power_stage::{GpioPowerStage, PowerStage};
pub use six_step::{CommutationStep, Phase, Switch, SwitchStates};
pub use time::Monotonic;
pub use zero_crossing::PhaseSense;
