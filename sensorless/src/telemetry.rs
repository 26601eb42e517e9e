//! ステータス送信
//!
//! 一定周期で速度指令・現在ステップ・電気周期をCANに送出します。
//! 送信は非ブロッキングで、送信キューが満杯ならそのフレームは破棄します。

use embedded_can::{nb::Can, Error as _, Frame};

use crate::can_protocol::{encode_status, error_kind_name, status_id, MotorStatus};
use crate::context::ControllerContext;
use crate::params::STATUS_INTERVAL_US;
use crate::time::elapsed_us;

/// 送信試行の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusOutcome {
    Sent(MotorStatus),
    Dropped,
}

/// ステータス送信器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReporter {
    interval_us: u32,
    last_attempt_us: u32,
    dropped: u32,
}

impl StatusReporter {
    pub const fn new(interval_us: u32) -> Self {
        Self {
            interval_us,
            last_attempt_us: 0,
            dropped: 0,
        }
    }

    pub fn snapshot(ctx: &ControllerContext) -> MotorStatus {
        MotorStatus {
            setpoint: ctx.setpoint.raw(),
            step: ctx.step.index(),
            period_us: ctx.period.as_micros(),
        }
    }

    /// 送信周期に達していれば1フレーム送信を試みる
    ///
    /// 成否に関わらず次の送信は1周期後（失敗しても毎ループ再送しない）。
    pub fn poll<B: Can>(
        &mut self,
        ctx: &ControllerContext,
        now_us: u32,
        bus: &mut B,
    ) -> Option<StatusOutcome> {
        if self.interval_us == 0 || elapsed_us(now_us, self.last_attempt_us) < self.interval_us {
            return None;
        }
        self.last_attempt_us = now_us;

        let status = Self::snapshot(ctx);
        let data = encode_status(&status);
        let Some(frame) = B::Frame::new(status_id(), &data) else {
            self.dropped = self.dropped.wrapping_add(1);
            return Some(StatusOutcome::Dropped);
        };

        match bus.transmit(&frame) {
            Ok(_) => Some(StatusOutcome::Sent(status)),
            Err(nb::Error::WouldBlock) => {
                self.dropped = self.dropped.wrapping_add(1);
                debug!("Status frame dropped: tx queue full");
                Some(StatusOutcome::Dropped)
            }
            Err(nb::Error::Other(e)) => {
                self.dropped = self.dropped.wrapping_add(1);
                debug!("Status frame dropped: {}", error_kind_name(e.kind()));
                Some(StatusOutcome::Dropped)
            }
        }
    }

    /// 破棄したステータスフレーム数
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(STATUS_INTERVAL_US)
    }
}
