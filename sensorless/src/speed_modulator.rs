//! 速度変調（オン時間ゲーティング）
//!
//! 各転流区間の先頭から onTime だけ通電し、残りは全スイッチOFFにします。
//! onTime = (周期 / 6) × 速度指令 / 1000

use crate::context::{ControllerContext, ElectricalPeriod, Setpoint};
use crate::params::MAX_SETPOINT;
use crate::power_stage::PowerStage;

/// 速度変調器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedModulator;

impl SpeedModulator {
    pub const fn new() -> Self {
        Self
    }

    /// 区間内の通電時間 [μs]
    ///
    /// 中間値は u64 で計算する（u32 だと 周期/6 × 1000 が溢れる）。
    /// 1000を超える指令では区間長より長くなる。
    pub const fn on_time_us(period: ElectricalPeriod, setpoint: Setpoint) -> u32 {
        let on = period.step_interval() as u64 * setpoint.raw() as u64 / MAX_SETPOINT as u64;
        if on > u32::MAX as u64 {
            u32::MAX
        } else {
            on as u32
        }
    }

    /// 現在時刻で全スイッチOFFにすべきか
    ///
    /// 指令が1000以上なら常に通電（カットしない）。
    pub const fn should_cut(&self, ctx: &ControllerContext, now_us: u32) -> bool {
        if ctx.setpoint.raw() >= MAX_SETPOINT {
            return false;
        }
        ctx.elapsed_since_transition(now_us) >= Self::on_time_us(ctx.period, ctx.setpoint)
    }

    /// オン時間を過ぎていればパワーステージを全OFFにする
    ///
    /// 全OFFにした場合 `true`。
    pub fn gate<P: PowerStage>(
        &self,
        ctx: &ControllerContext,
        now_us: u32,
        stage: &mut P,
    ) -> Result<bool, P::Error> {
        if self.should_cut(ctx, now_us) {
            stage.all_off()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
