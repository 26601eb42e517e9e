//! 転流スケジューラ（6ステップ状態機械）
//!
//! 毎ループ呼ばれ、最後の転流から 周期/6 以上経過していれば次のステップへ進めます。
//! 割り込みは使わず、協調的なポーリングで動作します。

use embedded_hal::delay::DelayNs;

use crate::context::{ControllerContext, ElectricalPeriod};
use crate::params::SETTLE_DELAY_US;
use crate::power_stage::PowerStage;
use crate::six_step::CommutationStep;
use crate::time::Monotonic;
use crate::zero_crossing::{PhaseSense, ZeroCrossingDetector};

/// 1回の転流の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Commutation {
    /// 新しく入ったステップ
    pub step: CommutationStep,
    /// この転流直後に検出したゼロクロス（更新後の周期）
    pub zero_crossing: Option<ElectricalPeriod>,
}

/// 転流スケジューラ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommutationScheduler {
    settle_delay_us: u32,
}

impl CommutationScheduler {
    pub const fn new(settle_delay_us: u32) -> Self {
        Self { settle_delay_us }
    }

    /// 次のステップへ進む時刻に達しているか
    pub const fn is_due(&self, ctx: &ControllerContext, now_us: u32) -> bool {
        ctx.elapsed_since_transition(now_us) >= ctx.period.step_interval()
    }

    /// 期限に達していれば1ステップ転流する
    ///
    /// 順序: ステップ+1 → 転流時刻を記録 → パワーステージ適用 →
    /// セトリング待ち（ループ全体をブロック）→ ゼロクロス検出。
    /// 期限前なら何もしない。
    #[allow(clippy::too_many_arguments)]
    pub fn poll<P, S, D, C>(
        &self,
        ctx: &mut ControllerContext,
        now_us: u32,
        stage: &mut P,
        detector: &ZeroCrossingDetector,
        sense: &mut S,
        delay: &mut D,
        clock: &C,
    ) -> Result<Option<Commutation>, P::Error>
    where
        P: PowerStage,
        S: PhaseSense,
        D: DelayNs,
        C: Monotonic,
    {
        if !self.is_due(ctx, now_us) {
            return Ok(None);
        }

        ctx.step = ctx.step.next();
        ctx.last_transition_us = now_us;
        stage.apply(ctx.step)?;

        delay.delay_us(self.settle_delay_us);

        let zero_crossing = detector.detect(ctx, sense, clock);
        trace!("commutated to step {} at {}us", ctx.step.index(), now_us);

        Ok(Some(Commutation {
            step: ctx.step,
            zero_crossing,
        }))
    }
}

impl Default for CommutationScheduler {
    fn default() -> Self {
        Self::new(SETTLE_DELAY_US)
    }
}
