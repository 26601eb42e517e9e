//! 逆起電力ゼロクロス検出
//!
//! 浮遊相の電圧を中点しきい値と比較し、前回サンプルから符号が反転したら
//! ゼロクロスとみなして電気周期を再推定します。
//! ヒステリシスやフィルタは持たないため、ノイズ1発で周期推定が1回乱れます。

use crate::context::{ControllerContext, ElectricalPeriod};
use crate::params::BEMF_MIDPOINT;
use crate::six_step::Phase;
use crate::time::Monotonic;

/// 相電圧のサンプリング
pub trait PhaseSense {
    /// 指定相の電圧（ADC生値）
    fn sample(&mut self, phase: Phase) -> u16;
}

impl<T: PhaseSense + ?Sized> PhaseSense for &mut T {
    fn sample(&mut self, phase: Phase) -> u16 {
        (**self).sample(phase)
    }
}

/// ゼロクロス検出器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ZeroCrossingDetector {
    midpoint: u16,
}

impl ZeroCrossingDetector {
    pub const fn new(midpoint: u16) -> Self {
        Self { midpoint }
    }

    /// 中点を挟んで符号が変わったか
    pub const fn is_crossing(&self, previous: u16, sample: u16) -> bool {
        (previous < self.midpoint) != (sample < self.midpoint)
    }

    /// 現在ステップの浮遊相をサンプリングし、ゼロクロスなら周期を更新
    ///
    /// 周期 = 最後の転流からの経過時間 × 6（区間中央でクロスする前提の近似）。
    /// 経過時間はサンプリング後に時計を読み直して求める。
    /// 前回サンプルはクロスの有無に関わらず毎回更新する。
    pub fn detect<S, C>(
        &self,
        ctx: &mut ControllerContext,
        sense: &mut S,
        clock: &C,
    ) -> Option<ElectricalPeriod>
    where
        S: PhaseSense,
        C: Monotonic,
    {
        let phase = ctx.step.floating();
        let sample = sense.sample(phase);
        let crossed = self.is_crossing(ctx.last_sample, sample);
        ctx.last_sample = sample;

        if !crossed {
            return None;
        }

        let elapsed = ctx.elapsed_since_transition(clock.now_us());
        match ElectricalPeriod::from_step_interval(elapsed) {
            Some(period) => {
                trace!(
                    "zero crossing on {:?}: sample={}, period={}us",
                    phase,
                    sample,
                    period.as_micros()
                );
                ctx.period = period;
                Some(period)
            }
            None => {
                // 経過0μsでは周期0になるので前回値を保持
                debug!("zero crossing with no elapsed time, period kept");
                None
            }
        }
    }
}

impl Default for ZeroCrossingDetector {
    fn default() -> Self {
        Self::new(BEMF_MIDPOINT)
    }
}
