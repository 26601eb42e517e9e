//! 制御ループ本体
//!
//! `Controller::poll` 1回が制御ループ1周に相当します。
//!
//! 1. CANから速度指令を最大1フレーム受信（同じ周で即反映）
//! 2. 指令が最小速度未満なら全スイッチOFF（ステップ・周期は保持）
//! 3. それ以上なら転流スケジューラ → 速度変調
//! 4. ステータスフレームの周期送信

use core::fmt;

use embedded_can::nb::Can;
use embedded_hal::delay::DelayNs;

use crate::can_protocol::CommandInterface;
use crate::context::{ControllerContext, ElectricalPeriod, Mode, Setpoint};
use crate::params::{BEMF_MIDPOINT, SETTLE_DELAY_US, STATUS_INTERVAL_US};
use crate::power_stage::PowerStage;
use crate::scheduler::CommutationScheduler;
use crate::six_step::CommutationStep;
use crate::speed_modulator::SpeedModulator;
use crate::telemetry::{StatusOutcome, StatusReporter};
use crate::time::Monotonic;
use crate::zero_crossing::{PhaseSense, ZeroCrossingDetector};

/// 制御パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    /// 浮遊相電圧の中点しきい値（ADC生値）
    pub bemf_midpoint: u16,
    /// 転流後のセトリング待ち [μs]
    pub settle_delay_us: u32,
    /// ステータス送信周期 [μs]（0で送信しない）
    pub status_interval_us: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bemf_midpoint: BEMF_MIDPOINT,
            settle_delay_us: SETTLE_DELAY_US,
            status_interval_us: STATUS_INTERVAL_US,
        }
    }
}

/// 制御ループのエラー
///
/// バス関連の失敗はすべてループ内で吸収されるため、ここに現れるのは
/// パワーステージの出力失敗のみ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    PowerStage(E),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PowerStage(e) => write!(f, "power stage error: {:?}", e),
        }
    }
}

/// ループ1周の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IterationReport {
    /// 今回の周で有効な速度指令を受信したか
    pub setpoint_updated: bool,
    pub mode: Mode,
    /// 今回の周で転流したステップ
    pub commutated: Option<CommutationStep>,
    /// 今回の周で検出したゼロクロス（更新後の周期）
    pub zero_crossing: Option<ElectricalPeriod>,
    /// 速度変調で全OFFにしたか
    pub cut_off: bool,
    pub status: Option<StatusOutcome>,
}

/// センサレス6ステップコントローラ
pub struct Controller<B, P, S, D, C> {
    bus: B,
    stage: P,
    sense: S,
    delay: D,
    clock: C,
    ctx: ControllerContext,
    commands: CommandInterface,
    scheduler: CommutationScheduler,
    detector: ZeroCrossingDetector,
    modulator: SpeedModulator,
    reporter: StatusReporter,
    last_mode: Mode,
}

impl<B, P, S, D, C> Controller<B, P, S, D, C>
where
    B: Can,
    P: PowerStage,
    S: PhaseSense,
    D: DelayNs,
    C: Monotonic,
{
    /// 新しいコントローラを作成
    ///
    /// パワーステージは全OFFから始める。
    pub fn new(
        config: ControllerConfig,
        bus: B,
        mut stage: P,
        sense: S,
        delay: D,
        clock: C,
    ) -> Result<Self, Error<P::Error>> {
        stage.all_off().map_err(Error::PowerStage)?;
        info!(
            "Sensorless controller: midpoint={}, settle={}us, status every {}us",
            config.bemf_midpoint,
            config.settle_delay_us,
            config.status_interval_us
        );

        Ok(Self {
            bus,
            stage,
            sense,
            delay,
            clock,
            ctx: ControllerContext::new(),
            commands: CommandInterface::new(),
            scheduler: CommutationScheduler::new(config.settle_delay_us),
            detector: ZeroCrossingDetector::new(config.bemf_midpoint),
            modulator: SpeedModulator::new(),
            reporter: StatusReporter::new(config.status_interval_us),
            last_mode: Mode::Idle,
        })
    }

    /// 制御ループを1周実行
    pub fn poll(&mut self) -> Result<IterationReport, Error<P::Error>> {
        let now = self.clock.now_us();

        // 1. 指令受信
        let setpoint_updated = match self.commands.poll(&mut self.bus) {
            Some(setpoint) => {
                self.set_setpoint(setpoint);
                true
            }
            None => false,
        };

        let mode = self.ctx.mode();
        if mode != self.last_mode {
            match mode {
                Mode::Active => info!(
                    "Motor ACTIVE: setpoint={}, resuming at step {}",
                    self.ctx.setpoint.raw(),
                    self.ctx.step.index()
                ),
                Mode::Idle => info!("Motor IDLE: setpoint={}", self.ctx.setpoint.raw()),
            }
            self.last_mode = mode;
        }

        let mut report = IterationReport {
            setpoint_updated,
            mode,
            commutated: None,
            zero_crossing: None,
            cut_off: false,
            status: None,
        };

        match mode {
            Mode::Idle => {
                // 2. 最小速度未満: 状態は保持したまま全OFF
                self.stage.all_off().map_err(Error::PowerStage)?;
            }
            Mode::Active => {
                // 3. 転流 → 速度変調（同じ now を使う）
                let commutation = self
                    .scheduler
                    .poll(
                        &mut self.ctx,
                        now,
                        &mut self.stage,
                        &self.detector,
                        &mut self.sense,
                        &mut self.delay,
                        &self.clock,
                    )
                    .map_err(Error::PowerStage)?;
                if let Some(c) = commutation {
                    report.commutated = Some(c.step);
                    report.zero_crossing = c.zero_crossing;
                }

                report.cut_off = self
                    .modulator
                    .gate(&self.ctx, now, &mut self.stage)
                    .map_err(Error::PowerStage)?;
            }
        }

        // 4. ステータス送信
        report.status = self.reporter.poll(&self.ctx, now, &mut self.bus);

        Ok(report)
    }

    fn set_setpoint(&mut self, setpoint: Setpoint) {
        if setpoint != self.ctx.setpoint {
            info!("Setpoint: {} -> {}", self.ctx.setpoint.raw(), setpoint.raw());
        }
        self.ctx.setpoint = setpoint;
    }

    pub fn context(&self) -> &ControllerContext {
        &self.ctx
    }

    pub fn setpoint(&self) -> Setpoint {
        self.ctx.setpoint
    }

    pub fn mode(&self) -> Mode {
        self.ctx.mode()
    }

    pub fn commands(&self) -> &CommandInterface {
        &self.commands
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    pub fn stage(&self) -> &P {
        &self.stage
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
