//! 制御ループ1周分の処理で共有するコントローラ状態

use core::num::NonZeroU32;

use crate::params::{INITIAL_ELECTRICAL_PERIOD_US, MAX_SETPOINT, MIN_SPEED, STEPS_PER_PERIOD};
use crate::six_step::CommutationStep;

/// 速度指令（公称 0-1000、最大値に対する千分率）
///
/// 受信値をそのまま保持する。[`MAX_SETPOINT`] を超えても拒否・クランプしない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Setpoint(u16);

impl Setpoint {
    pub const ZERO: Setpoint = Setpoint(0);
    pub const MAX: Setpoint = Setpoint(MAX_SETPOINT);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// 逆起電力を検出できる最小速度以上か
    pub const fn is_active(self) -> bool {
        self.0 >= MIN_SPEED
    }

    /// 公称範囲 0-1000 の外か（受け付けるが警告ログを出す）
    pub const fn is_out_of_range(self) -> bool {
        self.0 > MAX_SETPOINT
    }
}

/// 電気角1周（6ステップ）の周期 [μs]。0にはならない
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ElectricalPeriod(NonZeroU32);

impl ElectricalPeriod {
    pub const INITIAL: ElectricalPeriod = match NonZeroU32::new(INITIAL_ELECTRICAL_PERIOD_US) {
        Some(us) => ElectricalPeriod(us),
        None => panic!("initial electrical period must be non-zero"),
    };

    pub const fn from_micros(us: u32) -> Option<Self> {
        match NonZeroU32::new(us) {
            Some(us) => Some(Self(us)),
            None => None,
        }
    }

    /// 1ステップの所要時間 `step_us` から周期を求める
    ///
    /// 極端に長いステップではラップせず飽和させる。
    pub const fn from_step_interval(step_us: u32) -> Option<Self> {
        Self::from_micros(step_us.saturating_mul(STEPS_PER_PERIOD))
    }

    pub const fn as_micros(self) -> u32 {
        self.0.get()
    }

    /// 1転流ステップの区間長（周期 / 6）
    pub const fn step_interval(self) -> u32 {
        self.0.get() / STEPS_PER_PERIOD
    }
}

impl Default for ElectricalPeriod {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// 動作モード（速度指令が最小速度以上なら Active、未満なら Idle）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Idle,
    Active,
}

/// 制御ループが単独で所有する可変状態
///
/// 初期化は起動時のみ。アイドル中も各フィールドは保持され、
/// 再開時は最後に到達したステップから転流を続ける。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerContext {
    pub step: CommutationStep,
    pub period: ElectricalPeriod,
    /// 最後にステップを切り替えた時刻 [μs]
    pub last_transition_us: u32,
    pub setpoint: Setpoint,
    /// 前回の浮遊相サンプル（符号変化の検出用）
    pub last_sample: u16,
}

impl ControllerContext {
    pub const fn new() -> Self {
        Self {
            step: CommutationStep::INITIAL,
            period: ElectricalPeriod::INITIAL,
            last_transition_us: 0,
            setpoint: Setpoint::ZERO,
            last_sample: 0,
        }
    }

    pub const fn mode(&self) -> Mode {
        if self.setpoint.is_active() {
            Mode::Active
        } else {
            Mode::Idle
        }
    }

    /// 最後の切り替えからの経過時間 [μs]（タイマーのラップアラウンドに対応）
    pub const fn elapsed_since_transition(&self, now_us: u32) -> u32 {
        crate::time::elapsed_us(now_us, self.last_transition_us)
    }
}

impl Default for ControllerContext {
    fn default() -> Self {
        Self::new()
    }
}
