//! 6ステップ（台形波）転流テーブル
//!
//! 各ステップでハイサイド1つ・ローサイド1つを通電し、残り1相を浮遊させます。
//!
//! | Step | High | Low | Floating |
//! |------|------|-----|----------|
//! | 0    | A    | B   | C        |
//! | 1    | A    | C   | B        |
//! | 2    | B    | C   | A        |
//! | 3    | B    | A   | C        |
//! | 4    | C    | A   | B        |
//! | 5    | C    | B   | A        |

/// モーター相
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    A,
    B,
    C,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];
}

/// パワースイッチ（ピン順: AH, AL, BH, BL, CH, CL）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Switch {
    AHigh = 0,
    ALow = 1,
    BHigh = 2,
    BLow = 3,
    CHigh = 4,
    CLow = 5,
}

impl Switch {
    pub const ALL: [Switch; 6] = [
        Switch::AHigh,
        Switch::ALow,
        Switch::BHigh,
        Switch::BLow,
        Switch::CHigh,
        Switch::CLow,
    ];

    /// 指定相のハイサイドスイッチ
    pub const fn high(phase: Phase) -> Self {
        match phase {
            Phase::A => Switch::AHigh,
            Phase::B => Switch::BHigh,
            Phase::C => Switch::CHigh,
        }
    }

    /// 指定相のローサイドスイッチ
    pub const fn low(phase: Phase) -> Self {
        match phase {
            Phase::A => Switch::ALow,
            Phase::B => Switch::BLow,
            Phase::C => Switch::CLow,
        }
    }

    /// このスイッチが属する相
    pub const fn phase(self) -> Phase {
        match self {
            Switch::AHigh | Switch::ALow => Phase::A,
            Switch::BHigh | Switch::BLow => Phase::B,
            Switch::CHigh | Switch::CLow => Phase::C,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// 6つのスイッチのON/OFF状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwitchStates([bool; 6]);

impl SwitchStates {
    /// 全スイッチOFF
    pub const ALL_OFF: SwitchStates = SwitchStates([false; 6]);

    /// ハイサイド相とローサイド相を指定して状態を作成
    pub const fn driving(high: Phase, low: Phase) -> Self {
        let mut states = [false; 6];
        states[Switch::high(high).index()] = true;
        states[Switch::low(low).index()] = true;
        SwitchStates(states)
    }

    pub const fn is_on(&self, switch: Switch) -> bool {
        self.0[switch.index()]
    }

    pub const fn as_array(&self) -> [bool; 6] {
        self.0
    }

    /// 通電中のスイッチ数
    pub fn energized_count(&self) -> usize {
        self.0.iter().filter(|on| **on).count()
    }

    /// 同一相のハイサイドとローサイドが同時にONになっていないか（貫通電流チェック）
    pub fn is_shoot_through_free(&self) -> bool {
        Phase::ALL
            .iter()
            .all(|&phase| !(self.is_on(Switch::high(phase)) && self.is_on(Switch::low(phase))))
    }
}

/// ステップごとの (ハイサイド相, ローサイド相, 浮遊相)
const STEP_PHASES: [(Phase, Phase, Phase); 6] = [
    (Phase::A, Phase::B, Phase::C),
    (Phase::A, Phase::C, Phase::B),
    (Phase::B, Phase::C, Phase::A),
    (Phase::B, Phase::A, Phase::C),
    (Phase::C, Phase::A, Phase::B),
    (Phase::C, Phase::B, Phase::A),
];

/// ステップ → スイッチ状態の静的テーブル
pub static SWITCH_TABLE: [SwitchStates; 6] = [
    SwitchStates::driving(STEP_PHASES[0].0, STEP_PHASES[0].1),
    SwitchStates::driving(STEP_PHASES[1].0, STEP_PHASES[1].1),
    SwitchStates::driving(STEP_PHASES[2].0, STEP_PHASES[2].1),
    SwitchStates::driving(STEP_PHASES[3].0, STEP_PHASES[3].1),
    SwitchStates::driving(STEP_PHASES[4].0, STEP_PHASES[4].1),
    SwitchStates::driving(STEP_PHASES[5].0, STEP_PHASES[5].1),
];

/// 転流ステップ (0-5)
///
/// 常に +1 mod 6 で前進し、スキップや逆転はしない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommutationStep(u8);

impl CommutationStep {
    pub const COUNT: u8 = 6;

    /// 起動時のステップ
    pub const INITIAL: CommutationStep = CommutationStep(0);

    /// 0-5以外は `None`
    pub const fn new(index: u8) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    /// 次のステップへ進める
    pub const fn next(self) -> Self {
        Self((self.0 + 1) % Self::COUNT)
    }

    pub fn switches(self) -> SwitchStates {
        SWITCH_TABLE[self.0 as usize]
    }

    pub const fn high_side(self) -> Phase {
        STEP_PHASES[self.0 as usize].0
    }

    pub const fn low_side(self) -> Phase {
        STEP_PHASES[self.0 as usize].1
    }

    /// 浮遊相（逆起電力のサンプリング対象）
    ///
    /// ステップ n と n+3 は同じ相が浮遊する。
    pub const fn floating(self) -> Phase {
        STEP_PHASES[self.0 as usize].2
    }
}
