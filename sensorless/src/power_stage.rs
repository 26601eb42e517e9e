//! パワーステージ（3相ハーフブリッジ）抽象化レイヤー
//!
//! 6本のゲート出力を直接操作し、転流ステップごとのスイッチ状態を適用します。

use embedded_hal::digital::OutputPin;

use crate::six_step::{CommutationStep, Switch, SwitchStates};

/// 3相ブリッジのゲート駆動
///
/// 実装は `all_off` 後に全スイッチが確実にOFFであることを保証すること。
pub trait PowerStage {
    type Error;

    /// ステップに対応するスイッチ状態を適用
    fn apply(&mut self, step: CommutationStep) -> Result<(), Self::Error>;

    /// 全スイッチOFF（フリーホイール）
    fn all_off(&mut self) -> Result<(), Self::Error>;
}

/// GPIO直結のパワーステージ
///
/// ピン順は [`Switch`] と同じ（AH, AL, BH, BL, CH, CL）。
pub struct GpioPowerStage<P> {
    pins: [P; 6],
    current: SwitchStates,
}

impl<P: OutputPin> GpioPowerStage<P> {
    /// 新しいパワーステージを作成
    ///
    /// 生成時点のピン状態は不明なので、まず全ピンをLowに落とす。
    pub fn new(pins: [P; 6]) -> Result<Self, P::Error> {
        let mut stage = Self {
            pins,
            current: SwitchStates::ALL_OFF,
        };
        for pin in stage.pins.iter_mut() {
            pin.set_low()?;
        }
        Ok(stage)
    }

    /// 最後に適用したスイッチ状態
    pub fn current(&self) -> SwitchStates {
        self.current
    }

    fn write(&mut self, target: SwitchStates) -> Result<(), P::Error> {
        // OFFにするスイッチを先に処理し、切替中の貫通を防ぐ
        for switch in Switch::ALL {
            if !target.is_on(switch) {
                self.pins[switch.index()].set_low()?;
            }
        }
        for switch in Switch::ALL {
            if target.is_on(switch) {
                self.pins[switch.index()].set_high()?;
            }
        }
        self.current = target;
        Ok(())
    }
}

impl<P: OutputPin> PowerStage for GpioPowerStage<P> {
    type Error = P::Error;

    fn apply(&mut self, step: CommutationStep) -> Result<(), Self::Error> {
        self.write(step.switches())
    }

    fn all_off(&mut self) -> Result<(), Self::Error> {
        self.write(SwitchStates::ALL_OFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{PinEvent, RecordingPin};

    fn stage() -> (GpioPowerStage<RecordingPin>, [RecordingPin; 6]) {
        let pins = RecordingPin::bank();
        let probes = pins.clone();
        (GpioPowerStage::new(pins).unwrap(), probes)
    }

    #[test]
    fn test_new_drives_all_pins_low() {
        let (stage, probes) = stage();
        assert_eq!(stage.current(), SwitchStates::ALL_OFF);
        for probe in probes.iter() {
            assert!(!probe.is_high());
        }
    }

    #[test]
    fn test_apply_matches_table() {
        let (mut stage, probes) = stage();
        let mut step = CommutationStep::INITIAL;
        for _ in 0..6 {
            stage.apply(step).unwrap();
            for switch in Switch::ALL {
                assert_eq!(probes[switch.index()].is_high(), step.switches().is_on(switch));
            }
            step = step.next();
        }
    }

    #[test]
    fn test_turn_off_happens_before_turn_on() {
        let (mut stage, probes) = stage();
        stage.apply(CommutationStep::new(0).unwrap()).unwrap();
        probes[0].clear_log();

        // step 0 (A+ B-) -> step 1 (A+ C-): BLを落としてからCLを上げる
        stage.apply(CommutationStep::new(1).unwrap()).unwrap();
        let log = probes[0].log();
        let bl_off = log
            .iter()
            .position(|e| *e == PinEvent::Low(Switch::BLow.index()))
            .unwrap();
        let cl_on = log
            .iter()
            .position(|e| *e == PinEvent::High(Switch::CLow.index()))
            .unwrap();
        assert!(bl_off < cl_on);
    }

    #[test]
    fn test_all_off() {
        let (mut stage, probes) = stage();
        stage.apply(CommutationStep::new(3).unwrap()).unwrap();
        stage.all_off().unwrap();
        assert!(probes.iter().all(|p| !p.is_high()));
        assert_eq!(stage.current().energized_count(), 0);
    }
}
