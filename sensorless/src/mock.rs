//! テスト用のモックハードウェア

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_can::{ErrorKind, Frame, Id};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::power_stage::PowerStage;
use crate::six_step::{CommutationStep, Phase, SwitchStates};
use crate::time::Monotonic;
use crate::zero_crossing::PhaseSense;

/// 手動で進める共有クロック（クローンは同じ時刻を共有）
#[derive(Debug, Clone, Default)]
pub struct MockClock(Rc<Cell<u32>>);

impl MockClock {
    pub fn new(now_us: u32) -> Self {
        Self(Rc::new(Cell::new(now_us)))
    }

    pub fn set(&self, now_us: u32) {
        self.0.set(now_us);
    }

    pub fn advance(&self, us: u32) {
        self.0.set(self.0.get().wrapping_add(us));
    }
}

impl Monotonic for MockClock {
    fn now_us(&self) -> u32 {
        self.0.get()
    }
}

/// 待ち時間だけクロックを進めるディレイ
#[derive(Debug)]
pub struct MockDelay {
    clock: MockClock,
    total_us: u32,
}

impl MockDelay {
    pub fn new(clock: &MockClock) -> Self {
        Self {
            clock: clock.clone(),
            total_us: 0,
        }
    }

    pub fn total_us(&self) -> u32 {
        self.total_us
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_us(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.clock.advance(us);
        self.total_us += us;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay_us(ms * 1_000);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEvent {
    High(usize),
    Low(usize),
}

/// 出力ピンのモック（6本でログを共有し、操作順を記録）
#[derive(Debug, Clone)]
pub struct RecordingPin {
    index: usize,
    state: Rc<Cell<bool>>,
    log: Rc<RefCell<Vec<PinEvent>>>,
}

impl RecordingPin {
    pub fn bank() -> [RecordingPin; 6] {
        let log = Rc::new(RefCell::new(Vec::new()));
        core::array::from_fn(|index| RecordingPin {
            index,
            state: Rc::new(Cell::new(false)),
            log: log.clone(),
        })
    }

    pub fn is_high(&self) -> bool {
        self.state.get()
    }

    pub fn log(&self) -> Vec<PinEvent> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.state.set(false);
        self.log.borrow_mut().push(PinEvent::Low(self.index));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.state.set(true);
        self.log.borrow_mut().push(PinEvent::High(self.index));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    Apply(u8),
    AllOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageFault;

/// 呼び出しを記録するパワーステージ
#[derive(Debug)]
pub struct RecordingStage {
    events: Vec<StageEvent>,
    current: SwitchStates,
    fail_next: bool,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            current: SwitchStates::ALL_OFF,
            fail_next: false,
        }
    }

    pub fn events(&self) -> Vec<StageEvent> {
        self.events.clone()
    }

    pub fn current(&self) -> SwitchStates {
        self.current
    }

    /// 次の操作を失敗させる
    pub fn fail_next(&mut self) {
        self.fail_next = true;
    }

    fn check(&mut self) -> Result<(), StageFault> {
        if self.fail_next {
            self.fail_next = false;
            return Err(StageFault);
        }
        Ok(())
    }
}

impl PowerStage for RecordingStage {
    type Error = StageFault;

    fn apply(&mut self, step: CommutationStep) -> Result<(), Self::Error> {
        self.check()?;
        self.events.push(StageEvent::Apply(step.index()));
        self.current = step.switches();
        Ok(())
    }

    fn all_off(&mut self) -> Result<(), Self::Error> {
        self.check()?;
        self.events.push(StageEvent::AllOff);
        self.current = SwitchStates::ALL_OFF;
        Ok(())
    }
}

/// 台本どおりの値を返す相電圧センサ（尽きたら最後の値を返し続ける）
#[derive(Debug)]
pub struct ScriptedSense {
    samples: VecDeque<u16>,
    last: u16,
    calls: usize,
    last_phase: Option<Phase>,
}

impl ScriptedSense {
    pub fn new(samples: impl IntoIterator<Item = u16>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            last: 0,
            calls: 0,
            last_phase: None,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn last_phase(&self) -> Option<Phase> {
        self.last_phase
    }
}

impl PhaseSense for ScriptedSense {
    fn sample(&mut self, phase: Phase) -> u16 {
        self.calls += 1;
        self.last_phase = Some(phase);
        if let Some(sample) = self.samples.pop_front() {
            self.last = sample;
        }
        self.last
    }
}

/// CANフレームのモック（クラシックCAN、最大8バイト）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFrame {
    id: Id,
    data: [u8; 8],
    dlc: usize,
    remote: bool,
}

impl Frame for MockFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            data: buf,
            dlc: data.len(),
            remote: false,
        })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(Self {
            id: id.into(),
            data: [0; 8],
            dlc,
            remote: true,
        })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data[..self.dlc]
        }
    }
}

/// キューで受信フレームを与え、送信フレームを記録するCANバス
#[derive(Debug, Default)]
pub struct MockBus {
    rx: VecDeque<Result<MockFrame, ErrorKind>>,
    tx: Vec<MockFrame>,
    tx_errors: VecDeque<ErrorKind>,
    tx_full: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rx(&mut self, frame: MockFrame) {
        self.rx.push_back(Ok(frame));
    }

    pub fn push_rx_error(&mut self, kind: ErrorKind) {
        self.rx.push_back(Err(kind));
    }

    pub fn push_tx_error(&mut self, kind: ErrorKind) {
        self.tx_errors.push_back(kind);
    }

    pub fn set_tx_full(&mut self, full: bool) {
        self.tx_full = full;
    }

    pub fn transmitted(&self) -> Vec<MockFrame> {
        self.tx.clone()
    }
}

impl embedded_can::nb::Can for MockBus {
    type Frame = MockFrame;
    type Error = ErrorKind;

    fn transmit(&mut self, frame: &Self::Frame) -> nb::Result<Option<Self::Frame>, Self::Error> {
        if let Some(kind) = self.tx_errors.pop_front() {
            return Err(nb::Error::Other(kind));
        }
        if self.tx_full {
            return Err(nb::Error::WouldBlock);
        }
        self.tx.push(frame.clone());
        Ok(None)
    }

    fn receive(&mut self) -> nb::Result<Self::Frame, Self::Error> {
        match self.rx.pop_front() {
            None => Err(nb::Error::WouldBlock),
            Some(Ok(frame)) => Ok(frame),
            Some(Err(kind)) => Err(nb::Error::Other(kind)),
        }
    }
}
