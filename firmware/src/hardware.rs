//! ハードウェア初期化モジュール
//!
//! ペリフェラルの初期化と、制御ロジックが要求するトレイトへの橋渡しを集約します。

use core::task::Poll;

use embassy_stm32::{
    adc::{Adc, AnyAdcChannel},
    bind_interrupts, can,
    gpio::Output,
    peripherals, Config,
};
use embassy_time::{Delay, Instant};
use embedded_can::ErrorKind;
use g4_sensorless::{Controller, GpioPowerStage, Monotonic, Phase, PhaseSense};

// CANの割り込みをバインド
bind_interrupts!(pub struct Irqs {
    FDCAN1_IT0 => can::IT0InterruptHandler<peripherals::FDCAN1>;
    FDCAN1_IT1 => can::IT1InterruptHandler<peripherals::FDCAN1>;
});

/// この基板のコントローラ型
pub type BoardController =
    Controller<FdcanBus, GpioPowerStage<Output<'static>>, BemfSense, Delay, EmbassyClock>;

/// RCCクロック設定を初期化
///
/// HSI → PLL（÷4 × 85 ÷ 2）で170MHz生成
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux, Fdcansel};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV2), // FDCANクロック用
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R;

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        clock_mux.fdcansel = Fdcansel::PLL1_Q;
        config.rcc.mux = clock_mux;
    }
    config
}

/// FDCANを `embedded_can::nb::Can` として扱うアダプタ
///
/// 受信・送信ともに1回だけポーリングし、準備できていなければ `WouldBlock` を返す。
pub struct FdcanBus {
    can: can::Can<'static>,
}

impl FdcanBus {
    pub fn new(can: can::Can<'static>) -> Self {
        Self { can }
    }
}

impl embedded_can::nb::Can for FdcanBus {
    type Frame = can::frame::Frame;
    type Error = ErrorKind;

    fn transmit(&mut self, frame: &Self::Frame) -> nb::Result<Option<Self::Frame>, Self::Error> {
        // 送信バッファに空きがなければ待たずに諦める
        match embassy_futures::poll_once(self.can.write(frame)) {
            Poll::Ready(displaced) => Ok(displaced),
            Poll::Pending => Err(nb::Error::WouldBlock),
        }
    }

    fn receive(&mut self) -> nb::Result<Self::Frame, Self::Error> {
        match embassy_futures::poll_once(self.can.read()) {
            Poll::Ready(Ok(envelope)) => Ok(envelope.frame),
            Poll::Ready(Err(e)) => {
                debug!("FDCAN RX error: {:?}", e);
                Err(nb::Error::Other(ErrorKind::Other))
            }
            Poll::Pending => Err(nb::Error::WouldBlock),
        }
    }
}

/// 逆起電力センシング（ADC1、各相の分圧回路）
///
/// PA0=A相、PA1=B相、PA2=C相
pub struct BemfSense {
    adc: Adc<'static, peripherals::ADC1>,
    phase_a: AnyAdcChannel<peripherals::ADC1>,
    phase_b: AnyAdcChannel<peripherals::ADC1>,
    phase_c: AnyAdcChannel<peripherals::ADC1>,
}

impl BemfSense {
    pub fn new(
        adc: Adc<'static, peripherals::ADC1>,
        phase_a: AnyAdcChannel<peripherals::ADC1>,
        phase_b: AnyAdcChannel<peripherals::ADC1>,
        phase_c: AnyAdcChannel<peripherals::ADC1>,
    ) -> Self {
        Self {
            adc,
            phase_a,
            phase_b,
            phase_c,
        }
    }
}

impl PhaseSense for BemfSense {
    fn sample(&mut self, phase: Phase) -> u16 {
        let channel = match phase {
            Phase::A => &mut self.phase_a,
            Phase::B => &mut self.phase_b,
            Phase::C => &mut self.phase_c,
        };
        self.adc.blocking_read(channel)
    }
}

/// embassy-time のティック（1MHz）をマイクロ秒クロックとして使う
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

impl Monotonic for EmbassyClock {
    fn now_us(&self) -> u32 {
        // u32で折り返す（約71.6分周期）
        Instant::now().as_micros() as u32
    }
}
