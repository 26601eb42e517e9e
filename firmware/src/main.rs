#![no_std]
#![no_main]

mod config;
mod fmt;
mod hardware;
mod tasks;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel},
    can,
    gpio::{Level, Output, Speed},
};
use embassy_time::{Delay, Duration, Timer};
use g4_sensorless::{Controller, GpioPowerStage};

use hardware::{BemfSense, EmbassyClock, FdcanBus, Irqs};
use tasks::commutation_task;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // ハードウェア初期化
    let p = embassy_stm32::init(hardware::create_clock_config());

    info!("═══════════════════════════════════════════════════");
    info!("   Sensorless six-step BLDC • STM32G431VB @ 170MHz");
    info!("═══════════════════════════════════════════════════");

    // ゲート出力（TIM1ピンをGPIOとして使用、起動時は全てLow）
    // PE9=AH, PE8=AL, PE11=BH, PE10=BL, PE13=CH, PE12=CL
    let gate_pins = [
        Output::new(p.PE9, Level::Low, Speed::VeryHigh),
        Output::new(p.PE8, Level::Low, Speed::VeryHigh),
        Output::new(p.PE11, Level::Low, Speed::VeryHigh),
        Output::new(p.PE10, Level::Low, Speed::VeryHigh),
        Output::new(p.PE13, Level::Low, Speed::VeryHigh),
        Output::new(p.PE12, Level::Low, Speed::VeryHigh),
    ];
    let stage = GpioPowerStage::new(gate_pins).unwrap();

    // CAN初期化（500kbps、標準IDを全てFIFO0へ）
    let mut can_configurator = can::CanConfigurator::new(p.FDCAN1, p.PA11, p.PA12, Irqs);
    can_configurator.properties().set_standard_filter(
        can::filter::StandardFilterSlot::_0,
        can::filter::StandardFilter::accept_all_into_fifo0(),
    );
    can_configurator.set_bitrate(config::can::DEFAULT_BITRATE);
    let can = can_configurator.start(can::OperatingMode::NormalOperationMode);
    info!("FDCAN1 started at {} bps", config::can::DEFAULT_BITRATE);

    // 逆起電力センシング用ADC（PA0/PA1/PA2 = ADC1_IN1/IN2/IN3）
    let mut adc1 = Adc::new(p.ADC1);
    adc1.set_sample_time(config::adc::BEMF_SAMPLE_TIME);
    let sense = BemfSense::new(
        adc1,
        p.PA0.degrade_adc(),
        p.PA1.degrade_adc(),
        p.PA2.degrade_adc(),
    );

    let controller = Controller::new(
        config::controller_config(),
        FdcanBus::new(can),
        stage,
        sense,
        Delay,
        EmbassyClock,
    )
    .unwrap();

    info!("Starting sensorless commutation...");
    spawner.spawn(commutation_task(controller)).unwrap();

    // メインループ（将来の拡張用）
    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}
