//! ボード設定パラメータ
//!
//! 制御アルゴリズム側の既定値は `g4_sensorless::params` を参照。
//! ここではこの基板固有の値のみを定義します。

use g4_sensorless::ControllerConfig;

/// 浮遊相電圧の中点しきい値（12ビットADC = 4096の半分）
pub const BEMF_MIDPOINT: u16 = 2048;

/// 制御ループのサマリーログを出す間隔 [ループ回数]
pub const LOG_INTERVAL_ITERATIONS: u32 = 200_000;

/// 基板向けのコントローラ設定
pub fn controller_config() -> ControllerConfig {
    ControllerConfig {
        bemf_midpoint: BEMF_MIDPOINT,
        ..ControllerConfig::default()
    }
}

/// CAN設定
pub mod can {
    /// CANビットレート（500kbps）
    pub const DEFAULT_BITRATE: u32 = 500_000;
}

/// ADC設定
pub mod adc {
    use embassy_stm32::adc::SampleTime;

    /// 逆起電力サンプリングのサンプル時間（ループをブロックするので短め）
    pub const BEMF_SAMPLE_TIME: SampleTime = SampleTime::CYCLES24_5;
}
