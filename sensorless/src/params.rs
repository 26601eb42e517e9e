//! センサレス6ステップ制御の設定パラメータ（デフォルト値）

/// 最小速度指令（これ未満では全スイッチOFFのアイドル状態）
/// 逆起電力が検出できる程度に回っている必要がある
pub const MIN_SPEED: u16 = 100;

/// 速度指令の公称最大値（この値でオン時間 = ステップ区間全体）
pub const MAX_SETPOINT: u16 = 1000;

/// 電気角1周あたりのステップ数
pub const STEPS_PER_PERIOD: u32 = 6;

/// 起動時の電気周期 [μs]（1ステップ ≒ 166.7ms）
pub const INITIAL_ELECTRICAL_PERIOD_US: u32 = 1_000_000;

/// 転流後、逆起電力をサンプリングする前のセトリング待ち時間 [μs]
/// 制御ループ全体をブロックするので小さく保つこと
pub const SETTLE_DELAY_US: u32 = 10;

/// 浮遊相電圧の中点しきい値（10ビットADC）
pub const BEMF_MIDPOINT: u16 = 512;

/// モーターの極対数（ステータス表示のRPM換算用）
pub const POLE_PAIRS: u8 = 7;

/// ステータスフレームの送信周期 [μs]（100ms）
pub const STATUS_INTERVAL_US: u32 = 100_000;
