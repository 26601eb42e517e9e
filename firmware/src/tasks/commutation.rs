//! 転流制御タスク
//!
//! センサレス6ステップ制御ループを回し続けます。
//! 1周ごとに `yield_now` で他タスクに譲るだけで、タイマー待ちはしません。

use embassy_futures::yield_now;

use crate::config::LOG_INTERVAL_ITERATIONS;
use crate::hardware::BoardController;

/// 転流制御タスク
#[embassy_executor::task]
pub async fn commutation_task(mut controller: BoardController) {
    info!("Commutation task started");

    // デバッグログ（低頻度）用カウンタ
    let mut log_counter: u32 = 0;
    let mut commutations: u32 = 0;
    let mut zero_crossings: u32 = 0;
    let mut cut_offs: u32 = 0;

    loop {
        match controller.poll() {
            Ok(report) => {
                if report.commutated.is_some() {
                    commutations = commutations.wrapping_add(1);
                }
                if report.zero_crossing.is_some() {
                    zero_crossings = zero_crossings.wrapping_add(1);
                }
                if report.cut_off {
                    cut_offs = cut_offs.wrapping_add(1);
                }
            }
            Err(e) => {
                error!("Control loop error: {:?}", e);
            }
        }

        log_counter += 1;
        if log_counter >= LOG_INTERVAL_ITERATIONS {
            log_counter = 0;
            let ctx = controller.context();
            debug!(
                "[Sensorless] Mode: {:?}, Setpoint: {}, Step: {}, Period: {}us, Commutations: {}, ZC: {}, Cut: {}, Dropped status: {}",
                ctx.mode(),
                ctx.setpoint.raw(),
                ctx.step.index(),
                ctx.period.as_micros(),
                commutations,
                zero_crossings,
                cut_offs,
                controller.reporter().dropped()
            );
            commutations = 0;
            zero_crossings = 0;
            cut_offs = 0;
        }

        yield_now().await;
    }
}
