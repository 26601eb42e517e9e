//! 時刻源の抽象化
//!
//! 制御ループは単調増加するマイクロ秒カウンタのみを必要とします。
//! カウンタは u32 で折り返すため、経過時間は常に `wrapping_sub` で求めます。

/// 単調増加するマイクロ秒クロック
pub trait Monotonic {
    /// 現在時刻 [μs]（u32で折り返す）
    fn now_us(&self) -> u32;
}

impl<T: Monotonic + ?Sized> Monotonic for &T {
    fn now_us(&self) -> u32 {
        (**self).now_us()
    }
}

/// `since` から `now` までの経過時間 [μs]
#[inline]
pub const fn elapsed_us(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_across_wrap() {
        assert_eq!(elapsed_us(100, 40), 60);
        assert_eq!(elapsed_us(5, u32::MAX - 4), 10);
        assert_eq!(elapsed_us(7, 7), 0);
    }
}
