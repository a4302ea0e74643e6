//! 重连退避：`min(base * 2^attempt, cap)`，可叠加随机抖动。

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
            jitter: 0.0,
            attempt: 0,
        }
    }

    /// 抖动比例：实际延迟在 `[d, d * (1 + ratio)]` 内，且不超过上限。
    ///
    /// 比例限制在 `[0, 1]`，保证相邻两次延迟不会倒退。
    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    /// 第 `attempt` 次重连前的基础延迟（不含抖动）。
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// 取下一次延迟并推进计数。
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        if self.jitter <= 0.0 {
            return delay;
        }
        let extra = delay.mul_f64(rand::thread_rng().gen_range(0.0..=self.jitter));
        (delay + extra).min(self.cap)
    }

    /// 连接成功后归零。
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        let delays: Vec<u64> = (0..9).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60, 60]);
    }

    #[test]
    fn delays_are_non_decreasing() {
        let mut backoff = Backoff::new(Duration::from_millis(250), Duration::from_secs(10));
        let mut previous = Duration::ZERO;
        for _ in 0..64 {
            let delay = backoff.next_delay();
            assert!(delay >= previous);
            assert!(delay <= Duration::from_secs(10));
            previous = delay;
        }
    }

    #[test]
    fn reset_restarts_from_base() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut backoff =
            Backoff::new(Duration::from_secs(1), Duration::from_secs(60)).with_jitter(0.5);
        for attempt in 0..10 {
            let base = backoff.base_delay(attempt);
            let delay = backoff.next_delay();
            assert!(delay >= base);
            assert!(delay <= base.mul_f64(1.5).min(Duration::from_secs(60)));
        }
    }

    #[test]
    fn oversized_jitter_keeps_delays_non_decreasing() {
        for _ in 0..32 {
            let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(30))
                .with_jitter(5.0);
            let mut previous = Duration::ZERO;
            for _ in 0..12 {
                let delay = backoff.next_delay();
                assert!(delay >= previous);
                assert!(delay <= Duration::from_secs(30));
                previous = delay;
            }
        }
    }

    #[test]
    fn huge_attempt_saturates_at_cap() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(backoff.base_delay(200), Duration::from_secs(60));
    }
}
