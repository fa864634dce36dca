//! The replay driver's notion of time (spec.md §4.6). Three clocks sharing
//! one `Clock` trait, mirroring `barter::engine::clock`'s
//! `LiveClock`/`HistoricalClock` split rather than folding them into one
//! enum, since each has a genuinely different `tick_until` strategy.

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;

pub(crate) fn unix_ms_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as i64
}

/// How the replay driver advances between events.
#[async_trait]
pub trait Clock: Debug + Send {
    fn now(&self) -> i64;
    async fn tick_until(&mut self, wall_target_ms: i64);
}

/// `now` is a counter that jumps straight to whatever target it's asked
/// for — infinite-speed replay with no real sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalClock {
    current_ms: i64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }
}

#[async_trait]
impl Clock for LogicalClock {
    fn now(&self) -> i64 {
        self.current_ms
    }

    async fn tick_until(&mut self, wall_target_ms: i64) {
        self.current_ms = wall_target_ms;
    }
}

/// `now` tracks the real system clock; `tick_until` actually sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl WallClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for WallClock {
    fn now(&self) -> i64 {
        unix_ms_now()
    }

    async fn tick_until(&mut self, wall_target_ms: i64) {
        let delta = wall_target_ms - self.now();
        if delta > 0 {
            sleep(Duration::from_millis(delta as u64)).await;
        }
    }
}

/// Like [`WallClock`], but real elapsed time is `simElapsed / speed`. The
/// origin (first `wall_target_ms` seen, paired with the `Instant` at that
/// moment) is latched on the first `tick_until` call.
#[derive(Debug)]
pub struct AcceleratedClock {
    speed: f64,
    origin: Option<(Instant, i64)>,
}

impl AcceleratedClock {
    pub fn new(speed: f64) -> Self {
        assert!(speed > 0.0, "replay speed must be positive");
        Self {
            speed,
            origin: None,
        }
    }
}

#[async_trait]
impl Clock for AcceleratedClock {
    fn now(&self) -> i64 {
        match self.origin {
            Some((instant, origin_target_ms)) => {
                let elapsed_real_ms = instant.elapsed().as_secs_f64() * 1000.0;
                origin_target_ms + (elapsed_real_ms * self.speed) as i64
            }
            None => unix_ms_now(),
        }
    }

    async fn tick_until(&mut self, wall_target_ms: i64) {
        let &mut (origin_instant, origin_target_ms) =
            self.origin.get_or_insert_with(|| (Instant::now(), wall_target_ms));
        let sim_elapsed_ms = (wall_target_ms - origin_target_ms).max(0) as f64;
        let real_elapsed_needed_ms = sim_elapsed_ms / self.speed;
        let target = origin_instant + Duration::from_millis(real_elapsed_needed_ms as u64);
        let now = Instant::now();
        if target > now {
            sleep(target - now).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logical_clock_jumps_instantly() {
        let mut clock = LogicalClock::new();
        assert_eq!(clock.now(), 0);
        clock.tick_until(5_000).await;
        assert_eq!(clock.now(), 5_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_sleeps_until_target() {
        let mut clock = WallClock::new();
        let target = clock.now() + 50;
        let before = tokio::time::Instant::now();
        clock.tick_until(target).await;
        assert!(tokio::time::Instant::now() >= before + Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accelerated_clock_scales_elapsed_time() {
        let mut clock = AcceleratedClock::new(10.0);
        let origin = clock.now();
        let before = tokio::time::Instant::now();
        // 1000ms of simulated time at 10x speed should take ~100ms real time.
        clock.tick_until(origin + 1_000).await;
        let elapsed = tokio::time::Instant::now() - before;
        assert!(elapsed >= Duration::from_millis(95) && elapsed <= Duration::from_millis(150));
    }
}
