use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Fixed poll cadence.
pub const POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// A restartable fixed-interval timer. At most one schedule is active.
///
/// The first tick fires one full period after [`start`](Self::start), never
/// immediately. While stopped, [`tick`](Self::tick) never resolves, so it can
/// sit in a `select!` next to other event sources.
#[derive(Debug)]
pub struct PollTimer {
    period: Duration,
    interval: Option<Interval>,
}

impl Default for PollTimer {
    fn default() -> Self {
        Self::new(POLL_INTERVAL)
    }
}

impl PollTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Start ticking. Returns `false` if already running.
    pub fn start(&mut self) -> bool {
        if self.interval.is_some() {
            return false;
        }
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        // A slow poll pushes the schedule back instead of firing a burst.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        true
    }

    /// Stop ticking. Returns `false` if already stopped.
    pub fn stop(&mut self) -> bool {
        self.interval.take().is_some()
    }

    /// Wait for the next tick. Cancel-safe.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The paused clock resolves timers at millisecond granularity.
    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(5),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let mut timer = PollTimer::default();
        assert!(!timer.is_running());
        assert!(timer.start());
        assert!(!timer.start());
        assert!(timer.is_running());
        assert!(timer.stop());
        assert!(!timer.stop());
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_period() {
        let mut timer = PollTimer::default();
        timer.start();
        let started = Instant::now();
        timer.tick().await;
        assert_close(started.elapsed(), POLL_INTERVAL);
        timer.tick().await;
        assert_close(started.elapsed(), POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_never_ticks() {
        let mut timer = PollTimer::default();
        let fired = tokio::time::timeout(POLL_INTERVAL * 5, timer.tick()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resets_schedule() {
        let mut timer = PollTimer::default();
        timer.start();
        tokio::time::advance(Duration::from_millis(2000)).await;
        timer.stop();
        timer.start();
        let restarted = Instant::now();
        timer.tick().await;
        assert_close(restarted.elapsed(), POLL_INTERVAL);
    }
}
