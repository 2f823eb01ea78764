//! Countdown and stopwatch widgets driven by server snapshots.
//!
//! The server only sends snapshots; between them both widgets advance on the
//! local clock. Callers pass `now` explicitly so ticking is deterministic.

use crate::protocol::StopwatchSnapshot;

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Render seconds as `MM:SS`, or `H:MM:SS` from one hour on.
pub fn format_clock(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Counts down once per second and stops at zero.
#[derive(Debug, Clone, Default)]
pub struct Countdown {
    schedule: Option<(Instant, u64)>,
    shown: Option<u64>,
}

impl Countdown {
    /// Create an idle countdown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the schedule with a fresh count. Returns the initial rendering.
    pub fn set(&mut self, seconds: u64, now: Instant) -> String {
        self.schedule = (seconds > 0).then_some((now, seconds));
        self.shown = Some(seconds);
        format_clock(seconds)
    }

    /// Seconds left at `now`, or `None` if never set.
    pub fn remaining(&self, now: Instant) -> Option<u64> {
        let (start, seconds) = self.schedule?;
        let elapsed = now.saturating_duration_since(start).as_secs();
        Some(seconds.saturating_sub(elapsed))
    }

    /// Advance to `now`. Returns the new rendering when it changed.
    pub fn tick(&mut self, now: Instant) -> Option<String> {
        let remaining = self.remaining(now)?;
        if self.shown == Some(remaining) {
            return None;
        }
        self.shown = Some(remaining);
        if remaining == 0 {
            self.schedule = None;
        }
        Some(format_clock(remaining))
    }

    /// Whether the countdown is still running.
    pub fn is_running(&self) -> bool {
        self.schedule.is_some()
    }
}

/// Extrapolates elapsed time from the last snapshot while running.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    baseline: Option<(Instant, StopwatchSnapshot)>,
    shown: Option<u64>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the baseline. Returns the rendering at receipt.
    pub fn set(&mut self, snapshot: StopwatchSnapshot, now: Instant) -> String {
        self.baseline = Some((now, snapshot));
        self.shown = Some(snapshot.seconds);
        format_clock(snapshot.seconds)
    }

    /// Elapsed seconds at `now`, or `None` if no snapshot arrived yet.
    pub fn elapsed(&self, now: Instant) -> Option<u64> {
        let (received, snapshot) = self.baseline?;
        if !snapshot.running {
            return Some(snapshot.seconds);
        }
        Some(snapshot.seconds + now.saturating_duration_since(received).as_secs())
    }

    /// Advance to `now`. Returns the new rendering when it changed.
    pub fn tick(&mut self, now: Instant) -> Option<String> {
        let elapsed = self.elapsed(now)?;
        if self.shown == Some(elapsed) {
            return None;
        }
        self.shown = Some(elapsed);
        Some(format_clock(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(3599), "59:59");
        assert_eq!(format_clock(3600), "1:00:00");
        assert_eq!(format_clock(3725), "1:02:05");
    }

    #[test]
    fn test_countdown_stops_at_zero() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();

        assert_eq!(countdown.set(3, t0), "00:03");
        assert_eq!(countdown.tick(t0 + Duration::from_millis(500)), None);
        assert_eq!(countdown.tick(t0 + secs(1)).as_deref(), Some("00:02"));
        assert_eq!(countdown.tick(t0 + secs(2)).as_deref(), Some("00:01"));
        assert_eq!(countdown.tick(t0 + secs(3)).as_deref(), Some("00:00"));
        assert!(!countdown.is_running());
        assert_eq!(countdown.tick(t0 + secs(4)), None);
        assert_eq!(countdown.tick(t0 + secs(60)), None);
    }

    #[test]
    fn test_countdown_set_replaces_schedule() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        countdown.set(10, t0);
        countdown.tick(t0 + secs(2));

        assert_eq!(countdown.set(5, t0 + secs(2)), "00:05");
        assert_eq!(countdown.tick(t0 + secs(3)).as_deref(), Some("00:04"));
    }

    #[test]
    fn test_countdown_set_zero_is_stopped() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();

        assert_eq!(countdown.set(0, t0), "00:00");
        assert!(!countdown.is_running());
        assert_eq!(countdown.tick(t0 + secs(1)), None);
    }

    #[test]
    fn test_countdown_unset() {
        let mut countdown = Countdown::new();
        assert_eq!(countdown.tick(Instant::now()), None);
    }

    #[test]
    fn test_stopwatch_running_extrapolates() {
        let t0 = Instant::now();
        let mut watch = Stopwatch::new();

        assert_eq!(watch.set(StopwatchSnapshot { seconds: 58, running: true }, t0), "00:58");
        assert_eq!(watch.tick(t0 + secs(2)).as_deref(), Some("01:00"));
        assert_eq!(watch.elapsed(t0 + secs(5)), Some(63));
    }

    #[test]
    fn test_stopwatch_paused_holds() {
        let t0 = Instant::now();
        let mut watch = Stopwatch::new();
        watch.set(StopwatchSnapshot { seconds: 30, running: false }, t0);

        assert_eq!(watch.tick(t0 + secs(10)), None);
        assert_eq!(watch.elapsed(t0 + secs(10)), Some(30));
    }

    #[test]
    fn test_stopwatch_set_replaces_baseline() {
        let t0 = Instant::now();
        let mut watch = Stopwatch::new();
        watch.set(StopwatchSnapshot { seconds: 10, running: true }, t0);
        assert_eq!(watch.tick(t0 + secs(3)).as_deref(), Some("00:13"));

        assert_eq!(watch.set(StopwatchSnapshot { seconds: 20, running: true }, t0 + secs(3)), "00:20");
        assert_eq!(watch.tick(t0 + secs(4)).as_deref(), Some("00:21"));

        watch.set(StopwatchSnapshot { seconds: 5, running: false }, t0 + secs(4));
        assert_eq!(watch.elapsed(t0 + secs(30)), Some(5));
    }
}
