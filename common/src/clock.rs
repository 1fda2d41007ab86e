use std::time::{Duration, Instant};

/// Frame timer with millisecond resolution over a monotonic clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameClock {
    previous: Option<Instant>,
    delta: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock to now and returns the elapsed seconds.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to `now`. The first tick reports zero.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let elapsed = self
            .previous
            .map(|previous| now.saturating_duration_since(previous))
            .unwrap_or(Duration::ZERO);
        self.previous = Some(now);
        self.delta = elapsed.as_millis() as f32 / 1000.0;
        self.delta
    }

    /// Seconds measured by the last tick.
    pub fn delta(&self) -> f32 {
        self.delta
    }
}

/// Frames per second for `delta` seconds, `None` when `delta` is zero.
pub fn frames_per_second(delta: f32) -> Option<f32> {
    (delta > 0.0).then(|| 1.0 / delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick_at(Instant::now()), 0.0);
    }

    #[test]
    fn delta_is_truncated_to_milliseconds() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        clock.tick_at(start);

        let delta = clock.tick_at(start + Duration::from_micros(16_900));
        assert_eq!(delta, 0.016);
        assert_eq!(clock.delta(), 0.016);
    }

    #[test]
    fn clock_never_runs_backwards() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut clock = FrameClock::new();
        clock.tick_at(start);
        assert_eq!(clock.tick_at(start - Duration::from_millis(5)), 0.0);
    }

    #[test]
    fn fps_is_withheld_for_zero_delta() {
        assert_eq!(frames_per_second(0.0), None);
        assert_eq!(frames_per_second(0.5), Some(2.0));
    }
}
