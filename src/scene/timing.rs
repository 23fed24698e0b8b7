use std::time::Instant;

/// Per-frame clock readings, in seconds since the scene was created.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTiming {
    delta: f64,
    last: f64,
    current: f64,
}

impl FrameTiming {
    /// Starts a new frame at `now`.
    pub fn advance(&mut self, now: f64) {
        self.current = now;
        self.delta = self.current - self.last;
        self.last = self.current;
    }

    /// Seconds between the last two frames.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn last(&self) -> f64 {
        self.last
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

/// Monotonic seconds since creation.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let mut timing = FrameTiming::default();
        timing.advance(0.5);
        assert_eq!(timing.delta(), 0.5);
        timing.advance(0.75);
        assert_eq!(timing.delta(), 0.25);
        assert_eq!(timing.last(), 0.75);
        assert_eq!(timing.current(), 0.75);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = Clock::new();
        let a = clock.seconds();
        let b = clock.seconds();
        assert!(b >= a);
    }
}
