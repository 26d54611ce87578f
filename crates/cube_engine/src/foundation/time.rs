//! Frame timing

use std::time::{Duration, Instant};

/// Seconds since the clock was created
pub struct FrameClock {
    start: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Start counting now
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Elapsed seconds
    pub fn elapsed_secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

/// Counts frames and reports the rate once per elapsed second
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    /// Start a counting window now
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
        }
    }

    /// Count one frame at `now`; returns the frame count when a full second closed
    pub fn tick_at(&mut self, now: Instant) -> Option<u32> {
        self.frames += 1;
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            let fps = self.frames;
            self.frames = 0;
            self.window_start = now;
            Some(fps)
        } else {
            None
        }
    }

    /// Count one frame now
    pub fn tick(&mut self) -> Option<u32> {
        self.tick_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_reported_once_per_second() {
        let start = Instant::now();
        let mut counter = FpsCounter {
            window_start: start,
            frames: 0,
        };

        for i in 1..60 {
            assert_eq!(counter.tick_at(start + Duration::from_millis(i * 16)), None);
        }
        assert_eq!(counter.tick_at(start + Duration::from_millis(1000)), Some(60));
        assert_eq!(counter.tick_at(start + Duration::from_millis(1010)), None);
    }
}
