//! Frame timing

use std::time::{Duration, Instant};

/// Tracks frame delta and total elapsed time
#[derive(Debug, Clone)]
pub struct Time {
    last_frame: Instant,
    delta: Duration,
    elapsed: Duration,
    frame_count: u64,
}

impl Time {
    /// Start timing from now
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Mark the start of a new frame using the wall clock
    pub fn update(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.advance(delta);
    }

    /// Mark the start of a new frame with an explicit delta
    pub fn advance(&mut self, delta: Duration) {
        self.delta = delta;
        self.elapsed += delta;
        self.frame_count += 1;
    }

    /// Duration of the last frame
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Duration of the last frame in seconds
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Time accumulated over all frames
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Frames started so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}
