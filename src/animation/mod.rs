pub mod bounce;

pub use bounce::{advance_walk_phase, bounce_offset};

use std::time::{Duration, Instant};

/// Default simulation frame rate
pub const TARGET_FPS: u32 = 30;

/// Frame duration for a frame rate
pub fn frame_duration(fps: u32) -> Duration {
    Duration::from_millis(1000 / fps.max(1) as u64)
}

/// Frame pacing for the simulation loop
pub struct AnimationLoop {
    frame_duration: Duration,
    started: Instant,
    last_frame: Instant,
    frame_count: u64,
    fps_sample_start: Instant,
    fps_sample_count: u32,
    current_fps: u32,
}

impl AnimationLoop {
    pub fn new(fps: u32) -> Self {
        let now = Instant::now();
        Self {
            frame_duration: frame_duration(fps),
            started: now,
            last_frame: now,
            frame_count: 0,
            fps_sample_start: now,
            fps_sample_count: 0,
            current_fps: fps,
        }
    }

    /// Check if it's time for a new frame
    pub fn should_tick(&self) -> bool {
        self.last_frame.elapsed() >= self.frame_duration
    }

    /// Seconds since the last frame, capped so a stall doesn't teleport bots
    pub fn delta_time(&self) -> f64 {
        self.last_frame.elapsed().as_secs_f64().min(0.25)
    }

    /// Seconds since the loop started
    pub fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Mark frame as simulated
    pub fn frame_done(&mut self) {
        self.last_frame = Instant::now();
        self.frame_count += 1;
        self.fps_sample_count += 1;

        // Update FPS calculation every second
        if self.fps_sample_start.elapsed() >= Duration::from_secs(1) {
            self.current_fps = self.fps_sample_count;
            self.fps_sample_count = 0;
            self.fps_sample_start = Instant::now();
        }
    }

    pub fn fps(&self) -> u32 {
        self.current_fps
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Time until next frame
    pub fn time_until_next_frame(&self) -> Duration {
        let elapsed = self.last_frame.elapsed();
        if elapsed >= self.frame_duration {
            Duration::ZERO
        } else {
            self.frame_duration - elapsed
        }
    }
}

impl Default for AnimationLoop {
    fn default() -> Self {
        Self::new(TARGET_FPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration() {
        assert_eq!(frame_duration(30), Duration::from_millis(33));
        assert_eq!(frame_duration(0), Duration::from_millis(1000));
    }

    #[test]
    fn test_frame_counting() {
        let mut clock = AnimationLoop::new(60);
        clock.frame_done();
        clock.frame_done();
        assert_eq!(clock.frame_count(), 2);
        assert!(clock.time_until_next_frame() <= frame_duration(60));
        assert!(clock.delta_time() <= 0.25);
    }
}
