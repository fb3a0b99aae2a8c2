//! Frame pacing for the update loop.
//!
//! The engine is always advanced by a fixed delta so sessions are
//! reproducible. In realtime mode each frame is additionally padded out to
//! its wall-clock budget so a real output device hears sounds at the right
//! moments.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Fixed-step frame clock.
#[derive(Debug)]
pub struct FrameClock {
    /// Frames per second
    frame_rate: u32,
    /// Seconds advanced per frame
    frame_delta: f32,
    /// Wall-clock budget per frame
    frame_budget: Duration,
    /// Start of the current frame
    frame_start: Instant,
    /// Sleep out each frame's budget
    realtime: bool,
    /// Frames started so far
    frame: u64,
    /// Virtual time advanced so far
    elapsed: f64,
    /// Recent wall-clock work times in seconds
    work_times: VecDeque<f32>,
    /// Maximum samples for averaging
    max_samples: usize,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FrameClock {
    /// Create a clock ticking at `frame_rate` frames per second.
    #[must_use]
    pub fn new(frame_rate: u32) -> Self {
        let frame_rate = frame_rate.max(1);
        Self {
            frame_rate,
            frame_delta: 1.0 / frame_rate as f32,
            frame_budget: Duration::from_secs_f64(1.0 / f64::from(frame_rate)),
            frame_start: Instant::now(),
            realtime: false,
            frame: 0,
            elapsed: 0.0,
            work_times: VecDeque::with_capacity(120),
            max_samples: 120,
        }
    }

    /// Enable or disable wall-clock pacing.
    #[must_use]
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Start a frame and return the delta to advance the engine by.
    pub fn begin_frame(&mut self) -> f32 {
        self.frame_start = Instant::now();
        self.frame += 1;
        self.elapsed += f64::from(self.frame_delta);
        self.frame_delta
    }

    /// Finish a frame, recording its work time and pacing if realtime.
    pub fn end_frame(&mut self) {
        let work = self.frame_start.elapsed().as_secs_f32();
        self.work_times.push_back(work);
        if self.work_times.len() > self.max_samples {
            self.work_times.pop_front();
        }

        if self.realtime {
            self.sleep_remainder();
        }
    }

    /// Sleep for the remainder of the frame budget.
    fn sleep_remainder(&self) {
        let elapsed = self.frame_start.elapsed();
        if elapsed < self.frame_budget {
            std::thread::sleep(self.frame_budget - elapsed);
        }
    }

    /// Frames started so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Virtual seconds advanced so far.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Seconds advanced per frame.
    #[must_use]
    pub fn frame_delta(&self) -> f32 {
        self.frame_delta
    }

    /// Frames per second.
    #[must_use]
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Whether frames are paced against the wall clock.
    #[must_use]
    pub fn is_realtime(&self) -> bool {
        self.realtime
    }

    /// Average wall-clock work per frame in milliseconds.
    #[must_use]
    pub fn average_work_ms(&self) -> f32 {
        if self.work_times.is_empty() {
            return 0.0;
        }

        (self.work_times.iter().sum::<f32>() / self.work_times.len() as f32) * 1000.0
    }

    /// Reset to frame zero.
    pub fn reset(&mut self) {
        self.frame_start = Instant::now();
        self.frame = 0;
        self.elapsed = 0.0;
        self.work_times.clear();
    }
}
