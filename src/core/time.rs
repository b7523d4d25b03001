//! Frame timing for the per-frame flora update.
//!
//! The host loop either feeds wall-clock deltas ([`FrameClock::tick`]) or a
//! fixed step ([`FrameClock::advance`]) when simulating headless. Both paths
//! record the frame in a rolling history keyed by simulated time, so stats
//! are reproducible in tests.

use std::collections::VecDeque;
use std::time::Instant;

/// Upper bound on a single frame delta. Longer stalls (debugger, window drag)
/// would otherwise make decays and particles jump.
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// Frame-time statistics for a window of simulated time
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct FrameWindow {
    pub avg_fps: f32,
    pub min_fps: f32,
    pub max_fps: f32,
    pub frames: u32,
}

/// Tracks elapsed time, per-frame delta and rolling frame statistics
pub struct FrameClock {
    last_instant: Instant,
    elapsed: f32,
    delta: f32,
    frame_count: u64,
    /// (elapsed_at_frame, frame_delta) for the last few seconds
    history: VecDeque<(f32, f32)>,
    history_secs: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last_instant: Instant::now(),
            elapsed: 0.0,
            delta: 0.0,
            frame_count: 0,
            history: VecDeque::new(),
            history_secs: 5.0,
        }
    }

    /// Advance using the wall clock
    pub fn tick(&mut self) {
        let now = Instant::now();
        let delta = (now - self.last_instant).as_secs_f32();
        self.last_instant = now;
        self.advance(delta);
    }

    /// Advance by an explicit delta (clamped to [`MAX_FRAME_DELTA`])
    pub fn advance(&mut self, delta: f32) {
        let delta = delta.clamp(0.0, MAX_FRAME_DELTA);
        self.delta = delta;
        self.elapsed += delta;
        self.frame_count += 1;
        self.history.push_back((self.elapsed, delta));

        let cutoff = self.elapsed - self.history_secs;
        while let Some(&(at, _)) = self.history.front() {
            if at < cutoff {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Seconds since the clock started (simulated)
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Delta of the most recent frame in seconds
    pub fn delta(&self) -> f32 {
        self.delta
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Stats over the trailing `window` seconds of simulated time
    pub fn window(&self, window: f32) -> FrameWindow {
        let cutoff = self.elapsed - window;
        let mut frames = 0u32;
        let mut total = 0.0f32;
        let mut min_fps = f32::INFINITY;
        let mut max_fps = 0.0f32;

        for &(_, dt) in self.history.iter().filter(|(at, _)| *at >= cutoff) {
            frames += 1;
            total += dt;
            let fps = if dt > 0.0 { 1.0 / dt } else { 0.0 };
            min_fps = min_fps.min(fps);
            max_fps = max_fps.max(fps);
        }

        if frames == 0 {
            return FrameWindow::default();
        }

        FrameWindow {
            avg_fps: if total > 0.0 { frames as f32 / total } else { 0.0 },
            min_fps,
            max_fps,
            frames,
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates() {
        let mut clock = FrameClock::new();
        clock.advance(0.016);
        clock.advance(0.016);
        assert_eq!(clock.frame_count(), 2);
        assert!((clock.elapsed() - 0.032).abs() < 1e-6);
        assert!((clock.delta() - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_delta_clamped() {
        let mut clock = FrameClock::new();
        clock.advance(2.0);
        assert_eq!(clock.delta(), MAX_FRAME_DELTA);
        clock.advance(-1.0);
        assert_eq!(clock.delta(), 0.0);
    }

    #[test]
    fn test_window_stats() {
        let mut clock = FrameClock::new();
        for _ in 0..60 {
            clock.advance(1.0 / 60.0);
        }
        let w = clock.window(1.0);
        assert!(w.frames >= 59);
        assert!((w.avg_fps - 60.0).abs() < 0.5);
        assert!((w.min_fps - w.max_fps).abs() < 0.5);
    }

    #[test]
    fn test_history_pruned() {
        let mut clock = FrameClock::new();
        for _ in 0..1000 {
            clock.advance(0.05);
        }
        // 5 s of history at 20 fps
        assert!(clock.history.len() <= 101);
    }

    #[test]
    fn test_empty_window() {
        let clock = FrameClock::new();
        let w = clock.window(1.0);
        assert_eq!(w.frames, 0);
        assert_eq!(w.avg_fps, 0.0);
    }
}
