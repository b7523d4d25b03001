//! Small stateful helpers for mapping audio onto visual parameters.

use serde::{Deserialize, Serialize};

/// Lowest frequency mapped by [`pitch_band`]
pub const PITCH_MIN_HZ: f32 = 40.0;
/// Highest frequency mapped by [`pitch_band`]
pub const PITCH_MAX_HZ: f32 = 5000.0;

/// Map a frequency onto 0..1 on a log2 scale. Silence (<= 0 Hz) maps to 0.
pub fn pitch_band(frequency: f32) -> f32 {
    if frequency <= 0.0 {
        return 0.0;
    }
    let lo = PITCH_MIN_HZ.log2();
    let hi = PITCH_MAX_HZ.log2();
    ((frequency.log2() - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Frame-rate independent exponential follower with separate attack and
/// release rates (per second).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub value: f32,
    pub attack: f32,
    pub release: f32,
}

impl Envelope {
    pub fn new(attack: f32, release: f32) -> Self {
        Self { value: 0.0, attack, release }
    }

    /// Move towards `target` and return the new value
    pub fn follow(&mut self, target: f32, dt: f32) -> f32 {
        let rate = if target > self.value { self.attack } else { self.release };
        let k = 1.0 - (-rate * dt.max(0.0)).exp();
        self.value += (target - self.value) * k;
        self.value
    }

    /// Jump to at least `level` (trigger) without lowering the current value
    pub fn hit(&mut self, level: f32) {
        self.value = self.value.max(level);
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(20.0, 3.0)
    }
}

/// Detects the frame where a signal crosses a threshold upwards
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEdge {
    high: bool,
}

impl TriggerEdge {
    /// Feed this frame's level; true only on the rising edge
    pub fn rising(&mut self, level: f32, threshold: f32) -> bool {
        let high = level > threshold;
        let fired = high && !self.high;
        self.high = high;
        fired
    }
}

/// Frame-rate independent exponential decay towards zero
pub fn decay(value: f32, rate: f32, dt: f32) -> f32 {
    value * (-rate * dt.max(0.0)).exp()
}
