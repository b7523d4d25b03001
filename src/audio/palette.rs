//! Cyclic keyframe ramps and the note colour wheel.
//!
//! [`CyclicRamp`] interpolates keyed values over a repeating period. The
//! note palette keys one colour per semitone over a period of 12 so that
//! fractional pitches (pitch bends, portamento) blend between neighbours and
//! B wraps smoothly back to C.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Lerp trait
// ---------------------------------------------------------------------------

/// Trait for types that can be linearly interpolated.
pub trait Lerp: Clone {
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for [f32; 3] {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        std::array::from_fn(|i| self[i] + (other[i] - self[i]) * t)
    }
}

impl Lerp for [f32; 4] {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        std::array::from_fn(|i| self[i] + (other[i] - self[i]) * t)
    }
}

// ---------------------------------------------------------------------------
// CyclicRamp
// ---------------------------------------------------------------------------

/// Keyframe ramp over a repeating domain `[0, period)`.
///
/// Keys are `(position, value)` pairs kept sorted. Sampling between the last
/// and first key interpolates across the wrap point.
#[derive(Clone, Debug)]
pub struct CyclicRamp<T: Lerp> {
    period: f32,
    keys: Vec<(f32, T)>,
}

impl<T: Lerp> CyclicRamp<T> {
    /// Create a ramp from unsorted keys. Returns `None` for an empty key list
    /// or a non-positive period.
    pub fn new(period: f32, mut keys: Vec<(f32, T)>) -> Option<Self> {
        if keys.is_empty() || period <= 0.0 {
            return None;
        }
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        Some(Self { period, keys })
    }

    /// Ramp that always returns `value`
    pub fn constant(value: T) -> Self {
        Self { period: 1.0, keys: vec![(0.0, value)] }
    }

    pub fn period(&self) -> f32 {
        self.period
    }

    /// Sample at `t`, wrapped into `[0, period)`.
    pub fn sample(&self, t: f32) -> T {
        let n = self.keys.len();
        if n == 1 {
            return self.keys[0].1.clone();
        }

        let p = self.period;
        let t = t.rem_euclid(p);

        // (lower, upper, offset added to upper position when wrapping)
        let (a, b, wrap) = match self.keys.iter().position(|k| k.0 > t) {
            Some(0) => (n - 1, 0, p),
            Some(idx) => (idx - 1, idx, 0.0),
            None => (n - 1, 0, p),
        };

        let (t_a, ref v_a) = self.keys[a];
        let (t_b, ref v_b) = self.keys[b];
        let t_b = t_b + wrap;
        // before the first key, shift t into the previous period
        let t_local = if t < t_a { t + p } else { t };

        let span = t_b - t_a;
        if span < 1e-6 {
            return v_a.clone();
        }
        v_a.lerp(v_b, (t_local - t_a) / span)
    }
}

impl<T: Lerp + Serialize> Serialize for CyclicRamp<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.period, &self.keys).serialize(serializer)
    }
}

impl<'de, T: Lerp + Deserialize<'de>> Deserialize<'de> for CyclicRamp<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (period, keys) = <(f32, Vec<(f32, T)>)>::deserialize(deserializer)?;
        Self::new(period, keys)
            .ok_or_else(|| serde::de::Error::custom("ramp needs at least one key and a positive period"))
    }
}

// ---------------------------------------------------------------------------
// Note palette
// ---------------------------------------------------------------------------

/// Colour wheel indexed by pitch class (C = 0 .. B = 11)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotePalette {
    ramp: CyclicRamp<[f32; 3]>,
}

impl NotePalette {
    /// Colour for a note number; octave is ignored, fractions blend.
    pub fn color(&self, note: f32) -> [f32; 3] {
        self.ramp.sample(note)
    }

    /// Colour scaled towards white by `brightness` (0 = palette, 1 = white)
    pub fn color_bright(&self, note: f32, brightness: f32) -> [f32; 3] {
        self.color(note).lerp(&[1.0, 1.0, 1.0], brightness.clamp(0.0, 1.0))
    }
}

impl Default for NotePalette {
    fn default() -> Self {
        let keys = vec![
            (0.0, [1.00, 0.42, 0.62]),  // C  - candy pink
            (1.0, [1.00, 0.50, 0.45]),  // C# - coral
            (2.0, [1.00, 0.65, 0.30]),  // D  - tangerine
            (3.0, [1.00, 0.82, 0.35]),  // D# - butterscotch
            (4.0, [0.95, 0.95, 0.45]),  // E  - lemon
            (5.0, [0.60, 0.92, 0.45]),  // F  - lime
            (6.0, [0.40, 0.90, 0.65]),  // F# - mint
            (7.0, [0.38, 0.85, 0.90]),  // G  - aqua
            (8.0, [0.45, 0.65, 1.00]),  // G# - sky
            (9.0, [0.58, 0.50, 1.00]),  // A  - periwinkle
            (10.0, [0.78, 0.45, 1.00]), // A# - lavender
            (11.0, [0.95, 0.45, 0.90]), // B  - orchid
        ];
        Self {
            ramp: CyclicRamp { period: 12.0, keys },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_constant_ramp() {
        let ramp = CyclicRamp::constant(0.5_f32);
        assert!(approx(ramp.sample(0.0), 0.5));
        assert!(approx(ramp.sample(100.0), 0.5));
    }

    #[test]
    fn test_interpolation_inside_period() {
        let ramp = CyclicRamp::new(12.0, vec![(0.0, 0.0_f32), (6.0, 1.0)]).unwrap();
        assert!(approx(ramp.sample(3.0), 0.5));
        assert!(approx(ramp.sample(6.0), 1.0));
    }

    #[test]
    fn test_wraps_across_period_end() {
        let ramp = CyclicRamp::new(12.0, vec![(2.0, 1.0_f32), (10.0, 0.0)]).unwrap();
        // 10 -> 12/0 -> 2 spans 4 units
        assert!(approx(ramp.sample(0.0), 0.5));
        assert!(approx(ramp.sample(11.0), 0.25));
        assert!(approx(ramp.sample(1.0), 0.75));
    }

    #[test]
    fn test_negative_and_large_inputs_wrap() {
        let ramp = CyclicRamp::new(12.0, vec![(0.0, 0.0_f32), (6.0, 1.0)]).unwrap();
        assert!(approx(ramp.sample(-9.0), ramp.sample(3.0)));
        assert!(approx(ramp.sample(27.0), ramp.sample(3.0)));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(CyclicRamp::<f32>::new(12.0, vec![]).is_none());
        assert!(CyclicRamp::new(0.0, vec![(0.0, 1.0_f32)]).is_none());
    }

    #[test]
    fn test_palette_octave_invariant() {
        let palette = NotePalette::default();
        let c4 = palette.color(60.0);
        let c5 = palette.color(72.0);
        for i in 0..3 {
            assert!(approx(c4[i], c5[i]));
        }
    }

    #[test]
    fn test_palette_brightness() {
        let palette = NotePalette::default();
        let white = palette.color_bright(3.0, 1.0);
        assert_eq!(white, [1.0, 1.0, 1.0]);
        let base = palette.color_bright(3.0, 0.0);
        assert_eq!(base, palette.color(3.0));
    }

    #[test]
    fn test_serde_round_trip() {
        let palette = NotePalette::default();
        let json = serde_json::to_string(&palette).unwrap();
        let back: NotePalette = serde_json::from_str(&json).unwrap();
        assert_eq!(back.color(4.5), palette.color(4.5));
    }
}
