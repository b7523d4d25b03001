//! Scalar math helpers: interpolation, value noise, damping.

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Cubic Hermite ease on `[0, 1]`
#[inline]
pub fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Integer lattice hash in `[-1, 1]`. Inputs are quantized to 1/1000.
pub fn hash2(x: f32, y: f32) -> f32 {
    let ix = (x * 1000.0) as i32;
    let iy = (y * 1000.0) as i32;
    let mut n = ix.wrapping_add(iy.wrapping_mul(57));
    n = (n << 13) ^ n;
    let m = n
        .wrapping_mul(n.wrapping_mul(n).wrapping_mul(15731).wrapping_add(789_221))
        .wrapping_add(1_376_312_589)
        & 0x7fff_ffff;
    1.0 - m as f32 / 1_073_741_824.0
}

/// 2D value noise with smoothstep-weighted bilinear blending
pub fn value_noise_2d(x: f32, y: f32) -> f32 {
    let ix = x.floor();
    let iy = y.floor();
    let fx = smoothstep(x - ix);
    let fy = smoothstep(y - iy);

    let v00 = hash2(ix, iy);
    let v10 = hash2(ix + 1.0, iy);
    let v01 = hash2(ix, iy + 1.0);
    let v11 = hash2(ix + 1.0, iy + 1.0);

    lerp(lerp(v00, v10, fx), lerp(v01, v11, fx), fy)
}

/// Fractal Brownian motion: `octaves` layers of value noise, each at double
/// frequency and half amplitude.
pub fn fbm(x: f32, y: f32, octaves: u32) -> f32 {
    let mut value = 0.0;
    let mut amplitude = 0.5;
    let mut frequency = 1.0;
    for _ in 0..octaves {
        value += amplitude * value_noise_2d(x * frequency, y * frequency);
        amplitude *= 0.5;
        frequency *= 2.0;
    }
    value
}

/// Critically damped spring towards `target`.
///
/// `velocity` carries state between calls. Returns the new value.
pub fn smooth_damp(current: f32, target: f32, velocity: &mut f32, smooth_time: f32, dt: f32) -> f32 {
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * exp;
    target + (change + temp) * exp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_and_smoothstep() {
        assert_eq!(lerp(2.0, 4.0, 0.5), 3.0);
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(smoothstep(0.5), 0.5);
    }

    #[test]
    fn test_hash_range_and_determinism() {
        for i in 0..200 {
            let x = i as f32 * 0.37;
            let h = hash2(x, -x * 1.3);
            assert!((-1.0..=1.0).contains(&h), "hash out of range: {h}");
            assert_eq!(h, hash2(x, -x * 1.3));
        }
    }

    #[test]
    fn test_value_noise_matches_lattice() {
        // at integer coordinates the fractional weights vanish
        assert_eq!(value_noise_2d(3.0, 5.0), hash2(3.0, 5.0));
    }

    #[test]
    fn test_fbm_bounded() {
        for i in 0..100 {
            let v = fbm(i as f32 * 0.13, i as f32 * 0.29, 4);
            assert!(v.abs() <= 1.0);
        }
        assert_eq!(fbm(1.0, 1.0, 0), 0.0);
    }

    #[test]
    fn test_smooth_damp_converges_without_overshoot() {
        let mut v = 0.0;
        let mut x = 0.0;
        for _ in 0..300 {
            x = smooth_damp(x, 10.0, &mut v, 0.3, 1.0 / 60.0);
            assert!(x <= 10.0 + 1e-3);
        }
        assert!((x - 10.0).abs() < 0.01);
    }
}
