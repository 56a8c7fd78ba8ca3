//! Frame-rate smoothing primitives.
//!
//! Both helpers take the elapsed frame time so the visual result is the same
//! at 30 Hz and 144 Hz, give or take the discretisation of the exponential.
//!
//! ```rust
//! use haptic_deform::smoothing::PressureSmoother;
//!
//! let mut smoother = PressureSmoother::new(0.025);
//! let mut p = 0.0;
//! for _ in 0..120 {
//!     p = smoother.update(0.8, 1.0 / 60.0);
//! }
//! assert!((p - 0.8).abs() < 1e-3);
//! ```

/// Lower bound on the smoothing time; keeps `2 / smooth_time` finite.
const MIN_SMOOTH_TIME: f32 = 1e-4;

/// Critically damped spring step toward `target`.
///
/// `velocity` carries state between calls.  The result never passes
/// `target`: when the integration would overshoot, the value lands exactly on
/// `target` and the velocity is reset.  A non-positive `dt` returns `current`
/// unchanged.
pub fn smooth_damp(
    current: f32,
    target: f32,
    velocity: &mut f32,
    smooth_time: f32,
    dt: f32,
) -> f32 {
    if dt <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(MIN_SMOOTH_TIME);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    // Padé approximation of e^-x, stable for large steps.
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * decay;
    let mut output = target + (change + temp) * decay;

    let approaching_from_below = target > current;
    if approaching_from_below == (output > target) {
        output = target;
        *velocity = 0.0;
    }
    output
}

/// Interpolation weight for an exponential approach at `speed` per second,
/// clamped to `[0, 1]`.
pub fn lerp_factor(dt: f32, speed: f32) -> f32 {
    (dt * speed).clamp(0.0, 1.0)
}

/// [`smooth_damp`] with its velocity and smoothing time bundled.
#[derive(Debug, Clone)]
pub struct PressureSmoother {
    smooth_time: f32,
    value: f32,
    velocity: f32,
}

impl PressureSmoother {
    /// Start at rest (value 0) with the given smoothing time in seconds.
    pub fn new(smooth_time: f32) -> Self {
        Self {
            smooth_time,
            value: 0.0,
            velocity: 0.0,
        }
    }

    /// Advance one frame toward `target` and return the new value.
    pub fn update(&mut self, target: f32, dt: f32) -> f32 {
        self.value = smooth_damp(self.value, target, &mut self.velocity, self.smooth_time, dt);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn converges_on_target() {
        let mut v = 0.0;
        let mut x = 0.0;
        for _ in 0..200 {
            x = smooth_damp(x, 1.0, &mut v, 0.025, DT);
        }
        assert!((x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn never_overshoots_rising_or_falling() {
        for (start, target) in [(0.0f32, 1.0f32), (1.0, 0.0), (0.2, 0.9), (0.9, 0.3)] {
            let mut v = 0.0;
            let mut x = start;
            for _ in 0..500 {
                let next = smooth_damp(x, target, &mut v, 0.025, DT);
                if target > start {
                    assert!(next <= target && next >= x, "rising {x} -> {next}");
                } else {
                    assert!(next >= target && next <= x, "falling {x} -> {next}");
                }
                x = next;
            }
        }
    }

    #[test]
    fn large_step_lands_on_target() {
        let mut v = 0.0;
        let x = smooth_damp(0.0, 1.0, &mut v, 0.025, 10.0);
        assert_eq!(x, 1.0);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn zero_dt_is_a_no_op() {
        let mut v = 0.3;
        assert_eq!(smooth_damp(0.4, 1.0, &mut v, 0.025, 0.0), 0.4);
        assert_eq!(v, 0.3);
    }

    #[test]
    fn lerp_factor_is_clamped() {
        assert!((lerp_factor(1.0 / 60.0, 40.0) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(lerp_factor(0.5, 40.0), 1.0);
        assert_eq!(lerp_factor(-1.0, 40.0), 0.0);
    }

    #[test]
    fn smoother_tracks_state() {
        let mut s = PressureSmoother::new(0.025);
        assert_eq!(s.value(), 0.0);
        let first = s.update(1.0, DT);
        assert!(first > 0.0 && first < 1.0);
        assert!(s.velocity() > 0.0);
    }
}
