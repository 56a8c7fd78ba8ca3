//! Linear min/max pressure normalisation.
//!
//! ```rust
//! use haptic_sensor::normalizer::normalize;
//!
//! assert_eq!(normalize(500.0, 0.0, 1000.0), 0.5);
//! assert_eq!(normalize(-20.0, 0.0, 1000.0), 0.0);
//! assert_eq!(normalize(1e6, 0.0, 1000.0), 1.0);
//! ```

/// Number of decimal places kept in a normalised value.
pub const PRECISION_DIGITS: i32 = 5;

/// Map `raw` into `[0, 1]` by inverse linear interpolation between
/// `min_pressure` and `max_pressure`, then round to five decimal places.
///
/// A degenerate range (`min == max`) maps everything to `0.0`.
pub fn normalize(raw: f32, min_pressure: f32, max_pressure: f32) -> f32 {
    let span = f64::from(max_pressure) - f64::from(min_pressure);
    if span == 0.0 || !raw.is_finite() {
        return 0.0;
    }
    let t = ((f64::from(raw) - f64::from(min_pressure)) / span).clamp(0.0, 1.0);
    let scale = 10f64.powi(PRECISION_DIGITS);
    ((t * scale).round() / scale) as f32
}

/// A [`normalize`] call with its range fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureNormalizer {
    min_pressure: f32,
    max_pressure: f32,
}

impl PressureNormalizer {
    pub fn new(min_pressure: f32, max_pressure: f32) -> Self {
        Self {
            min_pressure,
            max_pressure,
        }
    }

    pub fn normalize(&self, raw: f32) -> f32 {
        normalize(raw, self.min_pressure, self.max_pressure)
    }

    pub fn range(&self) -> (f32, f32) {
        (self.min_pressure, self.max_pressure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn maps_range_endpoints() {
        assert_eq!(normalize(0.0, 0.0, 1000.0), 0.0);
        assert_eq!(normalize(1000.0, 0.0, 1000.0), 1.0);
        assert_eq!(normalize(250.0, 0.0, 1000.0), 0.25);
    }

    #[test]
    fn rounds_to_five_decimals() {
        // 1/3 of the range → 0.333333… → 0.33333
        assert_eq!(normalize(1.0, 0.0, 3.0), 0.33333);
        assert_eq!(normalize(123.456_78, 0.0, 1000.0), 0.12346);
    }

    #[test]
    fn degenerate_range_is_zero() {
        assert_eq!(normalize(5.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn inverted_range_still_clamps() {
        assert_eq!(normalize(0.0, 1000.0, 0.0), 1.0);
        assert_eq!(normalize(2000.0, 1000.0, 0.0), 0.0);
    }

    #[test]
    fn normalizer_uses_fixed_range() {
        let n = PressureNormalizer::new(100.0, 300.0);
        assert_eq!(n.normalize(200.0), 0.5);
        assert_eq!(n.range(), (100.0, 300.0));
    }

    proptest! {
        #[test]
        fn always_within_unit_interval(raw in -1.0e7f32..1.0e7f32) {
            let v = normalize(raw, 0.0, 1000.0);
            prop_assert!((0.0..=1.0).contains(&v));
        }

        #[test]
        fn idempotent_on_normalized_input(raw in -5000.0f32..5000.0f32) {
            let once = normalize(raw, 0.0, 1000.0);
            prop_assert_eq!(normalize(once, 0.0, 1.0), once);
        }
    }
}
