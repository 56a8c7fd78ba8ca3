//! Finger proxies that close around the object as pressure rises.
//!
//! Each finger is a rigid segment pivoting at its base.  With pressure
//! applied, the finger turns so its tip points at a goal interpolated between
//! a light-touch target and a full-press target.  Without pressure it turns
//! back to its rest orientation.  Either way the angular rate is bounded, so
//! the proxy never snaps.

use haptic_types::math::{Quaternion, Vec3};
use serde::{Deserialize, Serialize};

/// Geometry of one finger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FingerConfig {
    /// Pivot point in world space.
    pub base: Vec3,
    /// Tip position relative to `base`, before any rotation.
    pub tip_offset: Vec3,
    /// Orientation at rest (zero pressure).
    pub rest_orientation: Quaternion,
    /// Where the tip aims at the lightest touch.
    pub touch_target: Vec3,
    /// Where the tip aims at full pressure.
    pub press_target: Vec3,
}

impl FingerConfig {
    /// Index finger resting on the moving (+X) face of the default object.
    pub fn index() -> Self {
        Self {
            base: Vec3::new(4.6, 1.6, 0.0),
            tip_offset: Vec3::new(-0.45, -0.45, 0.0),
            rest_orientation: Quaternion::identity(),
            touch_target: Vec3::new(4.1, 1.0, 0.0),
            press_target: Vec3::new(3.45, 1.0, 0.0),
        }
    }

    /// Thumb braced against the anchored (-X) face of the default object.
    pub fn thumb() -> Self {
        Self {
            base: Vec3::new(2.6, 1.6, 0.0),
            tip_offset: Vec3::new(0.45, -0.45, 0.0),
            rest_orientation: Quaternion::identity(),
            touch_target: Vec3::new(3.1, 1.0, 0.0),
            press_target: Vec3::new(3.1, 0.95, 0.0),
        }
    }
}

impl Default for FingerConfig {
    fn default() -> Self {
        Self::index()
    }
}

/// Rendered state of one finger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FingerPose {
    pub base: Vec3,
    pub orientation: Quaternion,
    pub tip: Vec3,
}

/// Rate-limited orientation tracker for one finger.
#[derive(Debug, Clone)]
pub struct FingerModel {
    config: FingerConfig,
    orientation: Quaternion,
    /// Degrees per second.
    rotation_speed: f32,
}

impl FingerModel {
    pub fn new(config: FingerConfig, rotation_speed: f32) -> Self {
        let rest = config.rest_orientation.normalized();
        Self {
            config: FingerConfig {
                rest_orientation: rest,
                ..config
            },
            orientation: rest,
            rotation_speed,
        }
    }

    /// Turn toward the pressure-dependent goal by at most
    /// `rotation_speed * dt` degrees.
    pub fn update(&mut self, pressure: f32, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let desired = if pressure > 0.0 {
            let goal = self
                .config
                .touch_target
                .lerp(self.config.press_target, pressure);
            let tip_direction = self.orientation.rotate(self.config.tip_offset);
            Quaternion::from_to_rotation(tip_direction, goal - self.config.base)
                .mul(self.orientation)
                .normalized()
        } else {
            self.config.rest_orientation
        };
        self.orientation = self
            .orientation
            .rotate_towards(desired, self.rotation_speed * dt);
    }

    pub fn orientation(&self) -> Quaternion {
        self.orientation
    }

    pub fn rest_orientation(&self) -> Quaternion {
        self.config.rest_orientation
    }

    pub fn tip(&self) -> Vec3 {
        self.config.base + self.orientation.rotate(self.config.tip_offset)
    }

    pub fn pose(&self) -> FingerPose {
        FingerPose {
            base: self.config.base,
            orientation: self.orientation,
            tip: self.tip(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn direction_error(finger: &FingerModel, goal: Vec3) -> f32 {
        let tip_dir = (finger.tip() - finger.config.base).normalized();
        let goal_dir = (goal - finger.config.base).normalized();
        tip_dir.dot(goal_dir).clamp(-1.0, 1.0).acos().to_degrees()
    }

    #[test]
    fn starts_at_rest() {
        let finger = FingerModel::new(FingerConfig::index(), 100.0);
        assert_eq!(finger.orientation(), Quaternion::identity());
        let expected = Vec3::new(4.15, 1.15, 0.0);
        assert!((finger.tip() - expected).length() < 1e-5);
    }

    #[test]
    fn angular_step_is_bounded() {
        let mut finger = FingerModel::new(FingerConfig::index(), 100.0);
        let mut previous = finger.orientation();
        for _ in 0..30 {
            finger.update(1.0, DT);
            let step = previous.angle_to(finger.orientation());
            assert!(step <= 100.0 * DT + 1e-2, "turned {step} degrees in one frame");
            previous = finger.orientation();
        }
    }

    #[test]
    fn full_pressure_aims_tip_at_press_target() {
        let config = FingerConfig::index();
        let mut finger = FingerModel::new(config, 100.0);
        for _ in 0..600 {
            finger.update(1.0, DT);
        }
        assert!(direction_error(&finger, config.press_target) < 0.5);
    }

    #[test]
    fn partial_pressure_aims_between_targets() {
        let config = FingerConfig::index();
        let mut finger = FingerModel::new(config, 100.0);
        for _ in 0..600 {
            finger.update(0.5, DT);
        }
        let midway = config.touch_target.lerp(config.press_target, 0.5);
        assert!(direction_error(&finger, midway) < 0.5);
    }

    #[test]
    fn releasing_returns_to_rest() {
        let mut finger = FingerModel::new(FingerConfig::thumb(), 100.0);
        for _ in 0..120 {
            finger.update(1.0, DT);
        }
        assert!(finger.orientation().angle_to(finger.rest_orientation()) > 1.0);
        for _ in 0..600 {
            finger.update(0.0, DT);
        }
        assert_eq!(finger.orientation(), finger.rest_orientation());
    }

    #[test]
    fn zero_dt_does_not_move() {
        let mut finger = FingerModel::new(FingerConfig::index(), 100.0);
        finger.update(1.0, 0.0);
        assert_eq!(finger.orientation(), Quaternion::identity());
    }
}
