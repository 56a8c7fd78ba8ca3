//! [`DeformationModel`] – pressure in, object and finger poses out.
//!
//! The object is a box squeezed along one axis.  One face (the thumb side)
//! stays put while the opposite face moves inward as pressure rises; the two
//! other axes bulge by a fraction of the compression.
//!
//! Per frame:
//!
//! 1. the target pressure is smoothed with a critically damped spring,
//! 2. the target scale is derived from the smoothed pressure,
//! 3. the current scale and position approach their targets exponentially,
//! 4. both fingers turn toward their pressure-dependent goals.

use haptic_types::ConfigError;
use haptic_types::math::{Pose, Quaternion, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::finger::{FingerConfig, FingerModel, FingerPose};
use crate::smoothing::{PressureSmoother, lerp_factor};

/// Bounds accepted by [`DeformationModel::set_max_deformation`].
pub const MAX_DEFORMATION_RANGE: (f32, f32) = (0.1, 0.9);

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Geometry and smoothing parameters of the deformable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeformationConfig {
    /// Centre of the object at rest.
    pub initial_position: Vec3,
    /// Scale of the object at rest; `x` is the extent along `compression_axis`.
    pub initial_scale: Vec3,
    /// Direction from the anchored face toward the moving face.
    pub compression_axis: Vec3,
    /// Fraction of the rest width removed at full pressure.
    pub max_deformation: f32,
    /// Share of the compression that reappears as bulge on the other axes.
    pub expansion_factor: f32,
    /// Rate of the exponential approach of scale and position, per second.
    pub smooth_speed: f32,
    /// Smoothing time of the pressure spring, in seconds.
    pub pressure_smooth_time: f32,
    /// Finger angular speed limit, degrees per second.
    pub finger_rotation_speed: f32,
    pub index: FingerConfig,
    pub thumb: FingerConfig,
}

impl Default for DeformationConfig {
    fn default() -> Self {
        Self {
            initial_position: Vec3::new(3.6, 1.0, 0.0),
            initial_scale: Vec3::one(),
            compression_axis: Vec3::unit_x(),
            max_deformation: 0.96,
            expansion_factor: 0.96,
            smooth_speed: 40.0,
            pressure_smooth_time: 1.0 / 40.0,
            finger_rotation_speed: 100.0,
            index: FingerConfig::index(),
            thumb: FingerConfig::thumb(),
        }
    }
}

impl DeformationConfig {
    /// Check the parameters that would otherwise produce a degenerate or
    /// inverted object.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("deformation.initial_scale.x", self.initial_scale.x),
            ("deformation.initial_scale.y", self.initial_scale.y),
            ("deformation.initial_scale.z", self.initial_scale.z),
            ("deformation.smooth_speed", self.smooth_speed),
            ("deformation.pressure_smooth_time", self.pressure_smooth_time),
            ("deformation.finger_rotation_speed", self.finger_rotation_speed),
            ("deformation.compression_axis", self.compression_axis.length()),
        ];
        for (field, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::NonPositive { field });
            }
        }
        if !(0.0..1.0).contains(&self.max_deformation) {
            return Err(ConfigError::OutOfRange {
                field: "deformation.max_deformation",
                min: 0.0,
                max: 1.0,
            });
        }
        if !(0.0..=1.0).contains(&self.expansion_factor) {
            return Err(ConfigError::OutOfRange {
                field: "deformation.expansion_factor",
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }

    /// The fixed face: half the rest width behind the rest centre.
    pub fn anchor_point(&self) -> Vec3 {
        self.initial_position - self.axis() * (self.initial_scale.x * 0.5)
    }

    fn axis(&self) -> Vec3 {
        let axis = self.compression_axis.normalized();
        if axis == Vec3::zero() {
            Vec3::unit_x()
        } else {
            axis
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Frame output
// ────────────────────────────────────────────────────────────────────────────

/// Everything the presentation layer draws for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramePose {
    pub object: Pose,
    /// Centre of the moving face.
    pub contact_point: Vec3,
    /// Smoothed pressure that produced this pose.
    pub pressure: f32,
    pub index: FingerPose,
    pub thumb: FingerPose,
}

// ────────────────────────────────────────────────────────────────────────────
// DeformationModel
// ────────────────────────────────────────────────────────────────────────────

/// Smoothed, anchored squash of the object plus the two finger proxies.
#[derive(Debug, Clone)]
pub struct DeformationModel {
    axis: Vec3,
    anchor: Vec3,
    initial_scale: Vec3,
    current_scale: Vec3,
    position: Vec3,
    orientation: Quaternion,
    max_deformation: f32,
    expansion_factor: f32,
    smooth_speed: f32,
    pressure: PressureSmoother,
    index: FingerModel,
    thumb: FingerModel,
}

impl DeformationModel {
    /// Build the model at rest.  Call [`DeformationConfig::validate`] first;
    /// a zero axis falls back to +X.
    pub fn new(config: &DeformationConfig) -> Self {
        if config.compression_axis.normalized() == Vec3::zero() {
            warn!("compression axis has zero length; using +X");
        }
        let axis = config.axis();
        Self {
            axis,
            anchor: config.anchor_point(),
            initial_scale: config.initial_scale,
            current_scale: config.initial_scale,
            position: config.initial_position,
            orientation: Quaternion::from_to_rotation(Vec3::unit_x(), axis),
            max_deformation: config.max_deformation,
            expansion_factor: config.expansion_factor,
            smooth_speed: config.smooth_speed,
            pressure: PressureSmoother::new(config.pressure_smooth_time),
            index: FingerModel::new(config.index, config.finger_rotation_speed),
            thumb: FingerModel::new(config.thumb, config.finger_rotation_speed),
        }
    }

    /// Advance one frame toward `target_pressure` (normalised, `[0, 1]`).
    ///
    /// A non-positive `dt` leaves the state untouched and returns the current
    /// pose.
    pub fn tick(&mut self, target_pressure: f32, dt: f32) -> FramePose {
        if dt > 0.0 {
            let target_pressure = target_pressure.clamp(0.0, 1.0);
            let p = self.pressure.update(target_pressure, dt);

            let target = self.target_scale(p);
            let t = lerp_factor(dt, self.smooth_speed);
            self.current_scale = self.current_scale.lerp(target, t);

            let anchored = self.anchor + self.axis * (self.current_scale.x * 0.5);
            self.position = self.position.lerp(anchored, t);

            // Fingers follow the raw target so they start closing on the
            // first frame of contact.
            self.index.update(target_pressure, dt);
            self.thumb.update(target_pressure, dt);
        }
        self.frame()
    }

    fn target_scale(&self, pressure: f32) -> Vec3 {
        let squash = pressure * self.max_deformation;
        let bulge = 1.0 + squash * self.expansion_factor;
        self.initial_scale.component_mul(Vec3::new(1.0 - squash, bulge, bulge))
    }

    /// `1 - current width / rest width`.
    pub fn compression_amount(&self) -> f32 {
        1.0 - self.current_scale.x / self.initial_scale.x
    }

    /// Change the squash at full pressure, clamped to
    /// [`MAX_DEFORMATION_RANGE`].  Applies from the next [`tick`][Self::tick].
    pub fn set_max_deformation(&mut self, value: f32) {
        let (lo, hi) = MAX_DEFORMATION_RANGE;
        let clamped = value.clamp(lo, hi);
        if clamped != value {
            debug!(requested = value, applied = clamped, "max deformation clamped");
        }
        self.max_deformation = clamped;
    }

    /// Active deformation limit after clamping.
    pub fn max_deformation(&self) -> f32 {
        self.max_deformation
    }

    /// Smoothed pressure driving the scale.
    pub fn current_pressure(&self) -> f32 {
        self.pressure.value()
    }

    /// Scale reached this frame.
    pub fn current_scale(&self) -> Vec3 {
        self.current_scale
    }

    pub fn initial_scale(&self) -> Vec3 {
        self.initial_scale
    }

    pub fn anchor_point(&self) -> Vec3 {
        self.anchor
    }

    /// Centre of the moving face, the point subjects align with a target.
    pub fn contact_point(&self) -> Vec3 {
        self.position + self.axis * (self.current_scale.x * 0.5)
    }

    /// Object position, orientation and current scale.
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.current_scale, self.orientation)
    }

    /// Object and finger poses of the latest frame.
    pub fn frame(&self) -> FramePose {
        FramePose {
            object: self.pose(),
            contact_point: self.contact_point(),
            pressure: self.pressure.value(),
            index: self.index.pose(),
            thumb: self.thumb.pose(),
        }
    }
}
