//! Minimal 3-D math for the deformation model.
//!
//! Provides [`Vec3`], a unit [`Quaternion`] with the handful of rotation
//! helpers the finger proxies need, and [`Pose`], the value the core hands to
//! the presentation layer every frame instead of writing into a scene graph.
//!
//! # Example
//!
//! ```rust
//! use haptic_types::math::{Quaternion, Vec3};
//!
//! // Rotation that carries +X onto +Y (90° about +Z).
//! let q = Quaternion::from_to_rotation(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
//! let v = q.rotate(Vec3::new(1.0, 0.0, 0.0));
//! assert!((v.y - 1.0).abs() < 1e-5);
//! ```

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

const EPSILON: f32 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D point or direction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// `(1, 1, 1)`, the identity for [`Vec3::component_mul`].
    pub const fn one() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    /// Unit vector along +X.
    pub const fn unit_x() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Element-wise (Hadamard) product.
    pub fn component_mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Return the unit-length vector, or the zero vector when the length is
    /// (numerically) zero.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= EPSILON {
            Self::zero()
        } else {
            self * (1.0 / len)
        }
    }

    /// Linear interpolation with `t` clamped to `[0, 1]`.
    pub fn lerp(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        self + (to - self) * t
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `degrees` about `axis` (need not be normalised).
    pub fn from_axis_angle(axis: Vec3, degrees: f32) -> Self {
        let axis = axis.normalized();
        let half = degrees.to_radians() * 0.5;
        let s = half.sin();
        Self::new(half.cos(), axis.x * s, axis.y * s, axis.z * s)
    }

    /// Shortest-arc rotation that carries direction `from` onto direction `to`.
    ///
    /// Returns the identity when either input has zero length.
    pub fn from_to_rotation(from: Vec3, to: Vec3) -> Self {
        let from = from.normalized();
        let to = to.normalized();
        if from == Vec3::zero() || to == Vec3::zero() {
            return Self::identity();
        }
        let d = from.dot(to);
        if d >= 1.0 - EPSILON {
            return Self::identity();
        }
        if d <= -1.0 + EPSILON {
            // Antiparallel: rotate half a turn about any axis orthogonal to `from`.
            let mut axis = Vec3::unit_x().cross(from);
            if axis.length() <= EPSILON {
                axis = Vec3::new(0.0, 1.0, 0.0).cross(from);
            }
            return Self::from_axis_angle(axis, 180.0);
        }
        let c = from.cross(to);
        Self::new(1.0 + d, c.x, c.y, c.z).normalized()
    }

    /// Hamilton product: compose two rotations (`rhs` applied first).
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.w * rhs.w + self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Rescale to unit length; degenerate input collapses to the identity.
    pub fn normalized(self) -> Self {
        let len = self.dot(self).sqrt();
        if len <= EPSILON {
            Self::identity()
        } else {
            Self::new(self.w / len, self.x / len, self.y / len, self.z / len)
        }
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Angle in degrees between two orientations, in `[0, 180]`.
    pub fn angle_to(self, other: Self) -> f32 {
        let d = self.dot(other).abs().min(1.0);
        (2.0 * d.acos()).to_degrees()
    }

    /// Spherical interpolation along the shortest arc; `t` is clamped to
    /// `[0, 1]`.
    pub fn slerp(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mut to = to;
        let mut d = self.dot(to);
        if d < 0.0 {
            to = Self::new(-to.w, -to.x, -to.y, -to.z);
            d = -d;
        }
        if d > 0.9995 {
            // Nearly parallel: normalised lerp is accurate and avoids 0/0.
            return Self::new(
                self.w + (to.w - self.w) * t,
                self.x + (to.x - self.x) * t,
                self.y + (to.y - self.y) * t,
                self.z + (to.z - self.z) * t,
            )
            .normalized();
        }
        let theta = d.acos();
        let sin_theta = theta.sin();
        let a = ((1.0 - t) * theta).sin() / sin_theta;
        let b = (t * theta).sin() / sin_theta;
        Self::new(
            a * self.w + b * to.w,
            a * self.x + b * to.x,
            a * self.y + b * to.y,
            a * self.z + b * to.z,
        )
        .normalized()
    }

    /// Rotate from `self` toward `target` by at most `max_degrees`.
    ///
    /// Never overshoots: once the remaining angle is within the step the
    /// result is exactly `target`.
    pub fn rotate_towards(self, target: Self, max_degrees: f32) -> Self {
        let angle = self.angle_to(target);
        if angle <= f32::EPSILON || max_degrees >= angle {
            return target;
        }
        if max_degrees <= 0.0 {
            return self;
        }
        self.slerp(target, max_degrees / angle)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose
// ────────────────────────────────────────────────────────────────────────────

/// Position, scale and orientation of one rendered object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub scale: Vec3,
    pub orientation: Quaternion,
}

impl Pose {
    pub fn new(position: Vec3, scale: Vec3, orientation: Quaternion) -> Self {
        Self {
            position,
            scale,
            orientation,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn lerp_clamps_factor() {
        let a = Vec3::zero();
        let b = Vec3::new(2.0, 0.0, 0.0);
        assert!(approx(a.lerp(b, 0.5), Vec3::new(1.0, 0.0, 0.0)));
        assert!(approx(a.lerp(b, 3.0), b));
        assert!(approx(a.lerp(b, -1.0), a));
    }

    #[test]
    fn component_mul_scales_each_axis() {
        let v = Vec3::new(1.0, 2.0, 3.0).component_mul(Vec3::new(0.5, 2.0, 1.0));
        assert!(approx(v, Vec3::new(0.5, 4.0, 3.0)));
    }

    #[test]
    fn from_to_rotation_maps_direction() {
        let from = Vec3::new(0.0, 0.0, 1.0);
        let to = Vec3::new(1.0, 1.0, 0.0);
        let q = Quaternion::from_to_rotation(from, to);
        assert!(approx(q.rotate(from), to.normalized()));
    }

    #[test]
    fn from_to_rotation_handles_antiparallel() {
        let from = Vec3::unit_x();
        let to = Vec3::new(-1.0, 0.0, 0.0);
        let q = Quaternion::from_to_rotation(from, to);
        assert!(approx(q.rotate(from), to));
    }

    #[test]
    fn angle_to_reports_degrees() {
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 90.0);
        assert!((Quaternion::identity().angle_to(q) - 90.0).abs() < 1e-3);
    }

    #[test]
    fn rotate_towards_is_bounded_and_lands_exactly() {
        let target = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 90.0);
        let step = Quaternion::identity().rotate_towards(target, 30.0);
        assert!((Quaternion::identity().angle_to(step) - 30.0).abs() < 1e-2);

        let done = step.rotate_towards(target, 500.0);
        assert_eq!(done, target);
    }

    #[test]
    fn pose_roundtrip() {
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Vec3::one(), Quaternion::identity());
        let json = serde_json::to_string(&pose).unwrap();
        let back: Pose = serde_json::from_str(&json).unwrap();
        assert_eq!(pose, back);
    }
}
