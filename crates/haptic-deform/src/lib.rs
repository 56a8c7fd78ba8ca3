//! `haptic-deform` – visual response of the squeezable object.
//!
//! Turns a normalised pressure stream into a smoothed, anchored squash of the
//! object and the poses of the two finger proxies holding it.
//!
//! # Modules
//!
//! - [`smoothing`] – [`smooth_damp`][smoothing::smooth_damp] (critically
//!   damped, no overshoot) and the frame-rate independent lerp weight.
//! - [`finger`] – [`FingerModel`]: rate-limited finger rotation toward a
//!   pressure-dependent goal.
//! - [`model`] – [`DeformationModel`] and its [`DeformationConfig`].

pub mod finger;
pub mod model;
pub mod smoothing;

pub use finger::{FingerConfig, FingerModel, FingerPose};
pub use model::{DeformationConfig, DeformationModel, FramePose, MAX_DEFORMATION_RANGE};
pub use smoothing::{PressureSmoother, lerp_factor, smooth_damp};
