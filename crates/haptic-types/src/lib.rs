//! `haptic-types` – shared vocabulary of the pressure rig.
//!
//! Every crate in the workspace speaks in these types: raw sensor samples,
//! the target table, per-trial measurements and the spanning error type.
//!
//! # Modules
//!
//! - [`math`] – [`Vec3`][math::Vec3], [`Quaternion`][math::Quaternion] and
//!   [`Pose`][math::Pose] used by the deformation model.

pub mod math;

use std::fmt::Write as _;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::Vec3;

/// One pressure reading as it arrived on the wire, before normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub raw_pressure: f32,
    pub received_at: DateTime<Utc>,
}

impl RawSample {
    /// Stamp `raw_pressure` with the current wall-clock time.
    pub fn now(raw_pressure: f32) -> Self {
        Self {
            raw_pressure,
            received_at: Utc::now(),
        }
    }
}

/// Latest pressure state as seen by the frame loop.
///
/// `NoData` is distinct from a zero reading: the sensor has not delivered a
/// single valid packet yet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PressureReading {
    #[default]
    NoData,
    Sample {
        /// Value exactly as received, logged in measurements.
        raw: f32,
        /// Normalised value in `[0, 1]`, drives deformation.
        normalized: f32,
    },
}

impl PressureReading {
    pub fn raw(&self) -> Option<f32> {
        match self {
            Self::NoData => None,
            Self::Sample { raw, .. } => Some(*raw),
        }
    }

    /// Normalised pressure, treating "no data yet" as an unpressed sensor.
    pub fn normalized_or_rest(&self) -> f32 {
        match self {
            Self::NoData => 0.0,
            Self::Sample { normalized, .. } => *normalized,
        }
    }
}

/// One selectable target: where it sits and how far the object must be
/// compressed to hit it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub id: usize,
    pub position: Vec3,
    pub target_compression: f32,
}

/// Column names of a measurement row, in wire and log order.
pub const MEASUREMENT_HEADER: &str = "Step,RawPressure,WallTime,StepTime,Distance,Accuracy,\
CubePointX,CubePointY,CubePointZ,TargetX,TargetY,TargetZ,MaterialConstant,TargetDistance,\
ScaleX,TargetCompression,CompressionError,NonVisualTime";

/// Everything captured for one trial.  Written exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// 1-based trial index.
    pub step: u32,
    /// `None` when the sensor had not produced a reading yet.
    pub raw_pressure: Option<f32>,
    /// Seconds since the session started.
    pub wall_time: f64,
    /// Seconds since this trial started.
    pub step_elapsed: f64,
    pub lateral_distance: f32,
    pub accuracy_pct: f32,
    pub cube_point: Vec3,
    pub target_point: Vec3,
    pub material_constant: f32,
    pub target_distance: f32,
    pub actual_scale_x: f32,
    pub target_compression: f32,
    pub compression_error: f32,
    /// Seconds since the non-visual phase began, `0` before it.
    pub non_visual_elapsed: f64,
}

impl Measurement {
    /// Render as one comma-separated row (no trailing newline) matching
    /// [`MEASUREMENT_HEADER`].  A missing pressure is an empty field.
    pub fn to_row(&self) -> String {
        let mut row = String::with_capacity(192);
        let raw = self
            .raw_pressure
            .map(|p| p.to_string())
            .unwrap_or_default();
        // Writing into a String cannot fail.
        let _ = write!(
            row,
            "{},{},{:.4},{:.4},{:.4},{:.2},{},{},{},{},{},{},{},{:.4},{},{:.5},{:.5},{:.4}",
            self.step,
            raw,
            self.wall_time,
            self.step_elapsed,
            self.lateral_distance,
            self.accuracy_pct,
            self.cube_point.x,
            self.cube_point.y,
            self.cube_point.z,
            self.target_point.x,
            self.target_point.y,
            self.target_point.z,
            self.material_constant,
            self.target_distance,
            self.actual_scale_x,
            self.target_compression,
            self.compression_error,
            self.non_visual_elapsed,
        );
        row
    }
}

/// Destination for captured measurements.
///
/// The controller hands every measurement to a sink exactly once; an `Err`
/// means the measurement was not durably stored and the session must stop.
pub trait MeasurementSink {
    fn record(&mut self, measurement: &Measurement) -> Result<(), HapticError>;
}

/// A violated configuration invariant.  Always detected before a session
/// starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("target table has {actual} compression entries but target_count is {expected}")]
    CompressionTableLength { expected: usize, actual: usize },

    #[error("target table has {actual} positions but target_count is {expected}")]
    PositionTableLength { expected: usize, actual: usize },

    #[error("total_steps {total_steps} is not a multiple of block_size {block_size}")]
    StepsNotMultipleOfBlock { total_steps: u32, block_size: u32 },

    #[error("block_size {block_size} must equal target_count {target_count}")]
    BlockSizeMismatch { block_size: u32, target_count: usize },

    #[error("target compressions must be non-increasing (entry {index} rises)")]
    CompressionOrder { index: usize },

    #[error("{field} must be positive")]
    NonPositive { field: &'static str },

    #[error("{field} must lie in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        min: f32,
        max: f32,
    },

    #[error("hide_after_step {step} must lie in 1..={total_steps}")]
    HideThresholdOutOfRange { step: u32, total_steps: u32 },
}

/// Global error type spanning configuration, ingestion, storage and
/// telemetry failures.
#[derive(Error, Debug)]
pub enum HapticError {
    #[error("Configuration Error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Parse Error: {0}")]
    Parse(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O Error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Telemetry send failed: {0}")]
    NetworkSend(String),

    #[error("Session aborted after a fatal error")]
    SessionAborted,
}

impl HapticError {
    /// Whether the session must stop after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Parse(_) | Self::NetworkSend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_measurement() -> Measurement {
        Measurement {
            step: 3,
            raw_pressure: Some(512.5),
            wall_time: 12.0,
            step_elapsed: 1.5,
            lateral_distance: 0.05,
            accuracy_pct: 50.0,
            cube_point: Vec3::new(1.0, 0.0, 0.0),
            target_point: Vec3::new(1.05, 0.0, 0.0),
            material_constant: 1.0,
            target_distance: 2.05,
            actual_scale_x: 0.7,
            target_compression: 0.68794,
            compression_error: 0.01206,
            non_visual_elapsed: 0.0,
        }
    }

    #[test]
    fn row_matches_header_width() {
        let row = sample_measurement().to_row();
        assert_eq!(
            row.split(',').count(),
            MEASUREMENT_HEADER.split(',').count()
        );
        assert!(row.starts_with("3,512.5,12.0000,1.5000,0.0500,50.00,"));
        assert!(row.ends_with(",0.68794,0.01206,0.0000"));
    }

    #[test]
    fn missing_pressure_is_empty_field() {
        let mut m = sample_measurement();
        m.raw_pressure = None;
        assert!(m.to_row().starts_with("3,,"));
    }

    #[test]
    fn pressure_reading_defaults_to_no_data() {
        let reading = PressureReading::default();
        assert_eq!(reading.raw(), None);
        assert_eq!(reading.normalized_or_rest(), 0.0);

        let sample = PressureReading::Sample {
            raw: 250.0,
            normalized: 0.25,
        };
        assert_eq!(sample.raw(), Some(250.0));
        assert_eq!(sample.normalized_or_rest(), 0.25);
    }

    #[test]
    fn measurement_roundtrip() {
        let m = sample_measurement();
        let json = serde_json::to_string(&m).unwrap();
        let back: Measurement = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn error_display_and_fatality() {
        let err: HapticError = ConfigError::CompressionTableLength {
            expected: 10,
            actual: 9,
        }
        .into();
        assert!(err.to_string().contains("Configuration Error"));
        assert!(err.is_fatal());

        assert!(!HapticError::Parse("PRESSURE:abc".into()).is_fatal());
        assert!(!HapticError::NetworkSend("refused".into()).is_fatal());
    }
}
