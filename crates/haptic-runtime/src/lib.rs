//! `haptic-runtime` – wires the subsystems into one session.
//!
//! # Modules
//!
//! - [`config`] – [`SessionConfig`]: sensor, deformation, experiment and
//!   recorder tables, validated together before anything is opened.
//! - [`session`] – [`Session`]: explicit `init` / `tick` / `advance` /
//!   `shutdown` lifecycle around [`SensorLink`][haptic_sensor::SensorLink],
//!   [`DeformationModel`][haptic_deform::DeformationModel],
//!   [`ExperimentController`][haptic_experiment::ExperimentController] and
//!   [`DataRecorder`][haptic_recorder::DataRecorder].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber, compact or JSON.
//!
//! # Threading
//!
//! The sensor receive loop is the only code running off the frame loop's
//! thread.  It shares exactly one value with it, the latest pressure pair,
//! through a lock-free cell.  Everything else is owned by [`Session`] and
//! touched only by its caller.

pub mod config;
pub mod session;
pub mod telemetry;

pub use config::{SensorConfig, SessionConfig};
pub use session::{Session, SessionLog};
