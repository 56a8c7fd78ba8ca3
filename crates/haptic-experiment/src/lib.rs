//! `haptic-experiment` – trial sequencing and the experiment state machine.
//!
//! # Modules
//!
//! - [`config`] – [`ExperimentConfig`]: session shape, target table,
//!   materials and the hide threshold, validated before anything starts.
//! - [`sequencer`] – [`generate_sequence`]: block-balanced random trial order.
//! - [`clock`] – the [`Clock`] seam with [`SystemClock`] and [`ManualClock`].
//! - [`controller`] – [`ExperimentController`]: one transition per
//!   `advance`, one [`Measurement`][haptic_types::Measurement] per trial.

pub mod clock;
pub mod config;
pub mod controller;
pub mod sequencer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ExperimentConfig, MaterialSetting};
pub use controller::{
    ControllerView, ExperimentController, ExperimentState, SessionState, Trial, accuracy,
};
pub use sequencer::generate_sequence;
