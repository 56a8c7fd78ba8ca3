//! [`ExperimentController`] – the trial state machine.
//!
//! Driven entirely by [`advance`][ExperimentController::advance]: each call
//! performs exactly one transition.
//!
//! ```text
//! Welcome ─▶ DevicePress ─▶ TrialActive ─┬─▶ TrialActive (next trial)
//!                               ▲        ├─▶ NonVisualTransition ─┐
//!                               └────────┼────────────────────────┘
//!                                        └─▶ Complete
//! ```
//!
//! Leaving `TrialActive` captures one [`Measurement`] and hands it to the
//! [`MeasurementSink`].  The transition only happens once the sink accepted
//! the measurement; a sink error leaves the controller where it was.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use haptic_deform::DeformationModel;
use haptic_types::{
    ConfigError, HapticError, Measurement, MeasurementSink, PressureReading, TargetSpec,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{ExperimentConfig, MaterialSetting};
use crate::sequencer::generate_sequence;

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperimentState {
    Welcome,
    DevicePress,
    TrialActive,
    NonVisualTransition,
    Complete,
}

impl fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Welcome => "welcome",
            Self::DevicePress => "device-press",
            Self::TrialActive => "trial-active",
            Self::NonVisualTransition => "non-visual-transition",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// The trial currently in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    /// 1-based step number.
    pub index: u32,
    /// 0-based block number.
    pub block_index: u32,
    pub target_id: usize,
    pub target_distance: f32,
    pub started_at: Duration,
}

/// Mutable bookkeeping of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub state: ExperimentState,
    pub current_step: u32,
    pub material_constant: f32,
    pub hidden_after_threshold: bool,
    pub non_visual_timer_start: Option<Duration>,
}

/// Read-only snapshot for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerView {
    pub state: ExperimentState,
    pub step: u32,
    pub total_steps: u32,
    /// Target to display, only while a trial is active.
    pub target: Option<TargetSpec>,
    /// Whether the object and finger proxies are drawn.
    pub object_visible: bool,
    pub material_constant: f32,
}

/// Accuracy in percent: 100 at zero distance, falling linearly to 0 at
/// `max_distance` and beyond.
pub fn accuracy(distance: f32, max_distance: f32) -> f32 {
    let ratio = (distance / max_distance).clamp(0.0, 1.0);
    (100.0 * (1.0 - ratio)).max(0.0)
}

// ────────────────────────────────────────────────────────────────────────────
// ExperimentController
// ────────────────────────────────────────────────────────────────────────────

pub struct ExperimentController {
    config: ExperimentConfig,
    targets: Vec<TargetSpec>,
    sequence: Vec<usize>,
    clock: Arc<dyn Clock>,
    session_started: Duration,
    session: SessionState,
    trial: Option<Trial>,
}

impl fmt::Debug for ExperimentController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentController")
            .field("session", &self.session)
            .field("trial", &self.trial)
            .finish_non_exhaustive()
    }
}

impl ExperimentController {
    /// Validate `config` and prepare a session in `Welcome`.
    ///
    /// The trial order comes from `config.seed` when set, otherwise from OS
    /// entropy.
    ///
    /// # Errors
    ///
    /// The first violated configuration invariant; nothing is constructed.
    pub fn new(config: ExperimentConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(config, clock, &mut rng)
    }

    /// As [`new`][Self::new] with an explicit random source.
    pub fn with_rng<R: Rng + ?Sized>(
        config: ExperimentConfig,
        clock: Arc<dyn Clock>,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let sequence = generate_sequence(
            config.total_steps,
            config.block_size,
            config.target_count,
            rng,
        )?;
        let targets = config.targets();
        let session_started = clock.now();
        // The first block boundary toggles to materials[0].
        let material_constant = config.materials[1].constant;
        info!(
            total_steps = config.total_steps,
            block_size = config.block_size,
            hide_after_step = ?config.hide_after_step,
            "experiment prepared"
        );
        Ok(Self {
            config,
            targets,
            sequence,
            clock,
            session_started,
            session: SessionState {
                state: ExperimentState::Welcome,
                current_step: 0,
                material_constant,
                hidden_after_threshold: false,
                non_visual_timer_start: None,
            },
            trial: None,
        })
    }

    /// Perform one transition and return the new state.
    ///
    /// `deformation` is read for the measurement and receives the material's
    /// deformation limit at block boundaries.  `reading` is the latest sensor
    /// value.
    ///
    /// # Errors
    ///
    /// Whatever `sink` returns when a measurement cannot be stored; the state
    /// is unchanged in that case.
    pub fn advance(
        &mut self,
        deformation: &mut DeformationModel,
        reading: PressureReading,
        sink: &mut dyn MeasurementSink,
    ) -> Result<ExperimentState, HapticError> {
        match self.session.state {
            ExperimentState::Welcome => self.set_state(ExperimentState::DevicePress),
            ExperimentState::DevicePress => self.start_trial(deformation),
            ExperimentState::TrialActive => {
                let Some(trial) = self.trial else {
                    // Only start_trial enters TrialActive, and it always sets a trial.
                    warn!("trial state without an active trial; starting the next one");
                    self.start_trial(deformation);
                    return Ok(self.session.state);
                };
                let measurement = self.capture(&trial, deformation, reading);
                sink.record(&measurement)?;
                let step = self.session.current_step;
                self.trial = None;
                let threshold_reached = self.config.hide_after_step == Some(step);
                if threshold_reached {
                    self.session.hidden_after_threshold = true;
                    info!(step, "hide threshold reached; object hidden");
                }
                if step >= self.config.total_steps {
                    self.set_state(ExperimentState::Complete);
                    info!(steps = step, "experiment complete");
                } else if threshold_reached {
                    self.set_state(ExperimentState::NonVisualTransition);
                } else {
                    self.start_trial(deformation);
                }
            }
            ExperimentState::NonVisualTransition => {
                self.session.non_visual_timer_start = Some(self.clock.now());
                self.start_trial(deformation);
            }
            ExperimentState::Complete => debug!("advance ignored; experiment complete"),
        }
        Ok(self.session.state)
    }

    fn set_state(&mut self, next: ExperimentState) {
        debug!(from = %self.session.state, to = %next, "state change");
        self.session.state = next;
    }

    fn start_trial(&mut self, deformation: &mut DeformationModel) {
        self.session.current_step += 1;
        let step = self.session.current_step;
        if step > self.config.total_steps {
            self.session.current_step = self.config.total_steps;
            self.set_state(ExperimentState::Complete);
            return;
        }

        let block_size = self.config.block_size;
        let block_index = (step - 1) / block_size;
        if (step - 1) % block_size == 0 {
            let material = self.material_for_block(block_index);
            self.session.material_constant = material.constant;
            deformation.set_max_deformation(material.max_deformation);
            info!(
                block = block_index + 1,
                material_constant = material.constant,
                max_deformation = deformation.max_deformation(),
                "block started"
            );
        }

        let target_id = self.sequence[(step - 1) as usize];
        let target = self.targets[target_id];
        let target_distance = (self.config.reference_axis_position - target.position.x).abs();
        self.trial = Some(Trial {
            index: step,
            block_index,
            target_id,
            target_distance,
            started_at: self.clock.now(),
        });
        debug!(step, target_id, target_distance, "trial started");
        self.set_state(ExperimentState::TrialActive);
    }

    fn material_for_block(&self, block_index: u32) -> MaterialSetting {
        self.config.materials[(block_index % 2) as usize]
    }

    fn capture(
        &self,
        trial: &Trial,
        deformation: &DeformationModel,
        reading: PressureReading,
    ) -> Measurement {
        let target = self.targets[trial.target_id];

        let raw_pressure = reading.raw();
        if raw_pressure.is_none() {
            warn!(step = trial.index, "no sensor data yet; pressure logged as empty");
        }

        let cube_point = deformation.contact_point();
        let lateral_distance = (cube_point.x - target.position.x).abs();
        let actual_scale_x = deformation.current_scale().x;

        Measurement {
            step: trial.index,
            raw_pressure,
            wall_time: self.clock.seconds_since(self.session_started),
            step_elapsed: self.clock.seconds_since(trial.started_at),
            lateral_distance,
            accuracy_pct: accuracy(lateral_distance, self.config.max_lateral_distance),
            cube_point,
            target_point: target.position,
            material_constant: self.session.material_constant,
            target_distance: trial.target_distance,
            actual_scale_x,
            target_compression: target.target_compression,
            compression_error: (target.target_compression - actual_scale_x).abs(),
            non_visual_elapsed: self
                .session
                .non_visual_timer_start
                .map(|start| self.clock.seconds_since(start))
                .unwrap_or(0.0),
        }
    }

    /// Current state of the session.
    pub fn state(&self) -> ExperimentState {
        self.session.state
    }

    /// Step counter, material and non-visual bookkeeping.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// The trial awaiting capture, if one is active.
    pub fn current_trial(&self) -> Option<&Trial> {
        self.trial.as_ref()
    }

    /// Target id of every step, fixed at construction.
    pub fn sequence(&self) -> &[usize] {
        &self.sequence
    }

    /// The validated configuration this controller runs.
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Snapshot for the presentation layer.
    pub fn view(&self) -> ControllerView {
        ControllerView {
            state: self.session.state,
            step: self.session.current_step,
            total_steps: self.config.total_steps,
            target: self.trial.map(|t| self.targets[t.target_id]),
            object_visible: !self.session.hidden_after_threshold,
            material_constant: self.session.material_constant,
        }
    }
}
