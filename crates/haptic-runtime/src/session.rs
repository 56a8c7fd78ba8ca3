//! [`Session`] – one run of the rig, from socket bind to final log row.
//!
//! A session owns every subsystem and exposes the three calls the frame loop
//! needs:
//!
//! - [`tick`][Session::tick] once per rendered frame,
//! - [`advance`][Session::advance] when the operator or subject confirms,
//! - [`shutdown`][Session::shutdown] at teardown.
//!
//! Initialisation is all-or-nothing: configuration is validated before any
//! socket or file exists, and a failure later in [`Session::init`] releases
//! what was already acquired.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use haptic_deform::{DeformationModel, FramePose};
use haptic_experiment::{
    Clock, ControllerView, ExperimentController, ExperimentState, SystemClock,
};
use haptic_recorder::{DataRecorder, RecorderConfig};
use haptic_sensor::{
    LinkStatus, PressureChannel, SampleBus, SampleReceiver, SampleSubscriber, SensorLink,
};
use haptic_types::{HapticError, Measurement, MeasurementSink, PressureReading};
use tracing::{error, info, warn};

use crate::config::SessionConfig;

/// Measurement store of a session: a [`MeasurementSink`] that can also
/// report where it writes and how much it has written.
pub trait SessionLog: MeasurementSink + Send {
    fn path(&self) -> &Path;
    fn rows_written(&self) -> u64;
    fn sends_failed(&self) -> u64;
}

impl SessionLog for DataRecorder {
    fn path(&self) -> &Path {
        DataRecorder::path(self)
    }

    fn rows_written(&self) -> u64 {
        DataRecorder::rows_written(self)
    }

    fn sends_failed(&self) -> u64 {
        DataRecorder::sends_failed(self)
    }
}

impl MeasurementSink for Box<dyn SessionLog> {
    fn record(&mut self, measurement: &Measurement) -> Result<(), HapticError> {
        (**self).record(measurement)
    }
}

pub struct Session {
    link: SensorLink,
    channel: Arc<PressureChannel>,
    bus: SampleBus,
    deformation: DeformationModel,
    controller: ExperimentController,
    recorder: Box<dyn SessionLog>,
    aborted: bool,
}

impl Session {
    /// Start a session on the system clock.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`HapticError::Configuration`] for an invalid configuration,
    /// [`HapticError::Bind`] when the sensor port is taken, and
    /// [`HapticError::Io`] when the session log cannot be created.
    pub async fn init(config: SessionConfig) -> Result<Self, HapticError> {
        Self::init_with_clock(config, Arc::new(SystemClock::new())).await
    }

    /// As [`init`][Self::init] with an explicit experiment clock.
    pub async fn init_with_clock(
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, HapticError> {
        Self::assemble(config, clock, |recorder| {
            let log = DataRecorder::create(recorder, &Local::now())?;
            Ok(Box::new(log) as Box<dyn SessionLog>)
        })
        .await
    }

    /// Build a session around the log produced by `open_log`, which runs
    /// only once the sensor socket is bound.
    async fn assemble<F>(
        config: SessionConfig,
        clock: Arc<dyn Clock>,
        open_log: F,
    ) -> Result<Self, HapticError>
    where
        F: FnOnce(&RecorderConfig) -> Result<Box<dyn SessionLog>, HapticError>,
    {
        config.validate()?;
        let controller = ExperimentController::new(config.experiment.clone(), clock)?;
        let deformation = DeformationModel::new(&config.deformation);

        let channel = Arc::new(PressureChannel::new(config.sensor.normalizer()));
        let bus = SampleBus::new(config.sensor.monitor_capacity);
        let subscribers = vec![
            Arc::clone(&channel) as Arc<dyn SampleSubscriber>,
            Arc::new(bus.clone()) as Arc<dyn SampleSubscriber>,
        ];
        let mut link = SensorLink::open(config.sensor.listen_addr, subscribers).await?;

        let recorder = match open_log(&config.recorder) {
            Ok(recorder) => recorder,
            Err(e) => {
                link.close().await;
                return Err(e);
            }
        };

        info!(
            sensor = %link.local_addr(),
            log = %recorder.path().display(),
            total_steps = config.experiment.total_steps,
            "session initialised"
        );
        Ok(Self {
            link,
            channel,
            bus,
            deformation,
            controller,
            recorder,
            aborted: false,
        })
    }

    /// Advance the deformation by one frame using the latest sensor value.
    pub fn tick(&mut self, dt: f32) -> FramePose {
        let pressure = self.channel.latest().normalized_or_rest();
        self.deformation.tick(pressure, dt)
    }

    /// Perform one experiment transition.
    ///
    /// # Errors
    ///
    /// A storage failure aborts the session: it is returned once, and every
    /// later call returns [`HapticError::SessionAborted`].
    pub fn advance(&mut self) -> Result<ExperimentState, HapticError> {
        if self.aborted {
            return Err(HapticError::SessionAborted);
        }
        let reading = self.channel.latest();
        match self
            .controller
            .advance(&mut self.deformation, reading, &mut self.recorder)
        {
            Ok(state) => Ok(state),
            Err(e) => {
                if e.is_fatal() {
                    self.aborted = true;
                    error!(
                        error = %e,
                        step = self.controller.session().current_step,
                        "session aborted"
                    );
                } else {
                    warn!(error = %e, "advance failed");
                }
                Err(e)
            }
        }
    }

    /// Current experiment state.
    pub fn state(&self) -> ExperimentState {
        self.controller.state()
    }

    /// What the presentation layer should show right now.
    pub fn view(&self) -> ControllerView {
        self.controller.view()
    }

    /// Pose of the most recent frame, without advancing.
    pub fn frame(&self) -> FramePose {
        self.deformation.frame()
    }

    /// `1 - current width / rest width` of the object.
    pub fn compression_amount(&self) -> f32 {
        self.deformation.compression_amount()
    }

    /// Latest sensor value, or [`PressureReading::NoData`] before the first
    /// valid datagram.
    pub fn latest_reading(&self) -> PressureReading {
        self.channel.latest()
    }

    /// Datagram counters and the last message seen by the sensor link.
    pub fn sensor_status(&self) -> LinkStatus {
        self.link.status()
    }

    /// Address the sensor socket is bound to.
    pub fn sensor_addr(&self) -> SocketAddr {
        self.link.local_addr()
    }

    /// Receive every raw sample from now on.
    pub fn monitor(&self) -> SampleReceiver {
        self.bus.subscribe()
    }

    /// Location of the session log.
    pub fn log_path(&self) -> &Path {
        self.recorder.path()
    }

    /// Measurement rows stored so far.
    pub fn rows_written(&self) -> u64 {
        self.recorder.rows_written()
    }

    /// Whether a fatal error has stopped the session.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Close the sensor link.  The log is already durable row by row.
    /// Idempotent.
    pub async fn shutdown(&mut self) {
        if self.link.is_closed() {
            return;
        }
        self.link.close().await;
        info!(
            state = %self.controller.state(),
            rows = self.recorder.rows_written(),
            telemetry_failures = self.recorder.sends_failed(),
            log = %self.recorder.path().display(),
            "session shut down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haptic_experiment::ManualClock;
    use std::path::PathBuf;

    /// Log whose storage is gone: every append fails.
    struct UnwritableLog {
        path: PathBuf,
        attempts: u32,
    }

    impl MeasurementSink for UnwritableLog {
        fn record(&mut self, _measurement: &Measurement) -> Result<(), HapticError> {
            self.attempts += 1;
            Err(HapticError::Io {
                context: format!("appending to {}", self.path.display()),
                source: std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"),
            })
        }
    }

    impl SessionLog for UnwritableLog {
        fn path(&self) -> &Path {
            &self.path
        }

        fn rows_written(&self) -> u64 {
            0
        }

        fn sends_failed(&self) -> u64 {
            0
        }
    }

    fn loopback_config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.sensor.listen_addr = "127.0.0.1:0".parse().unwrap();
        config.experiment.seed = Some(5);
        config
    }

    async fn session_with_unwritable_log() -> Session {
        Session::assemble(loopback_config(), Arc::new(ManualClock::new()), |_| {
            Ok(Box::new(UnwritableLog {
                path: PathBuf::from("unwritable.csv"),
                attempts: 0,
            }) as Box<dyn SessionLog>)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn failed_append_aborts_session() {
        let mut session = session_with_unwritable_log().await;
        assert_eq!(session.advance().unwrap(), ExperimentState::DevicePress);
        assert_eq!(session.advance().unwrap(), ExperimentState::TrialActive);

        let err = session.advance().unwrap_err();
        assert!(matches!(err, HapticError::Io { .. }));
        assert!(session.is_aborted());
        assert_eq!(session.state(), ExperimentState::TrialActive);
        assert_eq!(session.view().step, 1);

        let err = session.advance().unwrap_err();
        assert!(matches!(err, HapticError::SessionAborted));
        assert_eq!(session.state(), ExperimentState::TrialActive);
        assert_eq!(session.rows_written(), 0);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn log_failure_at_init_releases_socket() {
        let mut config = loopback_config();
        let placeholder = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = placeholder.local_addr().unwrap();
        drop(placeholder);
        config.sensor.listen_addr = addr;

        let result = Session::assemble(config, Arc::new(ManualClock::new()), |_| {
            Err(HapticError::Io {
                context: "creating session log".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        })
        .await;
        assert!(matches!(result, Err(HapticError::Io { .. })));

        // The port is free again.
        let rebound = std::net::UdpSocket::bind(addr);
        assert!(rebound.is_ok());
    }
}
