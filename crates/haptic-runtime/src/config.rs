//! Session-wide configuration: one struct per subsystem, gathered in
//! [`SessionConfig`].
//!
//! Every table uses `#[serde(default)]`, so a TOML file only needs the keys
//! it changes:
//!
//! ```toml
//! [sensor]
//! listen_addr = "0.0.0.0:9000"
//!
//! [experiment]
//! total_steps = 60
//! seed = 42
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use haptic_deform::DeformationConfig;
use haptic_experiment::ExperimentConfig;
use haptic_recorder::RecorderConfig;
use haptic_sensor::PressureNormalizer;
use haptic_types::ConfigError;
use serde::{Deserialize, Serialize};

/// Inbound sensor stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub listen_addr: SocketAddr,
    /// Raw value mapped to 0.
    pub min_pressure: f32,
    /// Raw value mapped to 1.
    pub max_pressure: f32,
    /// Samples buffered per monitor before the slowest one starts skipping.
    pub monitor_capacity: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8889)),
            min_pressure: 0.0,
            max_pressure: 1000.0,
            monitor_capacity: 256,
        }
    }
}

impl SensorConfig {
    pub fn normalizer(&self) -> PressureNormalizer {
        PressureNormalizer::new(self.min_pressure, self.max_pressure)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let span = self.max_pressure - self.min_pressure;
        if !span.is_finite() || span <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "sensor.max_pressure - sensor.min_pressure",
            });
        }
        if self.monitor_capacity == 0 {
            return Err(ConfigError::NonPositive {
                field: "sensor.monitor_capacity",
            });
        }
        Ok(())
    }
}

/// Everything fixed for the lifetime of one session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub sensor: SensorConfig,
    pub deformation: DeformationConfig,
    pub experiment: ExperimentConfig,
    pub recorder: RecorderConfig,
}

impl SessionConfig {
    /// Validate every subsystem; the first violation wins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sensor.validate()?;
        self.deformation.validate()?;
        self.experiment.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_rig() {
        let config = SessionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sensor.listen_addr.port(), 8889);
        assert_eq!(config.recorder.telemetry_addr.port(), 8893);
        assert_eq!(config.sensor.normalizer().range(), (0.0, 1000.0));
        assert_eq!(config.experiment.total_steps, 140);
    }

    #[test]
    fn empty_document_is_the_default() {
        let config: SessionConfig = toml::from_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn nested_tables_override_selectively() {
        let config: SessionConfig = toml::from_str(
            r#"
            [sensor]
            listen_addr = "127.0.0.1:9100"
            max_pressure = 4095.0

            [experiment]
            total_steps = 60
            hide_after_step = 30

            [deformation]
            smooth_speed = 25.0
            "#,
        )
        .unwrap();
        assert_eq!(config.sensor.listen_addr.port(), 9100);
        assert_eq!(config.sensor.min_pressure, 0.0);
        assert_eq!(config.sensor.max_pressure, 4095.0);
        assert_eq!(config.experiment.total_steps, 60);
        assert_eq!(config.experiment.hide_after_step, Some(30));
        assert_eq!(config.deformation.smooth_speed, 25.0);
        config.validate().unwrap();
    }

    #[test]
    fn inverted_pressure_range_is_rejected() {
        let mut config = SessionConfig::default();
        config.sensor.min_pressure = 1000.0;
        config.sensor.max_pressure = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { .. })
        ));
    }

    #[test]
    fn serialises_back_to_toml() {
        let config = SessionConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: SessionConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
