//! Experiment parameters and their start-of-session validation.

use haptic_types::math::Vec3;
use haptic_types::{ConfigError, TargetSpec};
use serde::{Deserialize, Serialize};

/// Compression each target asks for, widest first.
pub const DEFAULT_TARGET_COMPRESSIONS: [f32; 10] = [
    0.68794, 0.66001, 0.62448, 0.57949, 0.54304, 0.49568, 0.45790, 0.42509, 0.39034, 0.34864,
];

/// Height and depth of the target markers.
const TARGET_Y: f32 = 1.0;
const TARGET_Z: f32 = 0.0;

/// Material shown during one block and the deformation it permits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialSetting {
    pub constant: f32,
    pub max_deformation: f32,
}

/// Everything the controller needs to run a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub total_steps: u32,
    pub block_size: u32,
    pub target_count: usize,
    /// One compression per target, non-increasing.
    pub target_compressions: Vec<f32>,
    /// One marker position per target.
    pub target_positions: Vec<Vec3>,
    /// Lateral error at which accuracy reaches zero.
    pub max_lateral_distance: f32,
    /// X coordinate target distances are measured from.
    pub reference_axis_position: f32,
    /// After this step's measurement the object is hidden for the rest of
    /// the session.  `None` keeps it visible throughout.
    pub hide_after_step: Option<u32>,
    /// Alternated block by block, starting with the first.
    pub materials: [MaterialSetting; 2],
    /// Fixed seed for the trial order; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        let reference_axis_position = 3.1;
        Self {
            total_steps: 140,
            block_size: 10,
            target_count: DEFAULT_TARGET_COMPRESSIONS.len(),
            target_compressions: DEFAULT_TARGET_COMPRESSIONS.to_vec(),
            target_positions: default_positions(
                reference_axis_position,
                &DEFAULT_TARGET_COMPRESSIONS,
            ),
            max_lateral_distance: 0.1,
            reference_axis_position,
            hide_after_step: Some(10),
            materials: [
                MaterialSetting {
                    constant: 1.0,
                    max_deformation: 0.6,
                },
                MaterialSetting {
                    constant: 2.0,
                    max_deformation: 0.75,
                },
            ],
            seed: None,
        }
    }
}

/// Place each target where the moving face sits when the object's width is
/// `compression` of a unit rest width anchored at `reference`.
pub fn default_positions(reference: f32, compressions: &[f32]) -> Vec<Vec3> {
    compressions
        .iter()
        .map(|c| Vec3::new(reference + c, TARGET_Y, TARGET_Z))
        .collect()
}

impl ExperimentConfig {
    /// Check every invariant the controller relies on.
    ///
    /// # Errors
    ///
    /// The first violated invariant, as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_steps == 0 {
            return Err(ConfigError::NonPositive {
                field: "experiment.total_steps",
            });
        }
        if self.block_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "experiment.block_size",
            });
        }
        if self.target_count == 0 {
            return Err(ConfigError::NonPositive {
                field: "experiment.target_count",
            });
        }
        if self.target_compressions.len() != self.target_count {
            return Err(ConfigError::CompressionTableLength {
                expected: self.target_count,
                actual: self.target_compressions.len(),
            });
        }
        if self.target_positions.len() != self.target_count {
            return Err(ConfigError::PositionTableLength {
                expected: self.target_count,
                actual: self.target_positions.len(),
            });
        }
        if self.total_steps % self.block_size != 0 {
            return Err(ConfigError::StepsNotMultipleOfBlock {
                total_steps: self.total_steps,
                block_size: self.block_size,
            });
        }
        if self.block_size as usize != self.target_count {
            return Err(ConfigError::BlockSizeMismatch {
                block_size: self.block_size,
                target_count: self.target_count,
            });
        }
        if let Some(index) = self
            .target_compressions
            .windows(2)
            .position(|pair| pair[1] > pair[0])
        {
            return Err(ConfigError::CompressionOrder { index: index + 1 });
        }
        if self.max_lateral_distance.is_nan() || self.max_lateral_distance <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "experiment.max_lateral_distance",
            });
        }
        if let Some(step) = self.hide_after_step
            && !(1..=self.total_steps).contains(&step)
        {
            return Err(ConfigError::HideThresholdOutOfRange {
                step,
                total_steps: self.total_steps,
            });
        }
        Ok(())
    }

    /// The immutable target table.  Only meaningful after
    /// [`validate`][Self::validate] succeeded.
    pub fn targets(&self) -> Vec<TargetSpec> {
        self.target_positions
            .iter()
            .zip(&self.target_compressions)
            .enumerate()
            .map(|(id, (position, compression))| TargetSpec {
                id,
                position: *position,
                target_compression: *compression,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ExperimentConfig::default();
        config.validate().unwrap();
        let targets = config.targets();
        assert_eq!(targets.len(), 10);
        assert_eq!(targets[0].target_compression, 0.68794);
        assert!((targets[9].position.x - (3.1 + 0.34864)).abs() < 1e-5);
    }

    #[test]
    fn short_compression_table_is_rejected() {
        let mut config = ExperimentConfig::default();
        config.target_compressions.pop();
        assert_eq!(
            config.validate(),
            Err(ConfigError::CompressionTableLength {
                expected: 10,
                actual: 9
            })
        );
    }

    #[test]
    fn short_position_table_is_rejected() {
        let mut config = ExperimentConfig::default();
        config.target_positions.truncate(3);
        assert_eq!(
            config.validate(),
            Err(ConfigError::PositionTableLength {
                expected: 10,
                actual: 3
            })
        );
    }

    #[test]
    fn steps_must_fill_whole_blocks() {
        let config = ExperimentConfig {
            total_steps: 145,
            ..ExperimentConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::StepsNotMultipleOfBlock {
                total_steps: 145,
                block_size: 10
            })
        );
    }

    #[test]
    fn block_size_must_match_target_count() {
        let config = ExperimentConfig {
            total_steps: 100,
            block_size: 5,
            ..ExperimentConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BlockSizeMismatch {
                block_size: 5,
                target_count: 10
            })
        );
    }

    #[test]
    fn rising_compression_is_rejected() {
        let mut config = ExperimentConfig::default();
        config.target_compressions.swap(3, 4);
        assert_eq!(
            config.validate(),
            Err(ConfigError::CompressionOrder { index: 4 })
        );
    }

    #[test]
    fn hide_threshold_must_be_a_real_step() {
        for bad in [0, 141] {
            let config = ExperimentConfig {
                hide_after_step: Some(bad),
                ..ExperimentConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::HideThresholdOutOfRange { .. })
            ));
        }
        let config = ExperimentConfig {
            hide_after_step: None,
            ..ExperimentConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let config = ExperimentConfig {
            block_size: 0,
            ..ExperimentConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive {
                field: "experiment.block_size"
            })
        );
    }

    #[test]
    fn partial_toml_overrides_only_given_fields() {
        let config: ExperimentConfig = toml::from_str(
            r#"
            total_steps = 20
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.total_steps, 20);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.block_size, 10);
        config.validate().unwrap();
    }
}
