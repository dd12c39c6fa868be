//! Channel configuration: which propagation and noise models a channel uses.
//!
//! Loaded from a TOML file next to the scene (`channel.toml`). Every key is
//! optional; a missing file or section selects the "ideal" propagation model
//! and the "default" noise model.
//!
//! ```toml
//! [propagation]
//! model = "thorp"
//! sound-speed = 1500.0
//! spreading-coefficient = 1.5
//!
//! [noise]
//! model = "default"
//! wind = 1.0
//! shipping = 0.0
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ChannelError, Result};
use crate::simulation::noise::{ConstantNoiseModel, DEFAULT_CONSTANT_NOISE_DB_HZ, DefaultNoiseModel, NoiseModel};
use crate::simulation::propagation::{
    DEFAULT_SOUND_SPEED, DEFAULT_SPREADING_COEFFICIENT, IdealPropagationModel, LogDistancePropagationModel, PropagationModel, ThorpPropagationModel,
};
use crate::simulation::signal_calculations::PathLossParameters;

/// File name looked up beside the scene file.
pub const CHANNEL_CONFIG_FILE: &str = "channel.toml";

/// Propagation model selection and parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum PropagationConfig {
    #[serde(rename_all = "kebab-case")]
    Ideal {
        #[serde(default = "default_sound_speed")]
        sound_speed: f64,
    },
    #[serde(rename_all = "kebab-case")]
    Thorp {
        #[serde(default = "default_sound_speed")]
        sound_speed: f64,
        #[serde(default = "default_spreading_coefficient")]
        spreading_coefficient: f64,
    },
    #[serde(rename_all = "kebab-case")]
    LogDistance {
        #[serde(default = "default_sound_speed")]
        propagation_speed: f64,
        #[serde(flatten)]
        path_loss: PathLossParameters,
    },
}

impl Default for PropagationConfig {
    fn default() -> Self {
        PropagationConfig::Ideal {
            sound_speed: DEFAULT_SOUND_SPEED,
        }
    }
}

/// Noise model selection and parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum NoiseConfig {
    #[serde(rename_all = "kebab-case")]
    Default {
        #[serde(default = "default_wind")]
        wind: f64,
        #[serde(default)]
        shipping: f64,
    },
    #[serde(rename_all = "kebab-case")]
    Constant {
        #[serde(default = "default_constant_level")]
        level_db_hz: f64,
    },
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig::Default { wind: 1.0, shipping: 0.0 }
    }
}

fn default_sound_speed() -> f64 {
    DEFAULT_SOUND_SPEED
}

fn default_spreading_coefficient() -> f64 {
    DEFAULT_SPREADING_COEFFICIENT
}

fn default_wind() -> f64 {
    1.0
}

fn default_constant_level() -> f64 {
    DEFAULT_CONSTANT_NOISE_DB_HZ
}

/// Named options of a channel, set before the first transmission.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChannelConfig {
    #[serde(default)]
    pub propagation: PropagationConfig,
    #[serde(default)]
    pub noise: NoiseConfig,
}

impl ChannelConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ChannelError::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from a TOML file.
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| ChannelError::Configuration(format!("Failed to read config file {}: {}", config_path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load the configuration if the file exists, defaults otherwise.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            log::info!("No channel config at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Derive the config path from a scene file path.
    ///
    /// Replaces the scene filename with `channel.toml` in the same directory.
    pub fn config_path_from_scene(scene_path: &str) -> PathBuf {
        let scene = Path::new(scene_path);
        scene.parent().unwrap_or(Path::new(".")).join(CHANNEL_CONFIG_FILE)
    }

    pub fn build_propagation_model(&self) -> Result<Arc<dyn PropagationModel>> {
        match &self.propagation {
            PropagationConfig::Ideal { sound_speed } => {
                require_positive("sound-speed", *sound_speed)?;
                Ok(Arc::new(IdealPropagationModel::new(*sound_speed)))
            }
            PropagationConfig::Thorp {
                sound_speed,
                spreading_coefficient,
            } => {
                require_positive("sound-speed", *sound_speed)?;
                require_positive("spreading-coefficient", *spreading_coefficient)?;
                Ok(Arc::new(ThorpPropagationModel::new(*sound_speed, *spreading_coefficient)))
            }
            PropagationConfig::LogDistance {
                propagation_speed,
                path_loss,
            } => {
                require_positive("propagation-speed", *propagation_speed)?;
                require_positive("path-loss-exponent", path_loss.path_loss_exponent)?;
                if !(path_loss.shadowing_sigma >= 0.0) {
                    return Err(ChannelError::Configuration("shadowing-sigma must be non-negative".to_string()));
                }
                if !path_loss.path_loss_at_reference_distance.is_finite() {
                    return Err(ChannelError::Configuration("path-loss-at-reference-distance must be finite".to_string()));
                }
                Ok(Arc::new(LogDistancePropagationModel::new(path_loss.clone(), *propagation_speed)))
            }
        }
    }

    pub fn build_noise_model(&self) -> Result<Arc<dyn NoiseModel>> {
        match &self.noise {
            NoiseConfig::Default { wind, shipping } => {
                if !(*wind >= 0.0) {
                    return Err(ChannelError::Configuration("wind must be non-negative".to_string()));
                }
                if !(0.0..=1.0).contains(shipping) {
                    return Err(ChannelError::Configuration(format!("shipping {} outside [0, 1]", shipping)));
                }
                Ok(Arc::new(DefaultNoiseModel::new(*wind, *shipping)))
            }
            NoiseConfig::Constant { level_db_hz } => {
                if !level_db_hz.is_finite() {
                    return Err(ChannelError::Configuration("level-db-hz must be finite".to_string()));
                }
                Ok(Arc::new(ConstantNoiseModel::new(*level_db_hz)))
            }
        }
    }
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ChannelError::Configuration(format!("{} must be positive, got {}", name, value)))
    }
}

/// Propagation model with default parameters, selected by name.
pub fn propagation_model_by_name(name: &str) -> Result<Arc<dyn PropagationModel>> {
    match name {
        "ideal" => Ok(Arc::new(IdealPropagationModel::default())),
        "thorp" => Ok(Arc::new(ThorpPropagationModel::default())),
        "log-distance" => Ok(Arc::new(LogDistancePropagationModel::default())),
        other => Err(ChannelError::Configuration(format!("unknown propagation model '{}'", other))),
    }
}

/// Noise model with default parameters, selected by name.
///
/// "constant" yields a flat floor at [`DEFAULT_CONSTANT_NOISE_DB_HZ`]; use
/// [`ChannelConfig`] to pick another level.
pub fn noise_model_by_name(name: &str) -> Result<Arc<dyn NoiseModel>> {
    match name {
        "default" => Ok(Arc::new(DefaultNoiseModel::default())),
        "constant" => Ok(Arc::new(ConstantNoiseModel::default())),
        other => Err(ChannelError::Configuration(format!("unknown noise model '{}'", other))),
    }
}
