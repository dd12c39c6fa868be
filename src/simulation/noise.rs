//! Ambient noise models queried through the channel.

use std::fmt::Debug;

use super::signal_calculations::wenz_noise_db_hz;

/// Capability interface returning the noise power spectral density at a frequency.
pub trait NoiseModel: Debug + Send + Sync {
    /// Name the model is selected by in configuration.
    fn name(&self) -> &'static str;

    /// Noise PSD in dB/Hz at `f_khz`.
    fn noise_db_hz(&self, f_khz: f64) -> f64;
}

/// Wenz-curve ambient noise driven by wind speed and shipping activity.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultNoiseModel {
    /// Wind speed in m/s.
    wind: f64,
    /// Shipping activity in `[0, 1]`.
    shipping: f64,
}

impl DefaultNoiseModel {
    pub fn new(wind: f64, shipping: f64) -> Self {
        Self { wind, shipping }
    }
}

impl Default for DefaultNoiseModel {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl NoiseModel for DefaultNoiseModel {
    fn name(&self) -> &'static str {
        "default"
    }

    fn noise_db_hz(&self, f_khz: f64) -> f64 {
        wenz_noise_db_hz(f_khz, self.wind, self.shipping)
    }
}

/// Level of a [`ConstantNoiseModel`] built without parameters (dB re 1 µPa per Hz).
pub const DEFAULT_CONSTANT_NOISE_DB_HZ: f64 = 50.0;

/// Frequency-independent noise floor.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantNoiseModel {
    level_db_hz: f64,
}

impl ConstantNoiseModel {
    pub fn new(level_db_hz: f64) -> Self {
        Self { level_db_hz }
    }
}

impl Default for ConstantNoiseModel {
    fn default() -> Self {
        Self::new(DEFAULT_CONSTANT_NOISE_DB_HZ)
    }
}

impl NoiseModel for ConstantNoiseModel {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn noise_db_hz(&self, _f_khz: f64) -> f64 {
        self.level_db_hz
    }
}
