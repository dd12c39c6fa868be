//! Propagation models: per sender/receiver delay, path loss and multipath profile.
//!
//! A model is a pure function of the two positions and the transmission mode.
//! Models are immutable after construction and shared between channels
//! through `Arc`, so one instance may be queried reentrantly from nested
//! scheduled calls.

use std::fmt::Debug;
use std::time::Duration;

use super::geometry::distance;
use super::signal_calculations::{PathLossParameters, calculate_path_loss, calculate_thorp_path_loss};
use super::types::{Pdp, Point, TxMode};

/// Nominal speed of sound in sea water (m/s).
pub const DEFAULT_SOUND_SPEED: f64 = 1500.0;

/// Spreading coefficient for "practical" spreading.
pub const DEFAULT_SPREADING_COEFFICIENT: f64 = 1.5;

/// Capability interface consulted by the channel for every receiver of a transmission.
pub trait PropagationModel: Debug + Send + Sync {
    /// Name the model is selected by in configuration.
    fn name(&self) -> &'static str;

    /// Propagation delay from `tx` to `rx`.
    fn delay(&self, tx: &Point, rx: &Point, mode: &TxMode) -> Duration;

    /// Attenuation in dB subtracted from the transmit power.
    fn path_loss_db(&self, tx: &Point, rx: &Point, mode: &TxMode) -> f64;

    /// Multipath response of the link.
    fn pdp(&self, tx: &Point, rx: &Point, mode: &TxMode) -> Pdp;
}

/// Travel time over `distance` at `speed`; zero for degenerate inputs.
pub(crate) fn travel_time(distance: f64, speed: f64) -> Duration {
    Duration::try_from_secs_f64(distance / speed).unwrap_or(Duration::ZERO)
}

/// Lossless model: geometric delay at the speed of sound, 0 dB loss, impulse PDP.
#[derive(Debug, Clone)]
pub struct IdealPropagationModel {
    sound_speed: f64,
}

impl IdealPropagationModel {
    pub fn new(sound_speed: f64) -> Self {
        Self { sound_speed }
    }
}

impl Default for IdealPropagationModel {
    fn default() -> Self {
        Self::new(DEFAULT_SOUND_SPEED)
    }
}

impl PropagationModel for IdealPropagationModel {
    fn name(&self) -> &'static str {
        "ideal"
    }

    fn delay(&self, tx: &Point, rx: &Point, _mode: &TxMode) -> Duration {
        travel_time(distance(tx, rx), self.sound_speed)
    }

    fn path_loss_db(&self, _tx: &Point, _rx: &Point, _mode: &TxMode) -> f64 {
        0.0
    }

    fn pdp(&self, _tx: &Point, _rx: &Point, _mode: &TxMode) -> Pdp {
        Pdp::impulse()
    }
}

/// Acoustic model with spreading loss and Thorp absorption at the mode's center frequency.
#[derive(Debug, Clone)]
pub struct ThorpPropagationModel {
    sound_speed: f64,
    spreading_coefficient: f64,
}

impl ThorpPropagationModel {
    pub fn new(sound_speed: f64, spreading_coefficient: f64) -> Self {
        Self {
            sound_speed,
            spreading_coefficient,
        }
    }
}

impl Default for ThorpPropagationModel {
    fn default() -> Self {
        Self::new(DEFAULT_SOUND_SPEED, DEFAULT_SPREADING_COEFFICIENT)
    }
}

impl PropagationModel for ThorpPropagationModel {
    fn name(&self) -> &'static str {
        "thorp"
    }

    fn delay(&self, tx: &Point, rx: &Point, _mode: &TxMode) -> Duration {
        travel_time(distance(tx, rx), self.sound_speed)
    }

    fn path_loss_db(&self, tx: &Point, rx: &Point, mode: &TxMode) -> f64 {
        calculate_thorp_path_loss(distance(tx, rx), mode.center_frequency_khz(), self.spreading_coefficient)
    }

    fn pdp(&self, _tx: &Point, _rx: &Point, _mode: &TxMode) -> Pdp {
        Pdp::impulse()
    }
}

/// Log-distance model with optional log-normal shadowing.
///
/// With `shadowing_sigma > 0` every path loss query samples a fresh
/// shadowing term; the model itself holds no mutable state.
#[derive(Debug, Clone)]
pub struct LogDistancePropagationModel {
    parameters: PathLossParameters,
    propagation_speed: f64,
}

impl LogDistancePropagationModel {
    pub fn new(parameters: PathLossParameters, propagation_speed: f64) -> Self {
        Self {
            parameters,
            propagation_speed,
        }
    }

    pub fn parameters(&self) -> &PathLossParameters {
        &self.parameters
    }
}

impl Default for LogDistancePropagationModel {
    fn default() -> Self {
        Self::new(PathLossParameters::default(), DEFAULT_SOUND_SPEED)
    }
}

impl PropagationModel for LogDistancePropagationModel {
    fn name(&self) -> &'static str {
        "log-distance"
    }

    fn delay(&self, tx: &Point, rx: &Point, _mode: &TxMode) -> Duration {
        travel_time(distance(tx, rx), self.propagation_speed)
    }

    fn path_loss_db(&self, tx: &Point, rx: &Point, _mode: &TxMode) -> f64 {
        calculate_path_loss(distance(tx, rx), &self.parameters)
    }

    fn pdp(&self, _tx: &Point, _rx: &Point, _mode: &TxMode) -> Pdp {
        Pdp::impulse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ideal_model_delay_is_geometric() {
        let model = IdealPropagationModel::default();
        let mode = TxMode::default();
        let a = Point::new(0.0, 0.0, 0.0);
        let b = Point::new(1500.0, 0.0, 0.0);
        assert_eq!(model.delay(&a, &b, &mode), Duration::from_secs(1));
        assert_eq!(model.delay(&a, &a, &mode), Duration::ZERO);
        assert_eq!(model.path_loss_db(&a, &b, &mode), 0.0);
        assert_eq!(model.pdp(&a, &b, &mode), Pdp::impulse());
    }

    #[test]
    fn thorp_model_uses_center_frequency() {
        let model = ThorpPropagationModel::default();
        let a = Point::new(0.0, 0.0, 0.0);
        let b = Point::new(0.0, 0.0, 1000.0);
        let low = TxMode {
            center_frequency_hz: 1_000,
            ..TxMode::default()
        };
        let high = TxMode {
            center_frequency_hz: 30_000,
            ..TxMode::default()
        };
        assert!(model.path_loss_db(&a, &b, &high) > model.path_loss_db(&a, &b, &low));
        assert!((model.delay(&a, &b, &low).as_secs_f64() - 1000.0 / 1500.0).abs() < 1e-9);
    }

    #[test]
    fn log_distance_model_is_deterministic_without_shadowing() {
        let model = LogDistancePropagationModel::default();
        let mode = TxMode::default();
        let a = Point::new(0.0, 0.0, 0.0);
        let b = Point::new(100.0, 0.0, 0.0);
        let first = model.path_loss_db(&a, &b, &mode);
        assert!((first - 80.0).abs() < 1e-9);
        assert_eq!(first, model.path_loss_db(&a, &b, &mode));
    }

    #[test]
    fn travel_time_handles_degenerate_speed() {
        assert_eq!(travel_time(10.0, 0.0), Duration::ZERO);
        assert_eq!(travel_time(f64::NAN, 1.0), Duration::ZERO);
        assert_eq!(travel_time(3.0, 1.5), Duration::from_secs(2));
    }
}
