//! Signal and noise calculations shared by the physics models.
//!
//! Contains helpers for:
//! - Log-distance path loss with optional log-normal shadowing
//! - Thorp absorption and spherical/practical spreading for acoustic links
//! - The Wenz ambient noise spectrum (turbulence, shipping, wind, thermal)
//! - dB / linear power conversions
//!
//! Units:
//! - Power: dB (relative), linear power ratio (conversion provided)
//! - Frequency: kHz for the acoustic formulas
//! - Distance: meters

use rand::thread_rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;

/// Parameters of the log-distance path loss model.
///
/// These parameters determine how signal strength decays over distance and how
/// much random variation (shadowing) is applied.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PathLossParameters {
    /// Path loss exponent (n).
    ///
    /// - n = 2.0: Free space
    /// - n = 2.7 to 3.5: Urban areas
    /// - n = 3.0 to 5.0: Indoor obstructed environments
    pub path_loss_exponent: f64,

    /// Standard deviation for log-normal shadowing (σ) in dB.
    ///
    /// A value of 0.0 disables shadowing and makes the model deterministic.
    pub shadowing_sigma: f64,

    /// Path loss at the reference distance d₀ (1 meter) in dB.
    pub path_loss_at_reference_distance: f64,
}

impl Default for PathLossParameters {
    fn default() -> Self {
        Self {
            path_loss_exponent: 2.0,
            shadowing_sigma: 0.0,
            path_loss_at_reference_distance: 40.0,
        }
    }
}

/// Calculate the path loss (in dB) at a given distance using a log-distance
/// path loss model with log-normal shadowing.
///
/// # Formula
///
/// ```text
/// PL(d) = PL(d₀) + 10 × n × log₁₀(d/d₀) + X_σ
/// where d₀ = 1 meter (reference distance)
/// ```
///
/// # Notes
///
/// - For distances < 1.0 meter, returns the reference path loss without further attenuation
/// - Each call samples a new shadowing value when σ > 0, so repeated calls with
///   the same distance yield different results
pub fn calculate_path_loss(distance: f64, params: &PathLossParameters) -> f64 {
    if distance < 1.0 {
        return params.path_loss_at_reference_distance;
    }
    let path_loss = params.path_loss_at_reference_distance + 10.0 * params.path_loss_exponent * distance.log10();
    // Sample log-normal shadowing as a Normal(0, sigma) in dB
    let shadowing = if params.shadowing_sigma > 0.0 {
        match Normal::new(0.0_f64, params.shadowing_sigma) {
            Ok(normal) => normal.sample(&mut thread_rng()),
            Err(_) => 0.0,
        }
    } else {
        0.0
    };
    path_loss + shadowing
}

/// Thorp's empirical absorption coefficient of sea water in dB/km.
///
/// ```text
/// f ≥ 0.4 kHz: α = 0.11 f²/(1+f²) + 44 f²/(4100+f²) + 2.75e-4 f² + 0.003
/// f < 0.4 kHz: α = 0.002 + 0.11 f/(1+f) + 0.011 f
/// ```
pub fn thorp_attenuation_db_km(f_khz: f64) -> f64 {
    let f2 = f_khz * f_khz;
    if f_khz >= 0.4 {
        0.11 * f2 / (1.0 + f2) + 44.0 * f2 / (4100.0 + f2) + 2.75e-4 * f2 + 0.003
    } else {
        0.002 + 0.11 * (f_khz / (1.0 + f_khz)) + 0.011 * f_khz
    }
}

/// Acoustic path loss: spreading plus Thorp absorption.
///
/// ```text
/// PL(d) = k × 10 × log₁₀(d) + (d / 1000) × α(f)
/// ```
///
/// `k` is the spreading coefficient (1 cylindrical, 1.5 practical, 2 spherical).
/// Distances below 1 m are evaluated at 1 m.
pub fn calculate_thorp_path_loss(distance: f64, f_khz: f64, spreading_coefficient: f64) -> f64 {
    let d = distance.max(1.0);
    spreading_coefficient * 10.0 * d.log10() + (d / 1000.0) * thorp_attenuation_db_km(f_khz)
}

/// Ambient noise power spectral density (dB re 1 µPa per Hz) from the Wenz curves.
///
/// Sums four sources in the linear domain:
/// - turbulence: `17 - 30 log f`
/// - shipping: `40 + 20 (s - 0.5) + 26 log f - 60 log(f + 0.03)`
/// - wind: `50 + 7.5 √w + 20 log f - 40 log(f + 0.4)`
/// - thermal: `-15 + 20 log f`
///
/// `shipping` is the shipping activity factor in `[0, 1]`, `wind` the wind speed in m/s.
pub fn wenz_noise_db_hz(f_khz: f64, wind: f64, shipping: f64) -> f64 {
    let log_f = f_khz.log10();
    let turbulence = 17.0 - 30.0 * log_f;
    let ship = 40.0 + 20.0 * (shipping - 0.5) + 26.0 * log_f - 60.0 * (f_khz + 0.03).log10();
    let wind_noise = 50.0 + 7.5 * wind.sqrt() + 20.0 * log_f - 40.0 * (f_khz + 0.4).log10();
    let thermal = -15.0 + 20.0 * log_f;

    linear_to_db(db_to_linear(turbulence) + db_to_linear(ship) + db_to_linear(wind_noise) + db_to_linear(thermal))
}

/// Convert a power level from dB to a linear ratio.
///
/// ```text
/// 0 dB   → 1
/// 10 dB  → 10
/// -10 dB → 0.1
/// ```
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

/// Convert a linear power ratio to dB. Inverse of [`db_to_linear`].
///
/// For `linear <= 0` the result is -∞ or NaN; power values should always be positive.
pub fn linear_to_db(linear: f64) -> f64 {
    10.0 * linear.log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_distance_path_loss_without_shadowing() {
        let params = PathLossParameters::default();
        assert_eq!(calculate_path_loss(0.5, &params), 40.0);
        assert!((calculate_path_loss(10.0, &params) - 60.0).abs() < 1e-9);
        assert!((calculate_path_loss(100.0, &params) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn shadowing_varies_around_mean() {
        let params = PathLossParameters {
            shadowing_sigma: 4.0,
            ..PathLossParameters::default()
        };
        let samples: Vec<f64> = (0..2000).map(|_| calculate_path_loss(100.0, &params)).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((mean - 80.0).abs() < 1.0, "mean {mean}");
        assert!(samples.iter().any(|s| (s - 80.0).abs() > 0.1));
    }

    #[test]
    fn thorp_branches() {
        // ~1.19 dB/km at 10 kHz
        let a10 = thorp_attenuation_db_km(10.0);
        assert!((a10 - 1.1870).abs() < 0.001, "{a10}");
        assert!(thorp_attenuation_db_km(0.1) < thorp_attenuation_db_km(1.0));
        assert!(thorp_attenuation_db_km(30.0) > a10);
    }

    #[test]
    fn thorp_path_loss_grows_with_distance() {
        let near = calculate_thorp_path_loss(100.0, 10.0, 1.5);
        let far = calculate_thorp_path_loss(1000.0, 10.0, 1.5);
        assert!((near - (30.0 + 0.1 * thorp_attenuation_db_km(10.0))).abs() < 1e-9);
        assert!(far > near);
        assert_eq!(calculate_thorp_path_loss(0.0, 10.0, 1.5), calculate_thorp_path_loss(1.0, 10.0, 1.5));
    }

    #[test]
    fn wenz_noise_decreases_with_frequency() {
        let low = wenz_noise_db_hz(1.0, 1.0, 0.0);
        let high = wenz_noise_db_hz(20.0, 1.0, 0.0);
        assert!(low > high);
        assert!(wenz_noise_db_hz(10.0, 10.0, 0.0) > wenz_noise_db_hz(10.0, 1.0, 0.0));
    }

    #[test]
    fn db_linear_conversion_roundtrip_reasonable() {
        for v in [-100.0, -50.0, 0.0, 10.0] {
            assert!((v - linear_to_db(db_to_linear(v))).abs() < 1e-9);
        }
    }
}
