//! Type definitions for the simulation.
//!
//! Contains the value types that flow through the channel:
//! - Simulated time and node identity
//! - Positions in the medium
//! - Transmission modes and power-delay profiles
//! - Packets (the opaque payload delivered to receivers)

use serde::Deserialize;
use std::fmt;
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Identity of a simulated node. Used as the scheduler context of deliveries.
pub type NodeId = u32;

/// Absolute simulated time with nanosecond resolution.
///
/// Simulated time starts at zero when the event queue is created and only
/// moves forward when the queue executes an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    /// Saturates at the largest representable time.
    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis.saturating_mul(1_000_000))
    }

    /// Largest millisecond value that converts without saturating.
    pub const MAX_MILLIS: u64 = u64::MAX / 1_000_000;

    /// Build from fractional seconds, rounding to the nearest nanosecond.
    /// Negative and non-finite values clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return SimTime::ZERO;
        }
        SimTime((secs * 1e9).round() as u64)
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Time elapsed since `earlier`, saturating at zero.
    pub fn saturating_duration_since(&self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        let nanos = u64::try_from(rhs.as_nanos()).unwrap_or(u64::MAX);
        SimTime(self.0.saturating_add(nanos))
    }
}

impl Sub for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Duration {
        self.saturating_duration_since(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

/// Position in the medium, in metres. `z` is depth for underwater scenes.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Modulation family of a transmission mode.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ModulationType {
    Psk,
    Qam,
    Fsk,
    Other,
}

/// Description of how a packet is put on the medium.
///
/// The channel never interprets the mode itself; it is handed to the
/// propagation model (which may depend on the center frequency) and forwarded
/// unchanged to every receiver.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TxMode {
    pub name: String,
    pub modulation: ModulationType,
    /// Data rate in bits per second.
    pub data_rate_bps: u32,
    /// Symbol rate in symbols per second.
    pub phy_rate_sps: u32,
    pub center_frequency_hz: u32,
    pub bandwidth_hz: u32,
    pub constellation_size: u32,
}

impl TxMode {
    pub fn center_frequency_khz(&self) -> f64 {
        self.center_frequency_hz as f64 / 1000.0
    }
}

impl Default for TxMode {
    /// 80 bps FSK at 10 kHz, the stock acoustic modem mode.
    fn default() -> Self {
        Self {
            name: "default-fsk".to_string(),
            modulation: ModulationType::Fsk,
            data_rate_bps: 80,
            phy_rate_sps: 80,
            center_frequency_hz: 10_000,
            bandwidth_hz: 4_000,
            constellation_size: 2,
        }
    }
}

/// One multipath arrival: relative delay and (real) amplitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tap {
    pub delay: Duration,
    pub amplitude: f64,
}

/// Power-delay profile: multipath response of a sender/receiver pair.
///
/// Taps are kept sorted by delay. `resolution` is the delay spacing used by
/// receivers when they bin the profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdp {
    taps: Vec<Tap>,
    resolution: Duration,
}

impl Pdp {
    pub fn new(mut taps: Vec<Tap>, resolution: Duration) -> Self {
        taps.sort_by_key(|t| t.delay);
        Self { taps, resolution }
    }

    /// Single unit tap at zero delay (no multipath).
    pub fn impulse() -> Self {
        Self::new(vec![Tap { delay: Duration::ZERO, amplitude: 1.0 }], Duration::ZERO)
    }

    pub fn taps(&self) -> &[Tap] {
        &self.taps
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Non-coherent energy of all taps.
    pub fn total_energy(&self) -> f64 {
        self.taps.iter().map(|t| t.amplitude * t.amplitude).sum()
    }

    /// Non-coherent energy of the taps whose delay falls in `[start, end)`.
    pub fn sum_taps(&self, start: Duration, end: Duration) -> f64 {
        self.taps
            .iter()
            .filter(|t| t.delay >= start && t.delay < end)
            .map(|t| t.amplitude * t.amplitude)
            .sum()
    }
}

static NEXT_PACKET_UID: AtomicU64 = AtomicU64::new(1);

/// Opaque payload carried across the channel.
///
/// `uid` identifies the transmission; copies share it so traces can match a
/// delivery with the packet that was sent. The byte buffer is never shared.
#[derive(Debug, PartialEq, Eq)]
pub struct Packet {
    uid: u64,
    data: Vec<u8>,
}

impl Packet {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            uid: NEXT_PACKET_UID.fetch_add(1, Ordering::Relaxed),
            data,
        }
    }

    /// Packet of `size` zero bytes.
    pub fn with_size(size: usize) -> Self {
        Self::new(vec![0; size])
    }

    /// Independent deep copy keeping the same uid.
    pub fn copy(&self) -> Self {
        Self {
            uid: self.uid,
            data: self.data.clone(),
        }
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
