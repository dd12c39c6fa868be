//! Geometry helpers for the propagation models.
//!
//! Distances are plain 3D Euclidean distances in metres. The squared form is
//! exposed separately for range comparisons that do not need the root.

use super::types::Point;

/// Squared Euclidean distance between two points (avoids a sqrt in hot paths).
pub fn distance2(a: &Point, b: &Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    dx * dx + dy * dy + dz * dz
}

/// Convert squared distance back to distance (only when needed for physics).
pub fn distance_from_d2(d2: f64) -> f64 {
    d2.sqrt()
}

/// Euclidean distance between two points in metres.
pub fn distance(a: &Point, b: &Point) -> f64 {
    distance_from_d2(distance2(a, b))
}
