//! Scene loading, parsing, and validation logic.
//!
//! A scene lists the nodes sharing the channel, the transmission mode they
//! use, and a script of transmissions to replay.
//!
//! ```json
//! {
//!   "tx_mode": { "name": "fsk-80", "modulation": "fsk", "data_rate_bps": 80, "phy_rate_sps": 80,
//!                "center_frequency_hz": 10000, "bandwidth_hz": 4000, "constellation_size": 2 },
//!   "nodes": [ { "node_id": 0, "position": { "x": 0, "y": 0, "z": 10 }, "tx_power_db": 190 } ],
//!   "transmissions": [ { "at_ms": 100, "node_id": 0, "payload_size": 32 } ]
//! }
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

use crate::simulation::types::{NodeId, Point, SimTime, TxMode};

/// Error type for scene loading failures.
#[derive(Debug)]
pub enum SceneLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SceneLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            SceneLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SceneLoadError {}

/// Node sharing the channel.
#[derive(Debug, Deserialize, Clone)]
pub struct SceneNode {
    pub node_id: NodeId,
    pub position: Point,
    /// Transmit power in dB used for this node's transmissions.
    pub tx_power_db: f64,
}

/// One scripted transmission.
#[derive(Debug, Deserialize, Clone)]
pub struct ScriptedTransmission {
    /// Simulated time of the transmission in milliseconds.
    pub at_ms: u64,
    pub node_id: NodeId,
    pub payload_size: usize,
}

/// Root structure representing the entire scene.
#[derive(Debug, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub tx_mode: TxMode,
    pub nodes: Vec<SceneNode>,
    #[serde(default)]
    pub transmissions: Vec<ScriptedTransmission>,
}

impl Scene {
    pub fn node(&self, node_id: NodeId) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }
}

/// Parse and validate a scene from JSON text.
pub fn parse_scene(data: &str) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(format!("{:#}", e)))?;

    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;

    Ok(scene)
}

/// Load, parse and validate a scene from a file.
pub fn load_scene(path: &str) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| SceneLoadError::FileReadError(format!("{:#}", e)))?;

    parse_scene(&data)
}

/// Validate scene configuration.
///
/// Checks for common issues that would cause runtime problems:
/// - Empty or excessive node count
/// - Duplicate node IDs
/// - Non-finite positions or transmit powers
/// - Zero center frequency or bandwidth in the tx mode
/// - Scripted transmissions from unknown nodes or beyond the representable simulated time
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    const MAX_NODES: usize = 10000;

    if scene.nodes.is_empty() {
        return Err("Scene must contain at least one node".to_string());
    }
    if scene.nodes.len() > MAX_NODES {
        return Err(format!("Node count {} exceeds maximum of {}", scene.nodes.len(), MAX_NODES));
    }

    let mut node_ids = HashSet::new();
    for node in &scene.nodes {
        if !node_ids.insert(node.node_id) {
            return Err(format!("Duplicate node_id found: {}", node.node_id));
        }
    }

    for node in &scene.nodes {
        let p = &node.position;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(format!("Node {} position ({}, {}, {}) is not finite", node.node_id, p.x, p.y, p.z));
        }
        if !node.tx_power_db.is_finite() {
            return Err(format!("Node {} tx_power_db {} is not finite", node.node_id, node.tx_power_db));
        }
    }

    if scene.tx_mode.center_frequency_hz == 0 {
        return Err("Invalid center_frequency_hz, must be positive".to_string());
    }
    if scene.tx_mode.bandwidth_hz == 0 {
        return Err("Invalid bandwidth_hz, must be positive".to_string());
    }

    for (idx, tx) in scene.transmissions.iter().enumerate() {
        if !node_ids.contains(&tx.node_id) {
            return Err(format!("Transmission {} references unknown node_id {}", idx, tx.node_id));
        }
        if tx.at_ms > SimTime::MAX_MILLIS {
            return Err(format!("Transmission {} at_ms {} exceeds maximum of {}", idx, tx.at_ms, SimTime::MAX_MILLIS));
        }
    }

    Ok(())
}
