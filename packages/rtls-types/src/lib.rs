//! # rtls-types
//!
//! Shared measurement and estimate types for the RTLS tag positioning
//! workspace.
//!
//! These types are used by:
//! - `rtls-core`: the position-estimation core (aggregation + solving)
//! - `rtls-sim`: the synthetic ranging simulator feeding the core
//! - external transport/logging layers (serial parser, MQTT subscriber,
//!   CSV replay) that deliver `Measurement`s and consume
//!   `PositionEstimate`s
//!
//! ## Conventions
//!
//! - Coordinates are meters in a local Cartesian deployment frame
//!   (x = field width, y = field length, z = height above floor).
//! - Timestamps are monotonic milliseconds from the recording device.
//! - Distances are meters; a distance at or below the configured
//!   epsilon (default 1 cm) is invalid and never reaches the solver.
//!
//! ## Invariants
//! - A rejected estimate carries no coordinate — consumers must never
//!   substitute a stale position for it.
//! - RSSI is informational only; no type here feeds it to the solver.

use serde::{Deserialize, Serialize};

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Fixed reference node id (provisioned on the anchor hardware).
pub type AnchorId = u32;

/// Mobile device id.
pub type TagId = u32;

// ── 3D Vector ─────────────────────────────────────────────────────────────────

/// 3D point/vector in the deployment frame, meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Euclidean distance to another point.
    pub fn dist(&self, other: &Vec3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(&self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    /// True when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ── Range Measurement ─────────────────────────────────────────────────────────

/// One anchor→tag range reading, as delivered by the transport layer.
///
/// The core never mutates measurements; it filters and aggregates them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Measurement {
    /// Anchor that performed the ranging exchange.
    pub anchor_id: AnchorId,
    /// Tag the range refers to.
    pub tag_id: TagId,
    /// Device-monotonic timestamp, milliseconds.
    pub timestamp_ms: u64,
    /// Measured range in meters (already unit-converted by the parser).
    pub distance_m: f64,
    /// Received signal strength, dBm. Informational only.
    pub rssi_dbm: Option<f64>,
}

impl Measurement {
    /// A reading is usable when its distance is finite and above the
    /// validity epsilon. Non-positive and near-zero ranges are ranging
    /// failures reported in-band by the firmware.
    pub fn is_valid(&self, epsilon_m: f64) -> bool {
        self.distance_m.is_finite() && self.distance_m > epsilon_m
    }
}

// ── Position Estimate ─────────────────────────────────────────────────────────

/// Why a solve instant produced no coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum RejectionReason {
    /// Fewer valid distances in the window than the solver requires.
    InsufficientAnchors { available: usize, required: usize },
    /// The optimizer did not converge, or the normalized residual was
    /// at or above the quality threshold. Residual kept for diagnostics.
    LowConfidence { residual_m2: f64, converged: bool },
}

/// Outcome of one solve instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "status")]
pub enum SolveOutcome {
    Accepted {
        /// Best-fit coordinate, guaranteed inside the configured bounds.
        position: Vec3,
        /// Final objective: Σ(‖p−aᵢ‖−dᵢ)² / n, m².
        residual_m2: f64,
        /// Number of anchors that contributed distances.
        anchors_used: usize,
    },
    Rejected { reason: RejectionReason },
}

/// One position estimate per tag per evaluation instant — accepted with
/// a coordinate, or rejected with a reason. Exactly one is produced per
/// instant; a gap in the trajectory is a rejected estimate, not a
/// missing one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub tag_id: TagId,
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub outcome: SolveOutcome,
}

impl PositionEstimate {
    pub fn accepted(
        tag_id: TagId,
        timestamp_ms: u64,
        position: Vec3,
        residual_m2: f64,
        anchors_used: usize,
    ) -> Self {
        Self {
            tag_id,
            timestamp_ms,
            outcome: SolveOutcome::Accepted { position, residual_m2, anchors_used },
        }
    }

    pub fn rejected(tag_id: TagId, timestamp_ms: u64, reason: RejectionReason) -> Self {
        Self { tag_id, timestamp_ms, outcome: SolveOutcome::Rejected { reason } }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, SolveOutcome::Accepted { .. })
    }

    /// Coordinate of an accepted estimate, `None` when rejected.
    pub fn position(&self) -> Option<Vec3> {
        match self.outcome {
            SolveOutcome::Accepted { position, .. } => Some(position),
            SolveOutcome::Rejected { .. } => None,
        }
    }

    /// Final objective value where one exists (accepted solves and
    /// low-confidence rejections; insufficient-anchor rejections never
    /// ran the optimizer).
    pub fn residual_m2(&self) -> Option<f64> {
        match self.outcome {
            SolveOutcome::Accepted { residual_m2, .. } => Some(residual_m2),
            SolveOutcome::Rejected {
                reason: RejectionReason::LowConfidence { residual_m2, .. },
            } => Some(residual_m2),
            SolveOutcome::Rejected { .. } => None,
        }
    }

    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self.outcome {
            SolveOutcome::Rejected { reason } => Some(reason),
            SolveOutcome::Accepted { .. } => None,
        }
    }
}
