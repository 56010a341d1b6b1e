//! registry.rs — Validated fixed anchor positions
//!
//! Loaded once from configuration, immutable afterwards. A
//! reconfiguration builds a new registry; nothing mutates a live one,
//! so it can be shared read-only (`Arc`) across concurrent solves.

use std::collections::BTreeMap;

use rtls_types::{AnchorId, Vec3};

use crate::error::{ConfigError, UnknownAnchor};

/// Geometric floor: below this many anchors no 2D fix exists.
pub const MIN_REGISTRY_ANCHORS: usize = 3;

/// Two anchors closer than this are treated as the same point.
pub const DISTINCT_TOLERANCE_M: f64 = 1e-3;

/// Immutable anchor id → position map, iteration ordered by id.
#[derive(Debug, Clone)]
pub struct AnchorRegistry {
    anchors: BTreeMap<AnchorId, Vec3>,
}

impl AnchorRegistry {
    /// Validate and store a full anchor set. Later duplicates of an id
    /// replace earlier ones before validation, mirroring config-file
    /// override semantics.
    pub fn load(positions: impl IntoIterator<Item = (AnchorId, Vec3)>) -> Result<Self, ConfigError> {
        let anchors: BTreeMap<AnchorId, Vec3> = positions.into_iter().collect();

        for (&id, pos) in &anchors {
            if !pos.is_finite() {
                return Err(ConfigError::NonFiniteAnchor { id, x: pos.x, y: pos.y, z: pos.z });
            }
        }

        if anchors.len() < MIN_REGISTRY_ANCHORS {
            return Err(ConfigError::TooFewAnchors {
                supplied: anchors.len(),
                required: MIN_REGISTRY_ANCHORS,
            });
        }

        let entries: Vec<(AnchorId, Vec3)> = anchors.iter().map(|(&id, &p)| (id, p)).collect();
        for (i, &(id_a, pos_a)) in entries.iter().enumerate() {
            for &(id_b, pos_b) in &entries[i + 1..] {
                if pos_a.dist(&pos_b) < DISTINCT_TOLERANCE_M {
                    return Err(ConfigError::CoincidentAnchors {
                        first: id_a,
                        second: id_b,
                        tolerance_m: DISTINCT_TOLERANCE_M,
                    });
                }
            }
        }

        Ok(Self { anchors })
    }

    pub fn get(&self, id: AnchorId) -> Result<Vec3, UnknownAnchor> {
        self.anchors.get(&id).copied().ok_or(UnknownAnchor(id))
    }

    /// Anchors in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (AnchorId, Vec3)> + '_ {
        self.anchors.iter().map(|(&id, &p)| (id, p))
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Mean of all registered anchor positions.
    pub fn centroid(&self) -> Vec3 {
        let mut sum = Vec3::zero();
        for pos in self.anchors.values() {
            sum = sum.add(pos);
        }
        sum.scale(1.0 / self.anchors.len() as f64)
    }
}
