//! config.rs — Tunables for the estimation core
//!
//! Every heuristic threshold of the estimation core is a field here:
//! window length, residual gate, iteration cap, deployment bounds,
//! minimum anchor count. Defaults can be overridden per-process
//! through `RTLS_*` environment variables, or wholesale through a
//! deserialized config file section.

use rtls_types::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ── Deployment-area bounds ────────────────────────────────────────────────────

/// Axis-aligned box the tag is physically constrained to. The solver
/// clamps every iterate into this box — it never extrapolates outside
/// the deployment area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = self.min.is_finite()
            && self.max.is_finite()
            && self.min.x < self.max.x
            && self.min.y < self.max.y
            && self.min.z < self.max.z;
        if ok {
            Ok(())
        } else {
            Err(ConfigError::DegenerateBounds {
                min_x: self.min.x,
                min_y: self.min.y,
                min_z: self.min.z,
                max_x: self.max.x,
                max_y: self.max.y,
                max_z: self.max.z,
            })
        }
    }

    /// Project a point into the box.
    pub fn clamp(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }

    pub fn contains(&self, p: Vec3, tol: f64) -> bool {
        p.x >= self.min.x - tol
            && p.x <= self.max.x + tol
            && p.y >= self.min.y - tol
            && p.y <= self.max.y + tol
            && p.z >= self.min.z - tol
            && p.z <= self.max.z + tol
    }

    /// Geometric center of the box.
    pub fn center(&self) -> Vec3 {
        self.min.add(&self.max).scale(0.5)
    }
}

impl Default for Bounds {
    /// The reference deployment: a 3.45 m × 5.1 m experimental field,
    /// tag height up to 2.5 m.
    fn default() -> Self {
        Self {
            min: Vec3::zero(),
            max: Vec3::new(3.45, 5.1, 2.5),
        }
    }
}

// ── Solve dimensionality ──────────────────────────────────────────────────────

/// Whether the solver searches in the horizontal plane or in full 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolveMode {
    /// Optimize (x, y) with the tag constrained to a fixed height.
    /// Use when all anchors share one height and tag height is known.
    TwoD { z_m: f64 },
    /// Optimize (x, y, z). Requires anchors that vary in height,
    /// otherwise z is unobservable.
    ThreeD,
}

impl Default for SolveMode {
    fn default() -> Self {
        SolveMode::TwoD { z_m: 0.0 }
    }
}

// ── Locator configuration ─────────────────────────────────────────────────────

/// All tunables of the estimation core in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Measurement window W, milliseconds. A reading participates in the
    /// snapshot at instant t iff its timestamp lies in (t − W, t].
    pub window_ms: u64,
    /// Acceptance gate on the normalized final objective, m².
    pub residual_threshold_m2: f64,
    /// Optimizer iteration cap (doubles as the implicit solve timeout).
    pub max_iterations: u32,
    /// Minimum distinct anchors required per solve.
    pub min_anchors: usize,
    /// Distances at or below this are ranging failures and are dropped.
    pub distance_epsilon_m: f64,
    /// Deployment-area box constraint.
    pub bounds: Bounds,
    /// Plane-constrained or full-3D search.
    pub mode: SolveMode,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            window_ms: env_parsed("RTLS_WINDOW_MS", 100),
            residual_threshold_m2: env_parsed("RTLS_RESIDUAL_THRESHOLD_M2", 0.5),
            max_iterations: env_parsed("RTLS_MAX_ITERATIONS", 50),
            min_anchors: env_parsed("RTLS_MIN_ANCHORS", 3),
            distance_epsilon_m: env_parsed("RTLS_DISTANCE_EPSILON_M", 0.01),
            bounds: Bounds::default(),
            mode: SolveMode::default(),
        }
    }
}

impl LocatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;
        if self.window_ms == 0 {
            return Err(ConfigError::InvalidTunable {
                name: "window_ms",
                value: 0.0,
                hint: "window must span at least one millisecond",
            });
        }
        if !(self.residual_threshold_m2 > 0.0) {
            return Err(ConfigError::InvalidTunable {
                name: "residual_threshold_m2",
                value: self.residual_threshold_m2,
                hint: "gate must be a positive area",
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidTunable {
                name: "max_iterations",
                value: 0.0,
                hint: "optimizer needs at least one iteration",
            });
        }
        if self.min_anchors < 3 {
            return Err(ConfigError::InvalidTunable {
                name: "min_anchors",
                value: self.min_anchors as f64,
                hint: "fewer than 3 anchors cannot fix a position",
            });
        }
        if !(self.distance_epsilon_m >= 0.0) || !self.distance_epsilon_m.is_finite() {
            return Err(ConfigError::InvalidTunable {
                name: "distance_epsilon_m",
                value: self.distance_epsilon_m,
                hint: "epsilon must be finite and non-negative",
            });
        }
        Ok(())
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
