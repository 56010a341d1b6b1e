//! walk.rs — Tag motion model
//!
//! A seeded random walk inside the deployment box: constant walking
//! speed, heading that wanders as a Wiener process, specular reflection
//! off the field edges. Height is fixed, matching the plane-constrained
//! solve of the reference deployment.
//!
//! Same seed, same tick sequence, same path.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rtls_core::Bounds;
use rtls_types::Vec3;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Walking speed, m/s.
    pub speed_mps: f64,
    /// Heading wander: std-dev of the per-√s heading increment, rad.
    pub turn_sigma_rad: f64,
    /// Fixed tag height, m.
    pub tag_height_m: f64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self { speed_mps: 0.6, turn_sigma_rad: 0.5, tag_height_m: 0.0 }
    }
}

#[derive(Debug)]
pub struct RandomWalk {
    cfg: WalkConfig,
    bounds: Bounds,
    position: Vec3,
    heading_rad: f64,
    rng: StdRng,
}

impl RandomWalk {
    /// Start at the field center, heading along +y.
    pub fn new(cfg: WalkConfig, bounds: Bounds, seed: u64) -> Self {
        let mut position = bounds.center();
        position.z = cfg.tag_height_m;
        Self {
            cfg,
            bounds,
            position,
            heading_rad: std::f64::consts::FRAC_PI_2,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Advance the walk by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        let wander = Normal::new(0.0, self.cfg.turn_sigma_rad * dt.sqrt())
            .map(|n| n.sample(&mut self.rng))
            .unwrap_or(0.0);
        self.heading_rad += wander;

        let step = self.cfg.speed_mps * dt;
        let mut x = self.position.x + step * self.heading_rad.cos();
        let mut y = self.position.y + step * self.heading_rad.sin();

        // Reflect off the field edges, flipping the matching heading
        // component so the walk keeps moving along the wall.
        if x < self.bounds.min.x || x > self.bounds.max.x {
            self.heading_rad = std::f64::consts::PI - self.heading_rad;
            x = x.clamp(self.bounds.min.x, self.bounds.max.x);
        }
        if y < self.bounds.min.y || y > self.bounds.max.y {
            self.heading_rad = -self.heading_rad;
            y = y.clamp(self.bounds.min.y, self.bounds.max.y);
        }

        self.position = Vec3::new(x, y, self.cfg.tag_height_m);
    }
}
