//! solver.rs — Bounded nonlinear least-squares multilateration
//!
//! One snapshot in, one outcome out. Minimizes the normalized range
//! objective
//!   f(p) = Σ_i (‖p − aᵢ‖ − dᵢ)² / n
//! over the deployment box, via Levenberg-Marquardt on the Gauss-Newton
//! normal equations with the trial step projected back into bounds.
//! 2D mode fixes z and solves a 2×2 system per step; 3D solves 3×3.
//! Both use Cramer's rule, no linear-algebra dependency.
//!
//! The solver is pure: no history, no clock, no fallback position. A
//! solve either clears the acceptance gate (converged AND normalized
//! residual below threshold) or reports why it did not.

use rtls_types::{RejectionReason, SolveOutcome, Vec3};
use tracing::{debug, warn};

use crate::config::{Bounds, LocatorConfig, SolveMode};
use crate::registry::AnchorRegistry;
use crate::window::DistanceSnapshot;

// ── Optimizer constants ───────────────────────────────────────────────────────

/// Step-norm convergence tolerance, meters.
const STEP_TOLERANCE_M: f64 = 1e-7;

/// Damping growth on a rejected trial step / shrink on an accepted one.
const LAMBDA_GROW: f64 = 4.0;
const LAMBDA_SHRINK: f64 = 3.0;
const LAMBDA_INIT: f64 = 1e-3;

/// Past this damping no useful step exists: the iterate is stalled at a
/// (possibly bound-constrained) minimum.
const LAMBDA_MAX: f64 = 1e10;

/// Guard against a zero-length Jacobian row when the iterate lands
/// exactly on an anchor.
const MIN_RANGE_M: f64 = 1e-6;

// ── Solver ────────────────────────────────────────────────────────────────────

/// Stateless position solver configured once from [`LocatorConfig`].
#[derive(Debug, Clone)]
pub struct PositionSolver {
    residual_threshold_m2: f64,
    max_iterations: u32,
    min_anchors: usize,
    bounds: Bounds,
    mode: SolveMode,
}

impl PositionSolver {
    pub fn new(cfg: &LocatorConfig) -> Self {
        Self {
            residual_threshold_m2: cfg.residual_threshold_m2,
            max_iterations: cfg.max_iterations,
            min_anchors: cfg.min_anchors,
            bounds: cfg.bounds,
            mode: cfg.mode,
        }
    }

    /// Solve one snapshot. `warm_start` is the previous accepted
    /// position when one exists; otherwise the search starts at the
    /// centroid of the participating anchors.
    ///
    /// Identical inputs give bitwise-identical outcomes: anchors are
    /// visited in ascending id order and every operation is plain f64
    /// arithmetic.
    pub fn solve(
        &self,
        registry: &AnchorRegistry,
        snapshot: &DistanceSnapshot,
        warm_start: Option<Vec3>,
    ) -> SolveOutcome {
        // Resolve snapshot readings against the registry. A reading
        // from an unprovisioned anchor is dropped, not fatal.
        let mut ranges: Vec<(Vec3, f64)> = Vec::with_capacity(snapshot.len());
        for (id, reading) in snapshot.iter() {
            match registry.get(id) {
                Ok(pos) => ranges.push((pos, reading.distance_m)),
                Err(e) => warn!("dropping reading: {e}"),
            }
        }

        if ranges.len() < self.min_anchors {
            return SolveOutcome::Rejected {
                reason: RejectionReason::InsufficientAnchors {
                    available: ranges.len(),
                    required: self.min_anchors,
                },
            };
        }

        let n = ranges.len();
        let mut p = self.project(match warm_start {
            Some(last) => last,
            None => centroid(&ranges),
        });

        let mut lambda = LAMBDA_INIT;
        let mut objective = self.objective(&ranges, p);
        let mut converged = false;

        for _ in 0..self.max_iterations {
            let step = self.gauss_newton_step(&ranges, p, lambda);
            let trial = self.project(p.add(&step));
            let trial_objective = self.objective(&ranges, trial);

            if trial_objective < objective {
                let moved = trial.dist(&p);
                p = trial;
                objective = trial_objective;
                lambda = (lambda / LAMBDA_SHRINK).max(1e-12);
                if moved < STEP_TOLERANCE_M {
                    converged = true;
                    break;
                }
            } else {
                lambda *= LAMBDA_GROW;
                if lambda > LAMBDA_MAX {
                    // No descent direction left inside the box.
                    converged = true;
                    break;
                }
            }
        }

        if converged && objective < self.residual_threshold_m2 {
            debug_assert!(self.bounds.contains(p, 1e-9));
            SolveOutcome::Accepted { position: p, residual_m2: objective, anchors_used: n }
        } else {
            debug!(
                "solve rejected: residual {:.4} m² (threshold {:.4}), converged {}",
                objective, self.residual_threshold_m2, converged
            );
            SolveOutcome::Rejected {
                reason: RejectionReason::LowConfidence { residual_m2: objective, converged },
            }
        }
    }

    /// Clamp into bounds and pin z in plane-constrained mode.
    fn project(&self, p: Vec3) -> Vec3 {
        let mut p = self.bounds.clamp(p);
        if let SolveMode::TwoD { z_m } = self.mode {
            p.z = z_m;
        }
        p
    }

    /// Normalized objective Σ(‖p − aᵢ‖ − dᵢ)² / n.
    fn objective(&self, ranges: &[(Vec3, f64)], p: Vec3) -> f64 {
        let sum: f64 = ranges
            .iter()
            .map(|(a, d)| {
                let r = p.dist(a) - d;
                r * r
            })
            .sum();
        sum / ranges.len() as f64
    }

    /// One damped Gauss-Newton step: solve
    /// (JᵀJ + λ·(diag(JᵀJ) + I)) δ = Jᵀr with Jacobian rows
    /// (p − aᵢ)/‖p − aᵢ‖ and residuals dᵢ − ‖p − aᵢ‖.
    ///
    /// The added λI keeps the system positive definite when the anchor
    /// geometry is rank-deficient (collinear anchors zero out an axis
    /// of JᵀJ): the unobservable direction gets δ = 0 while the
    /// observable subspace still takes its full Newton step.
    fn gauss_newton_step(&self, ranges: &[(Vec3, f64)], p: Vec3, lambda: f64) -> Vec3 {
        let mut jtj = [[0.0f64; 3]; 3];
        let mut jtr = [0.0f64; 3];

        for (a, d) in ranges {
            let dx = p.x - a.x;
            let dy = p.y - a.y;
            let dz = p.z - a.z;
            let dist = (dx * dx + dy * dy + dz * dz).sqrt().max(MIN_RANGE_M);
            let residual = d - dist;

            let j = [dx / dist, dy / dist, dz / dist];
            for row in 0..3 {
                for col in 0..3 {
                    jtj[row][col] += j[row] * j[col];
                }
                jtr[row] += j[row] * residual;
            }
        }

        // λ > 0 keeps every eigenvalue at least λ away from zero.
        for i in 0..3 {
            jtj[i][i] = jtj[i][i] * (1.0 + lambda) + lambda;
        }

        match self.mode {
            SolveMode::TwoD { .. } => {
                let det = jtj[0][0] * jtj[1][1] - jtj[0][1] * jtj[1][0];
                let sx = (jtj[1][1] * jtr[0] - jtj[0][1] * jtr[1]) / det;
                let sy = (jtj[0][0] * jtr[1] - jtj[1][0] * jtr[0]) / det;
                Vec3::new(sx, sy, 0.0)
            }
            SolveMode::ThreeD => {
                let det = det3(&jtj);
                // Cramer: replace one column at a time.
                let sx = det3(&replace_col(&jtj, 0, &jtr)) / det;
                let sy = det3(&replace_col(&jtj, 1, &jtr)) / det;
                let sz = det3(&replace_col(&jtj, 2, &jtr)) / det;
                Vec3::new(sx, sy, sz)
            }
        }
    }
}

fn centroid(ranges: &[(Vec3, f64)]) -> Vec3 {
    let sum = ranges
        .iter()
        .fold(Vec3::zero(), |acc, (a, _)| acc.add(a));
    sum.scale(1.0 / ranges.len() as f64)
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn replace_col(m: &[[f64; 3]; 3], col: usize, v: &[f64; 3]) -> [[f64; 3]; 3] {
    let mut out = *m;
    for row in 0..3 {
        out[row][col] = v[row];
    }
    out
}
