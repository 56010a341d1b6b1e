//! summary.rs — Trajectory run statistics
//!
//! Aggregate figures over a finished (or in-progress) estimate
//! sequence: acceptance counts, recording span, path length over the
//! accepted fixes, mean speed, mean residual. Consumers print or
//! serialize this at end of run; nothing here feeds back into solving.

use rtls_types::{PositionEstimate, SolveOutcome};
use serde::Serialize;

/// Run statistics over one tag's estimate sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectorySummary {
    pub instants: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Span from first to last evaluation instant, ms.
    pub duration_ms: u64,
    /// Sum of segment lengths between consecutive accepted fixes.
    pub path_length_m: f64,
    /// Path length over duration; 0 for a single-instant run.
    pub mean_speed_mps: f64,
    /// Mean normalized residual over accepted fixes only.
    pub mean_residual_m2: f64,
}

impl TrajectorySummary {
    /// Compute over estimates in evaluation order. Rejected instants
    /// count toward the totals but contribute no path segment: the
    /// path skips over gaps rather than detouring through them.
    pub fn from_estimates(estimates: &[PositionEstimate]) -> Self {
        let mut accepted = 0usize;
        let mut path_length_m = 0.0;
        let mut residual_sum = 0.0;
        let mut prev_fix = None;

        for e in estimates {
            if let SolveOutcome::Accepted { position, residual_m2, .. } = e.outcome {
                accepted += 1;
                residual_sum += residual_m2;
                if let Some(prev) = prev_fix {
                    path_length_m += position.dist(&prev);
                }
                prev_fix = Some(position);
            }
        }

        let duration_ms = match (estimates.first(), estimates.last()) {
            (Some(first), Some(last)) => last.timestamp_ms.saturating_sub(first.timestamp_ms),
            _ => 0,
        };
        let mean_speed_mps = if duration_ms > 0 {
            path_length_m / (duration_ms as f64 / 1000.0)
        } else {
            0.0
        };
        let mean_residual_m2 = if accepted > 0 { residual_sum / accepted as f64 } else { 0.0 };

        Self {
            instants: estimates.len(),
            accepted,
            rejected: estimates.len() - accepted,
            duration_ms,
            path_length_m,
            mean_speed_mps,
            mean_residual_m2,
        }
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.instants > 0 {
            self.accepted as f64 / self.instants as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtls_types::{RejectionReason, Vec3};

    fn fix(t: u64, x: f64, y: f64, residual: f64) -> PositionEstimate {
        PositionEstimate::accepted(1, t, Vec3::new(x, y, 0.0), residual, 4)
    }

    fn gap(t: u64) -> PositionEstimate {
        PositionEstimate::rejected(
            1,
            t,
            RejectionReason::InsufficientAnchors { available: 1, required: 3 },
        )
    }

    #[test]
    fn path_skips_over_rejected_instants() {
        // 1 m at t=0..1000, gap, then 1 m more by t=2000.
        let estimates = vec![
            fix(0, 0.0, 0.0, 0.01),
            fix(1000, 1.0, 0.0, 0.02),
            gap(1500),
            fix(2000, 2.0, 0.0, 0.03),
        ];
        let s = TrajectorySummary::from_estimates(&estimates);
        assert_eq!(s.instants, 4);
        assert_eq!(s.accepted, 3);
        assert_eq!(s.rejected, 1);
        assert_eq!(s.duration_ms, 2000);
        assert!((s.path_length_m - 2.0).abs() < 1e-12);
        assert!((s.mean_speed_mps - 1.0).abs() < 1e-12);
        assert!((s.mean_residual_m2 - 0.02).abs() < 1e-12);
        assert!((s.acceptance_rate() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn empty_and_all_rejected_runs_are_well_defined() {
        let s = TrajectorySummary::from_estimates(&[]);
        assert_eq!(s.instants, 0);
        assert_eq!(s.mean_speed_mps, 0.0);
        assert_eq!(s.acceptance_rate(), 0.0);

        let s = TrajectorySummary::from_estimates(&[gap(100), gap(200)]);
        assert_eq!(s.rejected, 2);
        assert_eq!(s.duration_ms, 100);
        assert_eq!(s.path_length_m, 0.0);
        assert_eq!(s.mean_residual_m2, 0.0);
    }
}
