//! trajectory.rs — Per-tag estimate sequencing
//!
//! Owns the only mutable state in the core: the last accepted position
//! of one tag, used to warm-start the next solve. The builder emits
//! exactly one `PositionEstimate` per evaluation instant — accepted
//! with a coordinate, or rejected with a reason — so a gap in the
//! trajectory is always an explicit rejection, never a hole.
//!
//! A rejected solve leaves the warm start untouched: the next instant
//! still seeds from the last position that cleared the gate, and a tag
//! that has never produced an accepted fix keeps seeding from the
//! anchor centroid.

use std::sync::Arc;

use rtls_types::{Measurement, PositionEstimate, SolveOutcome, TagId, Vec3};
use tracing::debug;

use crate::config::LocatorConfig;
use crate::registry::AnchorRegistry;
use crate::solver::PositionSolver;
use crate::window::{evaluation_instants, snapshot_at, DistanceSnapshot, LiveWindow};

// ── Trajectory builder ────────────────────────────────────────────────────────

/// Estimate sequencer for one tag. Instantiate one per tracked tag;
/// builders share the registry but never each other's state.
#[derive(Debug)]
pub struct TrajectoryBuilder {
    tag_id: TagId,
    registry: Arc<AnchorRegistry>,
    solver: PositionSolver,
    window_ms: u64,
    epsilon_m: f64,
    last_accepted: Option<Vec3>,
}

impl TrajectoryBuilder {
    pub fn new(tag_id: TagId, registry: Arc<AnchorRegistry>, cfg: &LocatorConfig) -> Self {
        Self {
            tag_id,
            registry,
            solver: PositionSolver::new(cfg),
            window_ms: cfg.window_ms,
            epsilon_m: cfg.distance_epsilon_m,
            last_accepted: None,
        }
    }

    pub fn tag_id(&self) -> TagId {
        self.tag_id
    }

    /// Seed for the next solve; `None` until the first acceptance.
    pub fn warm_start(&self) -> Option<Vec3> {
        self.last_accepted
    }

    /// Forget the warm start, e.g. after the tag left the area.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    /// Run one solve instant against an already-built snapshot.
    pub fn step(&mut self, snapshot: &DistanceSnapshot, t: u64) -> PositionEstimate {
        let outcome = self.solver.solve(&self.registry, snapshot, self.last_accepted);
        match outcome {
            SolveOutcome::Accepted { position, .. } => {
                self.last_accepted = Some(position);
            }
            SolveOutcome::Rejected { reason } => {
                debug!("tag {} t={} ms: no fix ({reason:?})", self.tag_id, t);
            }
        }
        PositionEstimate { tag_id: self.tag_id, timestamp_ms: t, outcome }
    }

    /// Replay a recorded measurement log: one estimate per distinct
    /// timestamp of this tag, in stream order. Lazy; estimates are
    /// solved as the iterator is advanced.
    pub fn replay<'a>(&'a mut self, measurements: &'a [Measurement]) -> BatchReplay<'a> {
        let instants = evaluation_instants(measurements, self.tag_id).into_iter();
        BatchReplay { builder: self, measurements, instants }
    }
}

/// Iterator over a recorded log's evaluation instants.
pub struct BatchReplay<'a> {
    builder: &'a mut TrajectoryBuilder,
    measurements: &'a [Measurement],
    instants: std::vec::IntoIter<u64>,
}

impl Iterator for BatchReplay<'_> {
    type Item = PositionEstimate;

    fn next(&mut self) -> Option<PositionEstimate> {
        let t = self.instants.next()?;
        let snapshot = snapshot_at(
            self.measurements,
            self.builder.tag_id,
            t,
            self.builder.window_ms,
            self.builder.epsilon_m,
        );
        Some(self.builder.step(&snapshot, t))
    }
}

// ── Live operation ────────────────────────────────────────────────────────────

/// Builder plus its live measurement cache. The delivery side pushes
/// into the shared [`LiveWindow`]; the evaluation side calls [`tick`]
/// at its own cadence.
///
/// [`tick`]: LiveTrajectory::tick
#[derive(Debug)]
pub struct LiveTrajectory {
    builder: TrajectoryBuilder,
    window: Arc<LiveWindow>,
}

impl LiveTrajectory {
    pub fn new(tag_id: TagId, registry: Arc<AnchorRegistry>, cfg: &LocatorConfig) -> Self {
        Self {
            builder: TrajectoryBuilder::new(tag_id, registry, cfg),
            window: Arc::new(LiveWindow::new(tag_id, cfg)),
        }
    }

    /// Handle for the delivery thread to push measurements into.
    pub fn window(&self) -> Arc<LiveWindow> {
        Arc::clone(&self.window)
    }

    /// Solve at the tick instant from whatever the window holds.
    pub fn tick(&mut self, now_ms: u64) -> PositionEstimate {
        let snapshot = self.window.snapshot(now_ms);
        self.builder.step(&snapshot, now_ms)
    }

    pub fn warm_start(&self) -> Option<Vec3> {
        self.builder.warm_start()
    }

    pub fn reset(&mut self) {
        self.builder.reset();
        self.window.clear();
    }
}
