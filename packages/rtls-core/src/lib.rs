//! # rtls-core
//!
//! Position-estimation core for a UWB real-time location system:
//! noisy anchor→tag distance readings in, per-instant position
//! estimates out.
//!
//! Pipeline, per tag:
//!
//! ```text
//! Measurements ──► window (most recent valid reading per anchor,
//!                  half-open window (t − W, t])
//!              ──► solver (bounded least-squares multilateration,
//!                  warm-started from the last accepted fix)
//!              ──► trajectory (exactly one accepted/rejected
//!                  estimate per evaluation instant)
//! ```
//!
//! The core is transport-agnostic: it never reads a clock, a socket or
//! a file. Batch replay walks a recorded measurement slice; live
//! operation pairs a [`trajectory::LiveTrajectory`] with whatever
//! delivery thread feeds its [`window::LiveWindow`].
//!
//! Determinism: identical configuration, registry and measurement
//! stream give bitwise-identical estimates.

pub mod config;
pub mod error;
pub mod registry;
pub mod solver;
pub mod summary;
pub mod trajectory;
pub mod window;

pub use config::{Bounds, LocatorConfig, SolveMode};
pub use error::{ConfigError, UnknownAnchor};
pub use registry::AnchorRegistry;
pub use solver::PositionSolver;
pub use summary::TrajectorySummary;
pub use trajectory::{BatchReplay, LiveTrajectory, TrajectoryBuilder};
pub use window::{DistanceSnapshot, LiveWindow, Reading};

// Shared wire types re-exported for downstream convenience.
pub use rtls_types::{
    AnchorId, Measurement, PositionEstimate, RejectionReason, SolveOutcome, TagId, Vec3,
};
