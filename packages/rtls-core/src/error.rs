//! error.rs — Core error taxonomy
//!
//! Only *configuration* problems are `Err`-propagated: a bad anchor set
//! or nonsensical tunables make the whole run meaningless. Per-instant
//! solve failures (too few anchors, poor residual) are carried inside
//! rejected `PositionEstimate`s instead — they are normal outcomes of
//! noisy ranging, not errors to recover from.

use rtls_types::AnchorId;
use thiserror::Error;

/// Fatal setup problems — surfaced at load time, never during solving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("anchor registry needs at least {required} anchors, got {supplied}")]
    TooFewAnchors { supplied: usize, required: usize },

    #[error("anchor {id} has a non-finite coordinate ({x}, {y}, {z})")]
    NonFiniteAnchor { id: AnchorId, x: f64, y: f64, z: f64 },

    #[error("anchors {first} and {second} coincide within {tolerance_m} m — geometry is degenerate")]
    CoincidentAnchors { first: AnchorId, second: AnchorId, tolerance_m: f64 },

    #[error("deployment bounds are degenerate: min ({min_x}, {min_y}, {min_z}) must lie strictly below max ({max_x}, {max_y}, {max_z}) on every axis")]
    DegenerateBounds { min_x: f64, min_y: f64, min_z: f64, max_x: f64, max_y: f64, max_z: f64 },

    #[error("invalid tunable {name} = {value}: {hint}")]
    InvalidTunable { name: &'static str, value: f64, hint: &'static str },
}

/// A measurement referenced an anchor the registry does not know.
/// The single reading is dropped and processing continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("anchor {0} is not in the registry")]
pub struct UnknownAnchor(pub AnchorId);
