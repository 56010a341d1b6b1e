//! window.rs — Measurement window aggregation
//!
//! Turns a raw stream of per-anchor readings into one
//! `DistanceSnapshot` per evaluation instant: the most recent valid
//! distance per anchor inside the half-open window (t − W, t].
//!
//! Two modes share the same window semantics:
//! - batch: instants are the distinct timestamps of a recorded log,
//!   snapshots built by scanning the (timestamp-ordered) slice;
//! - streaming: instants are external ticks, snapshots served from a
//!   mutex-guarded latest-reading cache fed by the delivery thread.
//!
//! No averaging, no interpolation: when several readings from one
//! anchor land in the window, only the most recent survives, and a tie
//! on the timestamp goes to the last-inserted reading.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rtls_types::{AnchorId, Measurement, TagId};
use tracing::trace;

use crate::config::LocatorConfig;

// ── Distance snapshot ─────────────────────────────────────────────────────────

/// One valid reading inside the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp_ms: u64,
    pub distance_m: f64,
}

/// Per-instant view: anchor id → freshest valid distance in the window.
/// Anchors with no valid reading are absent, never zero. Built fresh
/// for each instant and discarded after the solve.
#[derive(Debug, Clone, Default)]
pub struct DistanceSnapshot {
    readings: BTreeMap<AnchorId, Reading>,
}

impl DistanceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading, keeping the freshest per anchor. An equal
    /// timestamp replaces the stored reading: source insertion order is
    /// the tie-break.
    pub fn insert_latest(&mut self, anchor_id: AnchorId, reading: Reading) {
        match self.readings.get(&anchor_id) {
            Some(existing) if existing.timestamp_ms > reading.timestamp_ms => {}
            _ => {
                self.readings.insert(anchor_id, reading);
            }
        }
    }

    pub fn get(&self, anchor_id: AnchorId) -> Option<Reading> {
        self.readings.get(&anchor_id).copied()
    }

    /// Readings in ascending anchor-id order.
    pub fn iter(&self) -> impl Iterator<Item = (AnchorId, Reading)> + '_ {
        self.readings.iter().map(|(&id, &r)| (id, r))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

// ── Batch mode ────────────────────────────────────────────────────────────────

/// Distinct evaluation instants for one tag, in stream order. The input
/// slice is expected timestamp-ordered (the recorder writes it that
/// way); each distinct timestamp becomes one instant, no interpolation.
pub fn evaluation_instants(measurements: &[Measurement], tag_id: TagId) -> Vec<u64> {
    let mut instants = Vec::new();
    for m in measurements {
        if m.tag_id != tag_id {
            continue;
        }
        if instants.last() != Some(&m.timestamp_ms) {
            instants.push(m.timestamp_ms);
        }
    }
    instants
}

/// Build the snapshot for instant `t` from a recorded log: per anchor,
/// the most recent valid reading with timestamp in (t − W, t].
pub fn snapshot_at(
    measurements: &[Measurement],
    tag_id: TagId,
    t: u64,
    window_ms: u64,
    epsilon_m: f64,
) -> DistanceSnapshot {
    let window_start = t.saturating_sub(window_ms);
    let mut snapshot = DistanceSnapshot::new();
    for m in measurements {
        if m.tag_id != tag_id || m.timestamp_ms <= window_start || m.timestamp_ms > t {
            continue;
        }
        if !m.is_valid(epsilon_m) {
            trace!("tag {}: dropping invalid reading from anchor {} ({} m)",
                tag_id, m.anchor_id, m.distance_m);
            continue;
        }
        snapshot.insert_latest(
            m.anchor_id,
            Reading { timestamp_ms: m.timestamp_ms, distance_m: m.distance_m },
        );
    }
    snapshot
}

// ── Streaming mode ────────────────────────────────────────────────────────────

/// Latest-reading cache for live operation on one tag.
///
/// The delivery thread (serial reader, bus subscriber) calls `push` for
/// every arriving measurement; the evaluation thread calls `snapshot`
/// on each tick. Entries older than W at tick time are treated as
/// absent. The interior mutex keeps the two sides from observing torn
/// state; critical sections are a single map operation.
#[derive(Debug)]
pub struct LiveWindow {
    tag_id: TagId,
    window_ms: u64,
    epsilon_m: f64,
    latest: Mutex<BTreeMap<AnchorId, Reading>>,
}

impl LiveWindow {
    pub fn new(tag_id: TagId, cfg: &LocatorConfig) -> Self {
        Self {
            tag_id,
            window_ms: cfg.window_ms,
            epsilon_m: cfg.distance_epsilon_m,
            latest: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn tag_id(&self) -> TagId {
        self.tag_id
    }

    /// Record an arriving measurement. Foreign tags and invalid
    /// distances are ignored; an equal timestamp overwrites (last
    /// delivery wins).
    pub fn push(&self, m: &Measurement) {
        if m.tag_id != self.tag_id {
            trace!("live window for tag {}: ignoring measurement for tag {}", self.tag_id, m.tag_id);
            return;
        }
        if !m.is_valid(self.epsilon_m) {
            trace!("tag {}: dropping invalid reading from anchor {} ({} m)",
                self.tag_id, m.anchor_id, m.distance_m);
            return;
        }
        let mut latest = self.latest.lock().expect("live window mutex poisoned");
        match latest.get(&m.anchor_id) {
            Some(existing) if existing.timestamp_ms > m.timestamp_ms => {}
            _ => {
                latest.insert(
                    m.anchor_id,
                    Reading { timestamp_ms: m.timestamp_ms, distance_m: m.distance_m },
                );
            }
        }
    }

    /// Snapshot for the tick instant `now_ms`: cached readings with
    /// timestamp in (now − W, now]. Expired entries are pruned so the
    /// cache stays bounded by the anchor count.
    pub fn snapshot(&self, now_ms: u64) -> DistanceSnapshot {
        let window_start = now_ms.saturating_sub(self.window_ms);
        let mut latest = self.latest.lock().expect("live window mutex poisoned");
        latest.retain(|_, r| r.timestamp_ms > window_start);

        let mut snapshot = DistanceSnapshot::new();
        for (&id, &r) in latest.iter() {
            if r.timestamp_ms <= now_ms {
                snapshot.insert_latest(id, r);
            }
        }
        snapshot
    }

    /// Drop all cached readings (e.g. on a tag reset).
    pub fn clear(&self) {
        self.latest.lock().expect("live window mutex poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(anchor_id: AnchorId, timestamp_ms: u64, distance_m: f64) -> Measurement {
        Measurement { anchor_id, tag_id: 1, timestamp_ms, distance_m, rssi_dbm: None }
    }

    #[test]
    fn window_keeps_only_most_recent_per_anchor() {
        // Both readings inside the window; only t2 survives.
        let log = vec![m(10, 950, 2.00), m(10, 990, 2.50), m(20, 980, 1.10)];
        let snap = snapshot_at(&log, 1, 1000, 100, 0.01);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get(10).unwrap(), Reading { timestamp_ms: 990, distance_m: 2.50 });
    }

    #[test]
    fn stale_reading_excluded() {
        // timestamp 900 is exactly W before t=1000 — outside (900, 1000].
        let log = vec![m(10, 900, 2.00), m(20, 901, 1.10), m(30, 1000, 1.80)];
        let snap = snapshot_at(&log, 1, 1000, 100, 0.01);
        assert!(snap.get(10).is_none());
        assert!(snap.get(20).is_some());
        assert!(snap.get(30).is_some());
    }

    #[test]
    fn future_reading_excluded() {
        let log = vec![m(10, 1001, 2.00)];
        let snap = snapshot_at(&log, 1, 1000, 100, 0.01);
        assert!(snap.is_empty());
    }

    #[test]
    fn identical_timestamps_last_inserted_wins() {
        let log = vec![m(10, 990, 2.00), m(10, 990, 2.75)];
        let snap = snapshot_at(&log, 1, 1000, 100, 0.01);
        assert_eq!(snap.get(10).unwrap().distance_m, 2.75);
    }

    #[test]
    fn invalid_distances_never_enter() {
        let log = vec![m(10, 990, 0.0), m(20, 991, -3.0), m(30, 992, f64::NAN), m(40, 993, 0.009)];
        let snap = snapshot_at(&log, 1, 1000, 100, 0.01);
        assert!(snap.is_empty());
    }

    #[test]
    fn foreign_tag_excluded_from_batch_snapshot() {
        let mut other = m(10, 990, 2.0);
        other.tag_id = 2;
        let snap = snapshot_at(&[other], 1, 1000, 100, 0.01);
        assert!(snap.is_empty());
    }

    #[test]
    fn evaluation_instants_are_distinct_in_order() {
        let log = vec![m(10, 100, 1.0), m(20, 100, 1.0), m(10, 150, 1.0), m(20, 220, 1.0)];
        assert_eq!(evaluation_instants(&log, 1), vec![100, 150, 220]);
        assert!(evaluation_instants(&log, 9).is_empty());
    }

    #[test]
    fn live_window_expires_old_readings() {
        let lw = LiveWindow::new(1, &LocatorConfig::default()); // W = 100 ms
        lw.push(&m(10, 1000, 2.0));
        lw.push(&m(20, 1050, 1.5));

        let snap = lw.snapshot(1080);
        assert_eq!(snap.len(), 2);

        // At t=1110 the anchor-10 reading (age 110 ms) has expired.
        let snap = lw.snapshot(1110);
        assert!(snap.get(10).is_none());
        assert_eq!(snap.get(20).unwrap().distance_m, 1.5);
    }

    #[test]
    fn live_window_ignores_foreign_tag_and_invalid() {
        let lw = LiveWindow::new(1, &LocatorConfig::default());
        let mut foreign = m(10, 1000, 2.0);
        foreign.tag_id = 7;
        lw.push(&foreign);
        lw.push(&m(20, 1000, 0.0));
        assert!(lw.snapshot(1000).is_empty());
    }

    #[test]
    fn live_window_tie_break_and_clear() {
        let lw = LiveWindow::new(1, &LocatorConfig::default());
        lw.push(&m(10, 1000, 2.0));
        lw.push(&m(10, 1000, 2.9));
        assert_eq!(lw.snapshot(1000).get(10).unwrap().distance_m, 2.9);
        lw.clear();
        assert!(lw.snapshot(1000).is_empty());
    }
}
