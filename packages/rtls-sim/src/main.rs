//! main.rs — Synthetic RTLS run
//!
//! Runs two concurrent loops against one simulated tag:
//!   1. Ranging loop: advances the random walk at rate_hz and pushes
//!      noisy per-anchor readings into the live measurement window
//!   2. Solver loop: ticks the trajectory at solve_rate_hz, logging
//!      each estimate against ground truth
//!
//! At end of run, prints the trajectory summary plus the mean position
//! error vs ground truth (the figure the real deployment can never
//! measure).

mod ranging;
mod walk;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info};

use rtls_core::{AnchorRegistry, LiveTrajectory, LocatorConfig, TrajectorySummary};
use rtls_types::{AnchorId, PositionEstimate, TagId, Vec3};

use ranging::RangingConfig;
use walk::{RandomWalk, WalkConfig};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rtls-sim", about = "Synthetic UWB ranging simulator for the RTLS core")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// RNG seed (walk + radio). Same seed, same run.
    #[arg(long, default_value = "42")]
    seed: u64,
    /// Run length in seconds
    #[arg(long, default_value = "30")]
    duration_secs: u64,
    /// Simulated tag id
    #[arg(long, default_value = "1")]
    tag: TagId,
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FullConfig {
    anchors: Vec<AnchorEntry>,
    #[serde(default)]
    walk: WalkConfig,
    #[serde(default)]
    ranging: RangingConfig,
    #[serde(default)]
    simulation: SimulationConfig,
    #[serde(default)]
    locator: LocatorConfig,
}

#[derive(Debug, Deserialize)]
struct AnchorEntry {
    id: AnchorId,
    position: Vec3,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SimulationConfig {
    solve_rate_hz: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { solve_rate_hz: 10.0 }
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rtls_sim=info".into()),
        )
        .init();

    let args = Args::parse();

    let config_str = std::fs::read_to_string(&args.config)
        .unwrap_or_else(|_| include_str!("../config.toml").to_string());
    let cfg: FullConfig = toml::from_str(&config_str).context("invalid config.toml")?;
    cfg.locator.validate().context("invalid [locator] section")?;

    let registry = Arc::new(
        AnchorRegistry::load(cfg.anchors.iter().map(|a| (a.id, a.position)))
            .context("invalid [[anchors]] section")?,
    );

    info!(
        "rtls-sim starting: {} anchors, tag {}, seed {}, {} s run",
        registry.len(),
        args.tag,
        args.seed,
        args.duration_secs
    );

    let mut live = LiveTrajectory::new(args.tag, Arc::clone(&registry), &cfg.locator);
    let window = live.window();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut walker = RandomWalk::new(cfg.walk, cfg.locator.bounds, args.seed);
    let (truth_tx, truth_rx) = watch::channel(walker.position());

    let start = Instant::now();
    let deadline = start + Duration::from_secs(args.duration_secs);

    // Ranging loop: walk + radio, feeding the live window.
    let ranging_cfg = cfg.ranging;
    let ranging_registry = Arc::clone(&registry);
    let tag = args.tag;
    let ranging_task = tokio::spawn(async move {
        let epoch_ms = (1000.0 / ranging_cfg.rate_hz).max(1.0) as u64;
        let mut ticker = interval(Duration::from_millis(epoch_ms));
        loop {
            ticker.tick().await;
            if Instant::now() >= deadline {
                break;
            }
            walker.tick(epoch_ms as f64 / 1000.0);
            let now_ms = start.elapsed().as_millis() as u64;
            let epoch = ranging::generate_epoch(
                &ranging_cfg,
                &ranging_registry,
                tag,
                walker.position(),
                now_ms,
                &mut rng,
            );
            debug!("t={now_ms} ms: {} readings", epoch.len());
            for m in &epoch {
                window.push(m);
            }
            if truth_tx.send(walker.position()).is_err() {
                break;
            }
        }
    });

    // Solver loop on the main task.
    let solve_ms = (1000.0 / cfg.simulation.solve_rate_hz).max(1.0) as u64;
    let mut ticker = interval(Duration::from_millis(solve_ms));
    let mut estimates: Vec<PositionEstimate> = Vec::new();
    let mut error_sum_m = 0.0;
    let mut error_count = 0usize;

    while Instant::now() < deadline {
        ticker.tick().await;
        let now_ms = start.elapsed().as_millis() as u64;
        let estimate = live.tick(now_ms);
        let truth = *truth_rx.borrow();

        match estimate.position() {
            Some(p) => {
                let err_m = p.dist(&truth);
                error_sum_m += err_m;
                error_count += 1;
                info!(
                    "t={:>6} ms  fix ({:.2}, {:.2})  truth ({:.2}, {:.2})  err {:.1} cm",
                    now_ms, p.x, p.y, truth.x, truth.y, err_m * 100.0
                );
            }
            None => {
                debug!("t={now_ms} ms: no fix ({:?})", estimate.rejection_reason());
            }
        }
        estimates.push(estimate);
    }

    ranging_task.await.context("ranging loop panicked")?;

    let summary = TrajectorySummary::from_estimates(&estimates);
    info!(
        "run complete: {}/{} instants accepted ({:.0}%), path {:.2} m, mean residual {:.4} m²",
        summary.accepted,
        summary.instants,
        summary.acceptance_rate() * 100.0,
        summary.path_length_m,
        summary.mean_residual_m2
    );
    if error_count > 0 {
        info!("mean error vs ground truth: {:.1} cm", error_sum_m / error_count as f64 * 100.0);
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
