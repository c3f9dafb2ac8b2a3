//! Flow Runner headless entry point
//!
//! Drives the core with the autopilot at a nominal 60 Hz display rate,
//! persists offered snapshots to an in-memory store and logs each run.
//!
//! Usage: `flow-runner [frames] [seed] [max-quality]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::time::Instant;

    use flow_runner::consts::*;
    use flow_runner::persistence::{MemoryStore, SnapshotStore};
    use flow_runner::sim::GameEvent;
    use flow_runner::{QualityTier, Settings, Simulation, TickInput, Tuning};

    env_logger::init();
    log::info!("Flow Runner (headless) starting...");

    let mut args = std::env::args().skip(1);
    let frames: u32 = args.next().and_then(|a| a.parse().ok()).unwrap_or(3600);
    let mut seed: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(12345);

    let mut settings = Settings::default();
    if let Some(arg) = args.next() {
        match QualityTier::parse(&arg) {
            Some(tier) => settings.max_quality = tier,
            None => log::warn!("Unknown quality '{}', keeping {}", arg, settings.max_quality.as_str()),
        }
    }

    let mut store = MemoryStore::default();
    let mut sim = Simulation::from_store(seed, Tuning::default(), settings, &store);
    let input = TickInput {
        autopilot: true,
        ..Default::default()
    };

    // Display refresh the demo pretends to be locked to
    let frame_dt = 1.0 / sim.settings.target_fps;
    let mut accumulator = 0.0f32;
    let mut runs = 0u32;
    let mut notices = 0u32;
    // Effects and sounds a renderer/mixer would consume
    let mut cues = 0u64;

    for _ in 0..frames {
        let started = Instant::now();

        accumulator += frame_dt.min(0.1);
        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            sim.tick(&input, SIM_DT);
            accumulator -= SIM_DT;
            substeps += 1;
        }

        let mut ended = false;
        for event in sim.drain_events() {
            match event {
                GameEvent::SnapshotOffered(snapshot) => store.store(&snapshot),
                GameEvent::RunEnded(summary) => {
                    runs += 1;
                    ended = true;
                    log::info!(
                        "Run {}: score {} over {:.0}m in {:.1}s (combo {}, near-miss streak {}, escape streak {}, flow level {})",
                        runs,
                        summary.score,
                        summary.distance,
                        summary.duration,
                        summary.max_combo,
                        summary.max_near_miss_streak,
                        summary.max_escape_streak,
                        summary.peak_flow_level
                    );
                }
                GameEvent::QualityChanged { from, to } => {
                    log::info!("Quality {} -> {}", from.as_str(), to.as_str());
                }
                GameEvent::EmergencyNotice => notices += 1,
                e if e.is_presentation() => cues += 1,
                GameEvent::FlowLevelUp { level, multiplier } => {
                    log::debug!("Flow level {} (x{:.1})", level, multiplier);
                }
                _ => {}
            }
        }
        if ended {
            seed = seed.wrapping_add(1);
            sim.restart(seed);
        }

        // A vsynced frame never finishes faster than the refresh interval
        let work_ms = started.elapsed().as_secs_f32() * 1000.0;
        sim.record_frame(work_ms.max(frame_dt * 1000.0));
    }

    let snapshot = sim.snapshot();
    log::info!(
        "Done: {} runs finished, best score {}, skill {:.2}, {} store writes, {} emergency notices, {} presentation cues",
        runs,
        snapshot.best_score,
        sim.ai.skill_level,
        store.writes,
        notices,
        cues
    );
    if !snapshot.top_scores.is_empty() {
        log::info!("Top scores: {:?}", snapshot.top_scores);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Browser builds embed the library directly
}
