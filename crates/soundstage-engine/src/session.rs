//! Scripted playback sessions.
//!
//! A session drives an engine frame by frame for a fixed length, firing due
//! cues before each update:
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────────┐
//! │ fire due cues│──▶│ engine.update │──▶│ pace (realtime)  │──┐
//! └──────────────┘   └───────────────┘   └──────────────────┘  │
//!        ▲                                                      │
//!        └──────────────────────── next frame ◀─────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use soundstage_kernel::{AudioBackend, EngineStats, SoundEngine, SoundProvider};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::script::{CuePlayer, CueScript, PlayerStats};
use crate::timing::FrameClock;

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Frames run.
    pub frames: u64,
    /// Virtual seconds simulated.
    pub duration: f64,
    /// Average wall-clock work per frame in milliseconds.
    pub average_frame_ms: f32,
    /// Most sounds registered at once.
    pub peak_active_sounds: usize,
    /// Cue counters.
    pub cues: PlayerStats,
    /// Engine counters at the end of the session.
    pub engine: EngineStats,
}

/// Run a script against an initialized engine.
pub fn run<B: AudioBackend>(
    engine: &mut SoundEngine<B>,
    script: CueScript,
    config: &EngineConfig,
) -> SessionReport {
    let total_frames = config.total_frames();
    let mut clock = FrameClock::new(config.frame_rate).with_realtime(config.realtime);
    let mut player = CuePlayer::new(script);
    let mut peak_active_sounds = 0;

    info!(
        "Running session: {} frames at {} fps ({})",
        total_frames,
        clock.frame_rate(),
        if clock.is_realtime() { "realtime" } else { "offline" }
    );

    for _ in 0..total_frames {
        player.apply_due(clock.elapsed(), engine);

        let delta = clock.begin_frame();
        engine.update(delta);
        peak_active_sounds = peak_active_sounds.max(engine.active_sound_count());
        clock.end_frame();

        if clock.frame() % u64::from(clock.frame_rate()) == 0 {
            debug!(
                "t={:.1}s active={} music={:?}",
                clock.elapsed(),
                engine.active_sound_count(),
                engine.current_music()
            );
        }
    }

    // Cues scheduled exactly at the end still fire.
    player.apply_due(clock.elapsed(), engine);

    let report = SessionReport {
        frames: clock.frame(),
        duration: clock.elapsed(),
        average_frame_ms: clock.average_work_ms(),
        peak_active_sounds,
        cues: player.stats(),
        engine: engine.stats(),
    };

    info!(
        "Session finished: {} cues, {} plays admitted, {} rejected, {} evictions",
        report.cues.cues_applied,
        report.engine.plays_admitted,
        report.engine.plays_rejected,
        report.engine.evictions
    );
    report
}
