//! Soundstage host binary.
//!
//! Usage: `soundstage [config.toml]`. Runs the configured cue script against
//! the configured backend and prints the session report as JSON.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use soundstage_engine::{session, BackendKind, Catalog, CueScript, EngineConfig, CONFIG_FILE};
use soundstage_kernel::{AudioBackend, MemoryLibrary, SimulatedBackend, SoundEngine};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("soundstage=info".parse()?))
        .init();

    info!("Soundstage starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = EngineConfig::load_from(&config_path);

    let catalog = match &config.catalog {
        Some(path) => Catalog::load_from(path)?,
        None => {
            info!("No catalog configured, using the demo catalog");
            Catalog::demo()
        },
    };
    let library = catalog.build_library()?;

    let script = match &config.script {
        Some(path) => CueScript::load_from(path)?,
        None => {
            info!("No script configured, using the demo script");
            CueScript::demo()
        },
    };

    match config.backend {
        BackendKind::Simulated => run(SimulatedBackend::new(), library, script, &config)?,
        BackendKind::Rodio => run_rodio(library, script, &config)?,
    }

    info!("Soundstage shutdown complete");
    Ok(())
}

#[cfg(feature = "rodio-backend")]
fn run_rodio(library: MemoryLibrary, script: CueScript, config: &EngineConfig) -> Result<()> {
    let backend = soundstage_kernel::RodioBackend::new()?;
    run(backend, library, script, config)
}

#[cfg(not(feature = "rodio-backend"))]
fn run_rodio(library: MemoryLibrary, script: CueScript, config: &EngineConfig) -> Result<()> {
    tracing::warn!("Built without the rodio-backend feature, falling back to the simulated backend");
    run(SimulatedBackend::new(), library, script, config)
}

fn run<B: AudioBackend>(
    backend: B,
    library: MemoryLibrary,
    script: CueScript,
    config: &EngineConfig,
) -> Result<()> {
    let mut engine = SoundEngine::new(backend, library);
    engine.initialize(config.sound.clone())?;

    let report = session::run(&mut engine, script, config);
    engine.dispose();

    let json = serde_json::to_string_pretty(&report)?;
    println!("{json}");

    if let Some(path) = &config.stats_path {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &json)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        info!("Wrote session report to {}", path.display());
    }
    Ok(())
}
