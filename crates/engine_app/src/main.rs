//! # engine_app
//!
//! Runs the demo scene: builds the component registry, registers the scene's
//! processors with an [`EntityManager`](manager::EntityManager), makes the
//! scene live and drives it with a fixed-timestep [`FrameLoop`].
//!
//! ## Startup Sequence
//!
//! 1. Load [`EngineConfig`] from the file named by `ENGINE_CONFIG` (defaults
//!    when unset).
//! 2. Register component kinds and processors, applying per-processor
//!    overrides.
//! 3. Populate the scene and enter the frame loop (`max_frames = 0` runs
//!    until the process is stopped).

mod config;
mod error;
mod frame;
mod manager;
mod scene;

use std::sync::Arc;

use anyhow::Result;
use engine_component::EntityAllocator;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::EngineConfig;
use frame::{FrameConfig, FrameLoop};
use manager::EntityManager;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    info!("engine starting");

    let config = EngineConfig::from_env()?;
    let registry = Arc::new(scene::registry()?);
    let manager = EntityManager::new(Arc::clone(&registry));
    let allocator = Arc::new(EntityAllocator::new());

    for processor in scene::processors(&registry, &config, &allocator)? {
        manager.add_processor(processor)?;
    }
    scene::populate(&manager, &allocator)?;

    let mut frames = FrameLoop::new(FrameConfig::from(&config), Arc::clone(&manager));
    frames.run()?;

    info!(
        frames = frames.time().frame,
        entities = manager.entity_count(),
        "engine shut down"
    );
    Ok(())
}
