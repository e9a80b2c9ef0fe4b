//! Fixed-timestep frame loop.
//!
//! Each frame:
//!
//! 1. Advance the [`GameTime`].
//! 2. Run `update` on every enabled processor, in order.
//! 3. Run `draw` on every enabled processor into a fresh [`RenderContext`].
//! 4. Hand the sorted draw list to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use engine_processor::{DrawItem, GameTime, RenderContext};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::ManagerError;
use crate::manager::EntityManager;

/// Configuration for the frame loop.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Target frames per second.
    pub frame_rate: f64,
    /// Maximum number of frames to run (0 = unlimited).
    pub max_frames: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            max_frames: 0,
        }
    }
}

impl From<&EngineConfig> for FrameConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            frame_rate: config.frame_rate,
            max_frames: config.max_frames,
        }
    }
}

/// Drives a manager's processors once per frame.
#[derive(Debug)]
pub struct FrameLoop {
    config: FrameConfig,
    manager: Arc<EntityManager>,
    time: GameTime,
}

impl FrameLoop {
    /// Create a loop over `manager`, starting at frame 0.
    #[must_use]
    pub fn new(config: FrameConfig, manager: Arc<EntityManager>) -> Self {
        Self {
            config,
            manager,
            time: GameTime::default(),
        }
    }

    /// Time of the last completed frame.
    #[must_use]
    pub fn time(&self) -> GameTime {
        self.time
    }

    /// Run one frame of `elapsed` simulated time and return its draw list.
    ///
    /// # Errors
    ///
    /// The first processor failure in update or draw.
    pub fn frame(&mut self, elapsed: Duration) -> Result<Vec<DrawItem>, ManagerError> {
        self.time = self.time.advance(elapsed);
        self.manager.update(&self.time)?;

        let context = RenderContext::new(self.time);
        self.manager.draw(&context)?;
        let items = context.into_items();

        debug!(
            frame = self.time.frame,
            entities = self.manager.entity_count(),
            draws = items.len(),
            "frame complete"
        );
        Ok(items)
    }

    /// Run frames at the configured rate until `max_frames` is reached, or
    /// forever when it is 0.
    ///
    /// # Errors
    ///
    /// An unusable frame rate, or the first failing frame.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let frame_duration = Duration::try_from_secs_f64(1.0 / self.config.frame_rate)
            .with_context(|| format!("invalid frame rate {}", self.config.frame_rate))?;
        let mut frame_count = 0u64;

        info!(
            frame_rate = self.config.frame_rate,
            max_frames = self.config.max_frames,
            "starting frame loop"
        );

        loop {
            let start = Instant::now();

            self.frame(frame_duration)?;

            frame_count += 1;
            if self.config.max_frames > 0 && frame_count >= self.config.max_frames {
                info!(frames = frame_count, "frame loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            } else {
                warn!(
                    frame = self.time.frame,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = frame_duration.as_millis() as u64,
                    "frame exceeded time budget"
                );
            }
        }
        Ok(())
    }
}
