//! Per-frame values handed to processors by the manager.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use engine_component::{ComponentId, EntityId};

/// Frame timing passed to [`Processor::update`](crate::Processor::update).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GameTime {
    /// Frame counter, starting at 1 for the first frame.
    pub frame: u64,
    /// Time since the previous frame.
    pub elapsed: Duration,
    /// Time since the loop started.
    pub total: Duration,
}

impl GameTime {
    /// Build the time value for the frame following `self`.
    #[must_use]
    pub fn advance(self, elapsed: Duration) -> Self {
        Self {
            frame: self.frame + 1,
            elapsed,
            total: self.total + elapsed,
        }
    }

    /// `elapsed` in seconds.
    #[must_use]
    pub fn delta_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

/// One draw submission recorded by a processor.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    /// Submitting processor.
    pub processor: String,
    /// Entity being drawn.
    pub entity: EntityId,
    /// Component the draw was derived from.
    pub component: ComponentId,
    /// Back-to-front sort key.
    pub sort_key: f32,
}

/// Context passed to [`Processor::draw`](crate::Processor::draw).
///
/// Processors submit [`DrawItem`]s; the graphics backend that consumes them
/// lives outside this crate.
#[derive(Debug, Default)]
pub struct RenderContext {
    /// The frame being drawn.
    pub time: GameTime,
    items: Mutex<Vec<DrawItem>>,
}

impl RenderContext {
    /// Create an empty context for a frame.
    #[must_use]
    pub fn new(time: GameTime) -> Self {
        Self {
            time,
            items: Mutex::new(Vec::new()),
        }
    }

    /// Record a draw submission.
    pub fn submit(&self, item: DrawItem) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    /// Take the submissions, sorted by `sort_key`.
    #[must_use]
    pub fn into_items(self) -> Vec<DrawItem> {
        let mut items = self.items.into_inner().unwrap_or_else(PoisonError::into_inner);
        items.sort_by(|a, b| a.sort_key.total_cmp(&b.sort_key));
        items
    }

    /// Number of submissions so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_time_advance() {
        let step = Duration::from_millis(16);
        let t = GameTime::default().advance(step).advance(step);
        assert_eq!(t.frame, 2);
        assert_eq!(t.elapsed, step);
        assert_eq!(t.total, step * 2);
        assert!((t.delta_seconds() - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_render_context_sorts_items() {
        let ctx = RenderContext::new(GameTime::default());
        for (i, key) in [3.0, 1.0, 2.0].into_iter().enumerate() {
            ctx.submit(DrawItem {
                processor: "render".to_string(),
                entity: EntityId(i as u64 + 1),
                component: ComponentId(i as u64 + 1),
                sort_key: key,
            });
        }
        assert_eq!(ctx.len(), 3);
        let keys: Vec<f32> = ctx.into_items().iter().map(|i| i.sort_key).collect();
        assert_eq!(keys, vec![1.0, 2.0, 3.0]);
    }
}
