//! The object-safe processor interface the manager drives.

use std::sync::Weak;

use engine_component::{ComponentRef, ComponentTypeId, Entity};

use crate::base::{EntityHost, ProcessorBase};
use crate::context::{GameTime, RenderContext};
use crate::error::ProcessorError;

/// What a call to [`Processor::process_entity_component`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Absent → Present: data generated and cached.
    Added,
    /// Present → Absent: cached data dropped.
    Removed,
    /// Present → Present with stale data: dropped and regenerated.
    Regenerated,
    /// Nothing to do.
    Unchanged,
    /// The entity was already being added; the call was dropped.
    Reentrant,
}

/// A subsystem that tracks matching entities and keeps derived data for
/// them.
///
/// Every method takes `&self`: strategy callbacks run while the manager is
/// dispatching and may call back into the same processor on the same stack.
pub trait Processor: Send + Sync {
    /// Shared signature and flags.
    fn base(&self) -> &ProcessorBase;

    /// Processor name.
    fn name(&self) -> &str {
        self.base().name()
    }

    /// Scheduling order; lower runs first.
    fn order(&self) -> i32 {
        self.base().order()
    }

    /// Whether the manager should call [`update`](Self::update) and
    /// [`draw`](Self::draw).
    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }

    /// Toggle per-frame work.
    fn set_enabled(&self, enabled: bool) {
        self.base().set_enabled(enabled);
    }

    /// Should components of kind `concrete` be routed to this processor?
    fn accept(&self, concrete: ComponentTypeId) -> bool {
        self.base().accept(concrete)
    }

    /// Does a change to a component of kind `concrete` affect matching?
    fn is_dependent_on_component_type(&self, concrete: ComponentTypeId) -> bool {
        self.base().is_dependent_on_component_type(concrete)
    }

    /// Re-evaluate `component` (of an accepted kind) on `entity`.
    ///
    /// `force_remove` drops cached data regardless of matching; the manager
    /// passes it when the component is being detached.
    ///
    /// # Errors
    ///
    /// Strategy failures and bookkeeping inconsistencies.
    fn process_entity_component(
        &self,
        entity: &Entity,
        component: &ComponentRef,
        force_remove: bool,
    ) -> Result<Transition, ProcessorError>;

    /// Called once when a manager registers the processor.
    ///
    /// # Errors
    ///
    /// Implementations may refuse registration.
    fn on_system_add(&self, host: Weak<dyn EntityHost>) -> Result<(), ProcessorError> {
        self.base().attach_host(host);
        Ok(())
    }

    /// Called once when the manager deregisters the processor.
    ///
    /// # Errors
    ///
    /// Teardown failures; the processor is deregistered regardless.
    fn on_system_remove(&self) -> Result<(), ProcessorError> {
        self.base().detach_host();
        Ok(())
    }

    /// Per-frame simulation step.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn update(&self, _time: &GameTime) -> Result<(), ProcessorError> {
        Ok(())
    }

    /// Per-frame draw submission.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn draw(&self, _context: &RenderContext) -> Result<(), ProcessorError> {
        Ok(())
    }
}
