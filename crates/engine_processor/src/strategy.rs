//! Pluggable per-processor data strategies.

use engine_component::{ComponentRef, Entity};

use crate::context::{GameTime, RenderContext};
use crate::entity_processor::EntityProcessor;

/// How an [`EntityProcessor`] derives, validates and reacts to the data it
/// caches for each matching component.
///
/// Every callback receives the owning processor, so strategies can reach the
/// base helpers ([`ProcessorBase::add_entity`](crate::ProcessorBase::add_entity),
/// ...) and the data cached for other components.
pub trait DataStrategy: Send + Sync + Sized + 'static {
    /// The cached per-component payload.
    type Data: PartialEq + Send + Sync + 'static;

    /// Derive the data for `component` on `entity`.
    ///
    /// # Errors
    ///
    /// Any failure aborts the transition and leaves the component uncached.
    fn generate_data(
        &self,
        processor: &EntityProcessor<Self>,
        entity: &Entity,
        component: &ComponentRef,
    ) -> anyhow::Result<Self::Data>;

    /// Is `data` still current for `component`?
    ///
    /// The default regenerates and compares, which costs a full generation
    /// per check. Override when a cheaper test exists.
    ///
    /// # Errors
    ///
    /// Propagates [`generate_data`](Self::generate_data) failures.
    fn is_data_valid(
        &self,
        processor: &EntityProcessor<Self>,
        entity: &Entity,
        component: &ComponentRef,
        data: &Self::Data,
    ) -> anyhow::Result<bool> {
        Ok(self.generate_data(processor, entity, component)? == *data)
    }

    /// `data` is about to be cached for `component`.
    ///
    /// # Errors
    ///
    /// Failure leaves the component uncached.
    fn on_adding(
        &self,
        _processor: &EntityProcessor<Self>,
        _entity: &Entity,
        _component: &ComponentRef,
        _data: &Self::Data,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// `data` was dropped for `component`.
    ///
    /// The entry is already gone from the processor when this runs:
    /// [`EntityProcessor::contains`] returns `false` for `component`, and a
    /// nested call for it takes the add path.
    ///
    /// # Errors
    ///
    /// Reported to the caller; the data is dropped regardless.
    fn on_removed(
        &self,
        _processor: &EntityProcessor<Self>,
        _entity: &Entity,
        _component: &ComponentRef,
        _data: &Self::Data,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// One-time setup at registration.
    ///
    /// # Errors
    ///
    /// Refuses registration.
    fn on_system_add(&self, _processor: &EntityProcessor<Self>) -> anyhow::Result<()> {
        Ok(())
    }

    /// One-time teardown at deregistration.
    ///
    /// # Errors
    ///
    /// Reported to the manager.
    fn on_system_remove(&self, _processor: &EntityProcessor<Self>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Per-frame simulation step.
    ///
    /// # Errors
    ///
    /// Reported to the manager.
    fn update(&self, _processor: &EntityProcessor<Self>, _time: &GameTime) -> anyhow::Result<()> {
        Ok(())
    }

    /// Per-frame draw submission.
    ///
    /// # Errors
    ///
    /// Reported to the manager.
    fn draw(&self, _processor: &EntityProcessor<Self>, _context: &RenderContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Optional callbacks for processors whose cached data is the component
/// itself. `()` implements every hook as a no-op.
pub trait ComponentHooks: Send + Sync + Sized + 'static {
    /// `component` is about to be tracked.
    ///
    /// # Errors
    ///
    /// Failure leaves the component untracked.
    fn on_adding(
        &self,
        _processor: &EntityProcessor<IdentityStrategy<Self>>,
        _entity: &Entity,
        _component: &ComponentRef,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// `component` is no longer tracked.
    ///
    /// # Errors
    ///
    /// Reported to the caller.
    fn on_removed(
        &self,
        _processor: &EntityProcessor<IdentityStrategy<Self>>,
        _entity: &Entity,
        _component: &ComponentRef,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Per-frame simulation step.
    ///
    /// # Errors
    ///
    /// Reported to the manager.
    fn update(
        &self,
        _processor: &EntityProcessor<IdentityStrategy<Self>>,
        _time: &GameTime,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Per-frame draw submission.
    ///
    /// # Errors
    ///
    /// Reported to the manager.
    fn draw(
        &self,
        _processor: &EntityProcessor<IdentityStrategy<Self>>,
        _context: &RenderContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

impl ComponentHooks for () {}

/// Strategy whose data is the component handle itself.
///
/// Generation is a handle clone and validity is identity comparison, so
/// revalidation never regenerates.
#[derive(Debug, Default)]
pub struct IdentityStrategy<H = ()> {
    hooks: H,
}

impl<H: ComponentHooks> IdentityStrategy<H> {
    /// Wrap a set of hooks.
    #[must_use]
    pub fn new(hooks: H) -> Self {
        Self { hooks }
    }

    /// The wrapped hooks.
    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }
}

impl<H: ComponentHooks> DataStrategy for IdentityStrategy<H> {
    type Data = ComponentRef;

    fn generate_data(
        &self,
        _processor: &EntityProcessor<Self>,
        _entity: &Entity,
        component: &ComponentRef,
    ) -> anyhow::Result<ComponentRef> {
        Ok(component.clone())
    }

    fn is_data_valid(
        &self,
        _processor: &EntityProcessor<Self>,
        _entity: &Entity,
        component: &ComponentRef,
        data: &ComponentRef,
    ) -> anyhow::Result<bool> {
        Ok(data == component)
    }

    fn on_adding(
        &self,
        processor: &EntityProcessor<Self>,
        entity: &Entity,
        component: &ComponentRef,
        _data: &ComponentRef,
    ) -> anyhow::Result<()> {
        self.hooks.on_adding(processor, entity, component)
    }

    fn on_removed(
        &self,
        processor: &EntityProcessor<Self>,
        entity: &Entity,
        component: &ComponentRef,
        _data: &ComponentRef,
    ) -> anyhow::Result<()> {
        self.hooks.on_removed(processor, entity, component)
    }

    fn update(&self, processor: &EntityProcessor<Self>, time: &GameTime) -> anyhow::Result<()> {
        self.hooks.update(processor, time)
    }

    fn draw(&self, processor: &EntityProcessor<Self>, context: &RenderContext) -> anyhow::Result<()> {
        self.hooks.draw(processor, context)
    }
}
