//! The generic processor: per-component data cache and the
//! add / remove / revalidate transition engine.
//!
//! For each component instance routed to it, an [`EntityProcessor`] is in one
//! of two states, Absent or Present:
//!
//! | cached | `force_remove` | entity matches | action                     |
//! |--------|----------------|----------------|----------------------------|
//! | no     | no             | yes            | add (under in-flight guard)|
//! | yes    | yes            | any            | remove                     |
//! | yes    | no             | no             | remove                     |
//! | yes    | no             | yes            | revalidate                 |
//! | no     | yes            | any            | nothing                    |
//! | no     | no             | no             | nothing                    |
//!
//! Strategy callbacks run with no map or guard lock held (only the entity's
//! in-flight mark during an add), so they may attach and detach components and
//! re-enter this processor. A nested add for an entity whose add is still in
//! flight is dropped; the nested component is picked up by the next event
//! routed for it.
//!
//! Cached data is taken out of the map before `on_removed` runs, so a nested
//! call made from `on_removed` sees the component as already absent and
//! never drops the same data twice. When such a nested call re-adds the
//! component during a regeneration, its entry is kept and the outer
//! regeneration stops short of a second `on_adding`.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use engine_component::{ComponentId, ComponentRef, Entity, EntityId};
use tracing::debug;

use crate::base::{EntityHost, ProcessorBase};
use crate::context::{GameTime, RenderContext};
use crate::error::ProcessorError;
use crate::guard::InFlightSet;
use crate::processor::{Processor, Transition};
use crate::strategy::{DataStrategy, IdentityStrategy};

/// A processor whose cached data is the component handle itself.
pub type ComponentProcessor<H = ()> = EntityProcessor<IdentityStrategy<H>>;

/// One cached entry.
#[derive(Debug)]
pub struct ComponentData<D> {
    /// The entity the component was attached to when the data was generated.
    pub entity: EntityId,
    /// The component the data belongs to.
    pub component: ComponentRef,
    /// The cached data.
    pub data: Arc<D>,
}

impl<D> Clone for ComponentData<D> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity,
            component: self.component.clone(),
            data: Arc::clone(&self.data),
        }
    }
}

/// A [`Processor`] that caches `S::Data` for every matching component of its
/// main type.
pub struct EntityProcessor<S: DataStrategy> {
    base: ProcessorBase,
    strategy: S,
    datas: DashMap<ComponentId, ComponentData<S::Data>>,
    in_flight: InFlightSet,
}

impl<S: DataStrategy> EntityProcessor<S> {
    /// Combine a validated base with a strategy.
    #[must_use]
    pub fn new(base: ProcessorBase, strategy: S) -> Self {
        Self {
            base,
            strategy,
            datas: DashMap::new(),
            in_flight: InFlightSet::new(),
        }
    }

    /// The strategy.
    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// The data cached for `component`, if it is tracked.
    #[must_use]
    pub fn data_for(&self, component: &ComponentRef) -> Option<Arc<S::Data>> {
        self.datas
            .get(&component.id())
            .map(|entry| Arc::clone(&entry.data))
    }

    /// Returns `true` if `component` is tracked.
    #[must_use]
    pub fn contains(&self, component: &ComponentRef) -> bool {
        self.datas.contains_key(&component.id())
    }

    /// Number of tracked components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.datas.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datas.is_empty()
    }

    /// Snapshot of every tracked entry, ordered by component id.
    #[must_use]
    pub fn entries(&self) -> Vec<ComponentData<S::Data>> {
        let mut entries: Vec<_> = self.datas.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by_key(|entry| entry.component.id());
        entries
    }

    /// Returns `true` while a component of `entity` is being added.
    #[must_use]
    pub fn is_in_flight(&self, entity: EntityId) -> bool {
        self.in_flight.contains(entity)
    }

    fn strategy_error(&self, stage: &'static str, source: anyhow::Error) -> ProcessorError {
        ProcessorError::Strategy {
            processor: self.base.name().to_string(),
            stage,
            source,
        }
    }

    fn inconsistent(&self, message: String) -> ProcessorError {
        ProcessorError::Inconsistent {
            processor: self.base.name().to_string(),
            message,
        }
    }

    fn add(&self, entity: &Entity, component: &ComponentRef) -> Result<Transition, ProcessorError> {
        let Some(_guard) = self.in_flight.try_acquire(entity.id()) else {
            debug!(
                processor = self.base.name(),
                entity = %entity.id(),
                component = %component.id(),
                "entity already being added, dropping nested add"
            );
            return Ok(Transition::Reentrant);
        };

        let data = self
            .strategy
            .generate_data(self, entity, component)
            .map_err(|e| self.strategy_error("generate_data", e))?;
        self.strategy
            .on_adding(self, entity, component, &data)
            .map_err(|e| self.strategy_error("on_adding", e))?;
        self.commit(entity, component, data)?;

        debug!(
            processor = self.base.name(),
            entity = %entity.id(),
            component = %component.id(),
            "component data added"
        );
        Ok(Transition::Added)
    }

    fn remove(&self, entity: &Entity, component: &ComponentRef) -> Result<Transition, ProcessorError> {
        let Some((_, stale)) = self.datas.remove(&component.id()) else {
            return Err(self.inconsistent(format!("{} has no cached data to remove", component.id())));
        };

        debug!(
            processor = self.base.name(),
            entity = %entity.id(),
            component = %component.id(),
            "component data removed"
        );
        self.strategy
            .on_removed(self, entity, component, &stale.data)
            .map_err(|e| self.strategy_error("on_removed", e))?;
        Ok(Transition::Removed)
    }

    fn revalidate(
        &self,
        entity: &Entity,
        component: &ComponentRef,
        cached: Arc<S::Data>,
    ) -> Result<Transition, ProcessorError> {
        let valid = self
            .strategy
            .is_data_valid(self, entity, component, &cached)
            .map_err(|e| self.strategy_error("is_data_valid", e))?;
        if valid {
            return Ok(Transition::Unchanged);
        }

        let Some((_, stale)) = self.datas.remove(&component.id()) else {
            // Dropped by a nested call from is_data_valid.
            return Ok(Transition::Unchanged);
        };
        self.strategy
            .on_removed(self, entity, component, &stale.data)
            .map_err(|e| self.strategy_error("on_removed", e))?;

        let fresh = self
            .strategy
            .generate_data(self, entity, component)
            .map_err(|e| self.strategy_error("generate_data", e))?;
        if self.datas.contains_key(&component.id()) {
            // A nested add from on_removed or generate_data already cached
            // fresh data.
            debug!(
                processor = self.base.name(),
                entity = %entity.id(),
                component = %component.id(),
                "component data regenerated by nested add"
            );
            return Ok(Transition::Regenerated);
        }
        self.strategy
            .on_adding(self, entity, component, &fresh)
            .map_err(|e| self.strategy_error("on_adding", e))?;
        self.replace(entity, component, fresh)?;

        debug!(
            processor = self.base.name(),
            entity = %entity.id(),
            component = %component.id(),
            "component data regenerated"
        );
        Ok(Transition::Regenerated)
    }

    fn commit(&self, entity: &Entity, component: &ComponentRef, data: S::Data) -> Result<(), ProcessorError> {
        match self.datas.entry(component.id()) {
            Entry::Occupied(_) => Err(self.inconsistent(format!(
                "{} already has cached data",
                component.id()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(ComponentData {
                    entity: entity.id(),
                    component: component.clone(),
                    data: Arc::new(data),
                });
                Ok(())
            }
        }
    }

    /// Install regenerated data. Data displaced by a nested add made from
    /// `on_adding` is paired with its own `on_removed`.
    fn replace(&self, entity: &Entity, component: &ComponentRef, data: S::Data) -> Result<(), ProcessorError> {
        let displaced = self.datas.insert(
            component.id(),
            ComponentData {
                entity: entity.id(),
                component: component.clone(),
                data: Arc::new(data),
            },
        );
        if let Some(displaced) = displaced {
            debug!(
                processor = self.base.name(),
                entity = %entity.id(),
                component = %component.id(),
                "nested add displaced by regeneration"
            );
            self.strategy
                .on_removed(self, entity, component, &displaced.data)
                .map_err(|e| self.strategy_error("on_removed", e))?;
        }
        Ok(())
    }
}

impl<S: DataStrategy> Processor for EntityProcessor<S> {
    fn base(&self) -> &ProcessorBase {
        &self.base
    }

    fn process_entity_component(
        &self,
        entity: &Entity,
        component: &ComponentRef,
        force_remove: bool,
    ) -> Result<Transition, ProcessorError> {
        let cached = self.data_for(component);
        let matches = !force_remove && self.base.entity_match(entity);

        match cached {
            None if matches => self.add(entity, component),
            None => Ok(Transition::Unchanged),
            Some(_) if !matches => self.remove(entity, component),
            Some(data) => self.revalidate(entity, component, data),
        }
    }

    fn on_system_add(&self, host: std::sync::Weak<dyn EntityHost>) -> Result<(), ProcessorError> {
        self.base.attach_host(host);
        self.strategy
            .on_system_add(self)
            .map_err(|e| self.strategy_error("on_system_add", e))
    }

    fn on_system_remove(&self) -> Result<(), ProcessorError> {
        let result = self
            .strategy
            .on_system_remove(self)
            .map_err(|e| self.strategy_error("on_system_remove", e));
        self.base.detach_host();
        result
    }

    fn update(&self, time: &GameTime) -> Result<(), ProcessorError> {
        self.strategy
            .update(self, time)
            .map_err(|e| self.strategy_error("update", e))
    }

    fn draw(&self, context: &RenderContext) -> Result<(), ProcessorError> {
        self.strategy
            .draw(self, context)
            .map_err(|e| self.strategy_error("draw", e))
    }
}

impl<S: DataStrategy> std::fmt::Debug for EntityProcessor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityProcessor")
            .field("base", &self.base)
            .field("tracked", &self.datas.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use engine_component::{Component, ComponentTypeId, ComponentTypeRegistry};

    use super::*;
    use crate::config::ProcessorConfig;

    struct Marker;
    impl Component for Marker {
        fn type_name() -> &'static str {
            "Marker"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Level(u32);
    impl Component for Level {
        fn type_name() -> &'static str {
            "Level"
        }
    }

    fn registry() -> Arc<ComponentTypeRegistry> {
        let mut registry = ComponentTypeRegistry::new();
        registry.register::<Marker>().unwrap();
        registry.register::<Level>().unwrap();
        Arc::new(registry)
    }

    type Hook = Box<dyn Fn(&EntityProcessor<Tracker>, &Entity, &ComponentRef) -> anyhow::Result<()> + Send + Sync>;

    /// Caches a `Level`'s value and records every callback.
    #[derive(Default)]
    struct Tracker {
        events: Mutex<Vec<(&'static str, u32)>>,
        generations: AtomicUsize,
        fail_generate: AtomicBool,
        hook: Option<Hook>,
        adding_hook: Option<Hook>,
        removed_hook: Option<Hook>,
    }

    impl Tracker {
        fn with_hook(
            hook: impl Fn(&EntityProcessor<Tracker>, &Entity, &ComponentRef) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
        ) -> Self {
            Self {
                hook: Some(Box::new(hook)),
                ..Self::default()
            }
        }

        fn on_adding_call(
            hook: impl Fn(&EntityProcessor<Tracker>, &Entity, &ComponentRef) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
        ) -> Self {
            Self {
                adding_hook: Some(Box::new(hook)),
                ..Self::default()
            }
        }

        fn on_removed_call(
            hook: impl Fn(&EntityProcessor<Tracker>, &Entity, &ComponentRef) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
        ) -> Self {
            Self {
                removed_hook: Some(Box::new(hook)),
                ..Self::default()
            }
        }

        fn events(&self) -> Vec<(&'static str, u32)> {
            self.events.lock().unwrap().clone()
        }

        fn count(&self, kind: &str) -> usize {
            self.events().iter().filter(|(k, _)| *k == kind).count()
        }
    }

    impl DataStrategy for Tracker {
        type Data = u32;

        fn generate_data(
            &self,
            processor: &EntityProcessor<Self>,
            entity: &Entity,
            component: &ComponentRef,
        ) -> anyhow::Result<u32> {
            self.generations.fetch_add(1, Ordering::SeqCst);
            if let Some(hook) = &self.hook {
                hook(processor, entity, component)?;
            }
            if self.fail_generate.load(Ordering::SeqCst) {
                anyhow::bail!("generation refused");
            }
            Ok(component.read(|level: &Level| level.0)?)
        }

        fn on_adding(
            &self,
            processor: &EntityProcessor<Self>,
            entity: &Entity,
            component: &ComponentRef,
            data: &u32,
        ) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(("adding", *data));
            if let Some(hook) = &self.adding_hook {
                hook(processor, entity, component)?;
            }
            Ok(())
        }

        fn on_removed(
            &self,
            processor: &EntityProcessor<Self>,
            entity: &Entity,
            component: &ComponentRef,
            data: &u32,
        ) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(("removed", *data));
            if let Some(hook) = &self.removed_hook {
                hook(processor, entity, component)?;
            }
            Ok(())
        }
    }

    fn processor(required: &[ComponentTypeId], tracker: Tracker) -> EntityProcessor<Tracker> {
        let base = ProcessorBase::new(
            registry(),
            ProcessorConfig::new("tracker"),
            Level::component_type_id(),
            required,
        )
        .unwrap();
        EntityProcessor::new(base, tracker)
    }

    fn entity(id: u64) -> Entity {
        Entity::new(EntityId(id), format!("e{id}"))
    }

    #[test]
    fn test_add_once() {
        let p = processor(&[], Tracker::default());
        let e = entity(1);
        let level = e.attach(Level(3)).unwrap();

        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Added);
        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Unchanged);

        assert_eq!(p.strategy().events(), vec![("adding", 3)]);
        assert_eq!(p.len(), 1);
        assert_eq!(p.data_for(&level).as_deref(), Some(&3));
        // Default validity regenerates to compare.
        assert_eq!(p.strategy().generations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let marker = Marker::component_type_id();
        let p = processor(&[marker], Tracker::default());
        let e = entity(1);
        let level = e.attach(Level(1)).unwrap();

        for _ in 0..3 {
            assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Unchanged);
        }
        assert!(p.is_empty());

        e.attach(Marker).unwrap();
        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Added);
        for _ in 0..3 {
            assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Unchanged);
        }
        assert_eq!(p.len(), 1);
        assert_eq!(p.strategy().count("adding"), 1);
    }

    #[test]
    fn test_force_remove_bypasses_match() {
        let p = processor(&[], Tracker::default());
        let e = entity(1);
        let level = e.attach(Level(4)).unwrap();
        p.process_entity_component(&e, &level, false).unwrap();

        // Entity still matches; force wins anyway.
        assert_eq!(p.process_entity_component(&e, &level, true).unwrap(), Transition::Removed);
        assert!(!p.contains(&level));
        assert_eq!(p.strategy().events(), vec![("adding", 4), ("removed", 4)]);

        // Never-mapped component: no-op.
        assert_eq!(p.process_entity_component(&e, &level, true).unwrap(), Transition::Unchanged);
    }

    #[test]
    fn test_required_types_scenario() {
        let p = processor(&[Marker::component_type_id(), Level::component_type_id()], Tracker::default());
        let e = entity(1);

        let marker = e.attach(Marker).unwrap();
        assert_eq!(p.process_entity_component(&e, &marker, false).unwrap(), Transition::Unchanged);
        assert!(p.is_empty());

        let level = e.attach(Level(2)).unwrap();
        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Added);
        assert!(p.contains(&level));

        e.remove_component(&marker).unwrap();
        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Removed);
        assert!(p.is_empty());
        assert_eq!(p.strategy().events(), vec![("adding", 2), ("removed", 2)]);
    }

    #[test]
    fn test_stale_data_is_regenerated() {
        let p = processor(&[], Tracker::default());
        let e = entity(1);
        let level = e.attach(Level(3)).unwrap();
        p.process_entity_component(&e, &level, false).unwrap();

        level.write(|l: &mut Level| l.0 = 9).unwrap();
        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Regenerated);

        assert_eq!(
            p.strategy().events(),
            vec![("adding", 3), ("removed", 3), ("adding", 9)]
        );
        assert_eq!(p.data_for(&level).as_deref(), Some(&9));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_nested_add_of_same_component_is_dropped() {
        let nested = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&nested);
        let tracker = Tracker::with_hook(move |processor, entity, component| {
            let transition = processor.process_entity_component(entity, component, false)?;
            seen.lock().unwrap().push(transition);
            Ok(())
        });
        let p = processor(&[], tracker);
        let e = entity(1);
        let level = e.attach(Level(5)).unwrap();

        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Added);
        assert_eq!(*nested.lock().unwrap(), vec![Transition::Reentrant]);
        assert_eq!(p.strategy().count("adding"), 1);
        assert!(!p.is_in_flight(e.id()));
    }

    #[test]
    fn test_nested_add_on_other_entity_proceeds() {
        let other = entity(2);
        let other_level = other.attach(Level(7)).unwrap();
        let nested = Arc::new(Mutex::new(Vec::new()));

        let (target, target_level, seen) = (other.clone(), other_level.clone(), Arc::clone(&nested));
        let tracker = Tracker::with_hook(move |processor, entity, _component| {
            if entity.id() == EntityId(1) {
                let transition = processor.process_entity_component(&target, &target_level, false)?;
                seen.lock().unwrap().push(transition);
            }
            Ok(())
        });
        let p = processor(&[], tracker);
        let e = entity(1);
        let level = e.attach(Level(1)).unwrap();

        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Added);
        assert_eq!(*nested.lock().unwrap(), vec![Transition::Added]);
        assert!(p.contains(&level));
        assert!(p.contains(&other_level));
        // The nested add completed first.
        assert_eq!(p.strategy().events(), vec![("adding", 7), ("adding", 1)]);
    }

    #[test]
    fn test_nested_add_of_sibling_is_dropped_then_picked_up() {
        let e = entity(1);
        let first = e.attach(Level(1)).unwrap();
        let second = e.attach(Level(2)).unwrap();
        let nested = Arc::new(Mutex::new(Vec::new()));

        let (sibling, first_id, seen) = (second.clone(), first.id(), Arc::clone(&nested));
        let tracker = Tracker::with_hook(move |processor, entity, component| {
            if component.id() == first_id {
                let transition = processor.process_entity_component(entity, &sibling, false)?;
                seen.lock().unwrap().push(transition);
            }
            Ok(())
        });
        let p = processor(&[], tracker);

        assert_eq!(p.process_entity_component(&e, &first, false).unwrap(), Transition::Added);
        assert_eq!(*nested.lock().unwrap(), vec![Transition::Reentrant]);
        assert!(!p.contains(&second));

        // Its own event picks it up.
        assert_eq!(p.process_entity_component(&e, &second, false).unwrap(), Transition::Added);
        assert_eq!(p.len(), 2);
    }

    type Seen = Arc<Mutex<Vec<Transition>>>;

    /// Re-enters once for the component it is called with, after `armed` is set.
    fn reenter_once(armed: Arc<AtomicBool>, seen: Seen) -> impl Fn(&EntityProcessor<Tracker>, &Entity, &ComponentRef) -> anyhow::Result<()> + Send + Sync + 'static {
        move |processor, entity, component| {
            if armed.swap(false, Ordering::SeqCst) {
                let transition = processor.process_entity_component(entity, component, false)?;
                seen.lock().unwrap().push(transition);
            }
            Ok(())
        }
    }

    #[test]
    fn test_regeneration_keeps_nested_add_from_on_removed() {
        let (armed, nested) = (Arc::new(AtomicBool::new(false)), Seen::default());
        let p = processor(&[], Tracker::on_removed_call(reenter_once(Arc::clone(&armed), Arc::clone(&nested))));
        let e = entity(1);
        let level = e.attach(Level(1)).unwrap();
        p.process_entity_component(&e, &level, false).unwrap();

        level.write(|l: &mut Level| l.0 = 2).unwrap();
        armed.store(true, Ordering::SeqCst);
        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Regenerated);

        assert_eq!(*nested.lock().unwrap(), vec![Transition::Added]);
        // One on_adding for the one cached entry.
        assert_eq!(
            p.strategy().events(),
            vec![("adding", 1), ("removed", 1), ("adding", 2)]
        );
        assert_eq!(p.data_for(&level).as_deref(), Some(&2));
        assert_eq!(p.len(), 1);
        assert!(!p.is_in_flight(e.id()));
    }

    #[test]
    fn test_regeneration_pairs_displaced_nested_add() {
        let (armed, nested) = (Arc::new(AtomicBool::new(false)), Seen::default());
        let p = processor(&[], Tracker::on_adding_call(reenter_once(Arc::clone(&armed), Arc::clone(&nested))));
        let e = entity(1);
        let level = e.attach(Level(1)).unwrap();
        p.process_entity_component(&e, &level, false).unwrap();

        level.write(|l: &mut Level| l.0 = 2).unwrap();
        armed.store(true, Ordering::SeqCst);
        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Regenerated);

        assert_eq!(*nested.lock().unwrap(), vec![Transition::Added]);
        assert_eq!(
            p.strategy().events(),
            vec![("adding", 1), ("removed", 1), ("adding", 2), ("adding", 2), ("removed", 2)]
        );
        assert_eq!(p.data_for(&level).as_deref(), Some(&2));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_nested_call_for_unmatched_sibling_is_unchanged() {
        let e = entity(1);
        let marker = e.attach(Marker).unwrap();
        let first = e.attach(Level(1)).unwrap();
        let second = e.attach(Level(2)).unwrap();
        let nested = Seen::default();

        let (detach, sibling, first_id, seen) = (marker.clone(), second.clone(), first.id(), Arc::clone(&nested));
        let tracker = Tracker::with_hook(move |processor, entity, component| {
            if component.id() == first_id && entity.contains(&detach) {
                entity.remove_component(&detach)?;
                let transition = processor.process_entity_component(entity, &sibling, false)?;
                seen.lock().unwrap().push(transition);
                assert!(processor.is_in_flight(entity.id()));
            }
            Ok(())
        });
        let p = processor(&[Marker::component_type_id()], tracker);

        assert_eq!(p.process_entity_component(&e, &first, false).unwrap(), Transition::Added);
        assert_eq!(*nested.lock().unwrap(), vec![Transition::Unchanged]);
        assert!(!p.contains(&second));
        assert!(!p.is_in_flight(e.id()));
    }

    #[test]
    fn test_generation_failure_releases_guard() {
        let p = processor(&[], Tracker::default());
        p.strategy().fail_generate.store(true, Ordering::SeqCst);
        let e = entity(1);
        let level = e.attach(Level(3)).unwrap();

        let err = p.process_entity_component(&e, &level, false).unwrap_err();
        assert!(matches!(err, ProcessorError::Strategy { stage: "generate_data", .. }));
        assert!(!p.contains(&level));
        assert!(!p.is_in_flight(e.id()));
        assert!(p.strategy().events().is_empty());

        // The next event retries.
        p.strategy().fail_generate.store(false, Ordering::SeqCst);
        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Added);
    }

    #[test]
    fn test_failed_validity_check_keeps_data() {
        let p = processor(&[], Tracker::default());
        let e = entity(1);
        let level = e.attach(Level(3)).unwrap();
        p.process_entity_component(&e, &level, false).unwrap();

        level.write(|l: &mut Level| l.0 = 4).unwrap();
        p.strategy().fail_generate.store(true, Ordering::SeqCst);
        let err = p.process_entity_component(&e, &level, false).unwrap_err();
        assert!(matches!(err, ProcessorError::Strategy { stage: "is_data_valid", .. }));
        assert!(p.contains(&level));
        assert_eq!(p.strategy().count("removed"), 0);

        p.strategy().fail_generate.store(false, Ordering::SeqCst);
        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Regenerated);
        assert_eq!(p.data_for(&level).as_deref(), Some(&4));
    }

    #[test]
    fn test_identity_strategy_never_regenerates() {
        let base = ProcessorBase::new(
            registry(),
            ProcessorConfig::new("levels"),
            Level::component_type_id(),
            &[],
        )
        .unwrap();
        let p: ComponentProcessor = EntityProcessor::new(base, IdentityStrategy::default());
        let e = entity(1);
        let level = e.attach(Level(3)).unwrap();

        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Added);
        assert_eq!(p.data_for(&level).as_deref(), Some(&level));

        level.write(|l: &mut Level| l.0 = 8).unwrap();
        assert_eq!(p.process_entity_component(&e, &level, false).unwrap(), Transition::Unchanged);
        assert_eq!(p.process_entity_component(&e, &level, true).unwrap(), Transition::Removed);
    }

    #[test]
    fn test_entries_are_ordered() {
        let p = processor(&[], Tracker::default());
        let (a, b) = (entity(1), entity(2));
        let la = a.attach(Level(1)).unwrap();
        let lb = b.attach(Level(2)).unwrap();
        p.process_entity_component(&b, &lb, false).unwrap();
        p.process_entity_component(&a, &la, false).unwrap();

        let entries = p.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].component, la);
        assert_eq!(entries[0].entity, a.id());
        assert_eq!(*entries[1].data, 2);
    }
}
