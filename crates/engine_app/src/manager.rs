//! The entity manager: live entity set, ordered processors and component
//! event dispatch.
//!
//! The manager observes every live entity. Component events are routed
//! synchronously, on the caller's stack, to the processors that accept the
//! component's type (the component itself is re-evaluated) and to the
//! processors that depend on it (the entity's main components are
//! re-classified). Processor callbacks may attach or detach components,
//! which re-enters the manager; no lock is held while a processor runs.

#![allow(dead_code)]

use std::sync::{Arc, PoisonError, RwLock, Weak};

use dashmap::DashMap;
use engine_component::{ComponentRef, ComponentTypeRegistry, Entity, EntityId, EntityObserver};
use engine_processor::{EntityHost, GameTime, Processor, RenderContext};
use tracing::{debug, info};

use crate::error::ManagerError;

/// Owns the live entity set and the processors that track it.
pub struct EntityManager {
    registry: Arc<ComponentTypeRegistry>,
    processors: RwLock<Vec<Arc<dyn Processor>>>,
    entities: DashMap<EntityId, Entity>,
    this: Weak<EntityManager>,
}

impl EntityManager {
    /// Create an empty manager over a finished registry.
    #[must_use]
    pub fn new(registry: Arc<ComponentTypeRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            registry,
            processors: RwLock::new(Vec::new()),
            entities: DashMap::new(),
            this: this.clone(),
        })
    }

    /// The component type registry processors were validated against.
    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentTypeRegistry> {
        &self.registry
    }

    /// Snapshot of the processors in scheduling order.
    #[must_use]
    pub fn processors(&self) -> Vec<Arc<dyn Processor>> {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Look up a processor by name.
    #[must_use]
    pub fn processor(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// Processor names in scheduling order.
    #[must_use]
    pub fn processor_names(&self) -> Vec<String> {
        self.processors().iter().map(|p| p.name().to_string()).collect()
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if `id` is live.
    #[must_use]
    pub fn is_live(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Live entities ordered by id.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.entities.iter().map(|e| e.value().clone()).collect();
        entities.sort_by_key(Entity::id);
        entities
    }

    /// Register a processor and classify every live entity against it.
    ///
    /// Processors with equal `order` keep their registration order.
    ///
    /// # Errors
    ///
    /// [`ManagerError::DuplicateProcessor`] if the name is taken, or the
    /// processor's failure from `on_system_add` (the processor is not kept)
    /// or from the initial classification (the processor stays registered).
    pub fn add_processor(&self, processor: Arc<dyn Processor>) -> Result<(), ManagerError> {
        {
            let mut processors = self.processors.write().unwrap_or_else(PoisonError::into_inner);
            if processors.iter().any(|p| p.name() == processor.name()) {
                return Err(ManagerError::DuplicateProcessor(processor.name().to_string()));
            }
            let at = processors.partition_point(|p| p.order() <= processor.order());
            processors.insert(at, Arc::clone(&processor));
        }

        let host: Weak<dyn EntityHost> = self.this.clone();
        if let Err(e) = processor.on_system_add(host) {
            self.unlink(processor.name());
            return Err(e.into());
        }

        info!(
            processor = processor.name(),
            order = processor.order(),
            enabled = processor.is_enabled(),
            "processor added"
        );

        for entity in self.entities() {
            for component in entity.components() {
                if processor.accept(component.type_id()) {
                    processor.process_entity_component(&entity, &component, false)?;
                }
            }
        }
        Ok(())
    }

    /// Deregister a processor.
    ///
    /// # Errors
    ///
    /// [`ManagerError::UnknownProcessor`], or the processor's teardown
    /// failure (it is deregistered regardless).
    pub fn remove_processor(&self, name: &str) -> Result<Arc<dyn Processor>, ManagerError> {
        let processor = self
            .unlink(name)
            .ok_or_else(|| ManagerError::UnknownProcessor(name.to_string()))?;
        processor.on_system_remove()?;
        info!(processor = name, "processor removed");
        Ok(processor)
    }

    fn unlink(&self, name: &str) -> Option<Arc<dyn Processor>> {
        let mut processors = self.processors.write().unwrap_or_else(PoisonError::into_inner);
        let index = processors.iter().position(|p| p.name() == name)?;
        Some(processors.remove(index))
    }

    /// Make `entity` and its descendants live and dispatch their components.
    ///
    /// Descendants that are already live are left as they are.
    ///
    /// # Errors
    ///
    /// [`ManagerError::EntityAlreadyLive`] for the root,
    /// [`ManagerError::UnregisteredComponent`] (nothing is made live), or a
    /// processor failure during dispatch.
    pub fn add_entity(&self, entity: &Entity) -> Result<(), ManagerError> {
        if self.is_live(entity.id()) {
            return Err(ManagerError::EntityAlreadyLive(entity.id()));
        }

        let incoming: Vec<Entity> = entity
            .descendants_and_self()
            .into_iter()
            .filter(|e| !self.is_live(e.id()))
            .collect();
        for e in &incoming {
            for component in e.components() {
                self.check_registered(&component)?;
            }
        }

        let observer: Weak<dyn EntityObserver> = self.this.clone();
        for e in &incoming {
            self.entities.insert(e.id(), e.clone());
            e.set_observer(Some(observer.clone()));
            debug!(entity = %e.id(), name = e.name(), "entity added");
        }
        for e in &incoming {
            for component in e.components() {
                self.dispatch(e, &component, false)?;
            }
        }
        Ok(())
    }

    /// Take `entity` and its descendants out of the live set, dropping every
    /// processor's data for their components.
    ///
    /// # Errors
    ///
    /// [`ManagerError::EntityNotLive`], or a processor failure while
    /// force-removing.
    pub fn remove_entity(&self, entity: &Entity, detach_from_parent: bool) -> Result<(), ManagerError> {
        if !self.is_live(entity.id()) {
            return Err(ManagerError::EntityNotLive(entity.id()));
        }

        for e in entity.descendants_and_self() {
            if self.entities.remove(&e.id()).is_none() {
                continue;
            }
            e.set_observer(None);
            for component in e.components() {
                for processor in self.processors() {
                    if processor.accept(component.type_id()) {
                        processor.process_entity_component(&e, &component, true)?;
                    }
                }
            }
            debug!(entity = %e.id(), name = e.name(), "entity removed");
        }

        if detach_from_parent {
            entity.detach_from_parent();
        }
        Ok(())
    }

    /// Run `update` on enabled processors in order.
    ///
    /// # Errors
    ///
    /// The first processor failure; later processors are skipped.
    pub fn update(&self, time: &GameTime) -> Result<(), ManagerError> {
        for processor in self.processors().iter().filter(|p| p.is_enabled()) {
            processor.update(time)?;
        }
        Ok(())
    }

    /// Run `draw` on enabled processors in order.
    ///
    /// # Errors
    ///
    /// The first processor failure; later processors are skipped.
    pub fn draw(&self, context: &RenderContext) -> Result<(), ManagerError> {
        for processor in self.processors().iter().filter(|p| p.is_enabled()) {
            processor.draw(context)?;
        }
        Ok(())
    }

    fn check_registered(&self, component: &ComponentRef) -> Result<(), ManagerError> {
        if self.registry.is_concrete(component.type_id()) {
            Ok(())
        } else {
            Err(ManagerError::UnregisteredComponent {
                component: component.id(),
                type_name: component.type_name(),
            })
        }
    }

    /// Route one component event. `removed` forces accepting processors to
    /// drop the component's data.
    fn dispatch(&self, entity: &Entity, component: &ComponentRef, removed: bool) -> Result<(), ManagerError> {
        let type_id = component.type_id();
        for processor in self.processors() {
            let accepted = processor.accept(type_id);
            if accepted {
                processor.process_entity_component(entity, component, removed)?;
            }
            if processor.is_dependent_on_component_type(type_id) {
                for main in entity.components() {
                    if accepted && main == *component {
                        continue;
                    }
                    if processor.accept(main.type_id()) {
                        processor.process_entity_component(entity, &main, false)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn on_component_event(&self, entity: &Entity, component: &ComponentRef, removed: bool) -> anyhow::Result<()> {
        if !self.is_live(entity.id()) {
            return Ok(());
        }
        if !removed {
            self.check_registered(component)?;
        }
        self.dispatch(entity, component, removed)?;
        Ok(())
    }
}

impl EntityObserver for EntityManager {
    fn component_added(&self, entity: &Entity, component: &ComponentRef) -> anyhow::Result<()> {
        self.on_component_event(entity, component, false)
    }

    fn component_removed(&self, entity: &Entity, component: &ComponentRef) -> anyhow::Result<()> {
        self.on_component_event(entity, component, true)
    }

    fn component_changed(&self, entity: &Entity, component: &ComponentRef) -> anyhow::Result<()> {
        self.on_component_event(entity, component, false)
    }
}

impl EntityHost for EntityManager {
    fn add_entity(&self, entity: &Entity) -> anyhow::Result<()> {
        Ok(EntityManager::add_entity(self, entity)?)
    }

    fn remove_entity(&self, entity: &Entity, detach_from_parent: bool) -> anyhow::Result<()> {
        Ok(EntityManager::remove_entity(self, entity, detach_from_parent)?)
    }
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("processors", &self.processor_names())
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}
