//! State shared by every processor: signature, scheduling flags and the
//! link back to the manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use engine_component::{ComponentRef, ComponentTypeId, ComponentTypeRegistry, Entity};
use tracing::{debug, info};

use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::matcher::RequiredTypes;

/// The manager-side surface a processor may call back into.
pub trait EntityHost: Send + Sync {
    /// Make `entity` (and its children) live.
    fn add_entity(&self, entity: &Entity) -> anyhow::Result<()>;

    /// Remove `entity` (and its children) from the live set, optionally
    /// unlinking it from its parent.
    fn remove_entity(&self, entity: &Entity, detach_from_parent: bool) -> anyhow::Result<()>;
}

/// Signature, flags and host link of one processor.
pub struct ProcessorBase {
    name: String,
    order: i32,
    enabled: AtomicBool,
    main_type: ComponentTypeId,
    required: RequiredTypes,
    registry: Arc<ComponentTypeRegistry>,
    host: RwLock<Option<Weak<dyn EntityHost>>>,
}

impl ProcessorBase {
    /// Validate a processor signature against `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::InvalidArgument`] for an empty name and
    /// [`ProcessorError::UnknownComponentType`] if the main type or any
    /// required type is not registered.
    pub fn new(
        registry: Arc<ComponentTypeRegistry>,
        config: ProcessorConfig,
        main_type: ComponentTypeId,
        required_types: &[ComponentTypeId],
    ) -> Result<Self, ProcessorError> {
        if config.name.trim().is_empty() {
            return Err(ProcessorError::InvalidArgument {
                processor: config.name,
                message: "processor name must not be empty".to_string(),
            });
        }
        if !registry.contains(main_type) {
            return Err(ProcessorError::UnknownComponentType {
                processor: config.name,
                type_id: main_type,
                role: "main type",
            });
        }
        if let Some(&unknown) = required_types.iter().find(|&&t| !registry.contains(t)) {
            return Err(ProcessorError::UnknownComponentType {
                processor: config.name,
                type_id: unknown,
                role: "required type",
            });
        }

        debug!(
            processor = config.name,
            main_type = registry.name_of(main_type).unwrap_or("?"),
            required = required_types.len(),
            "processor signature validated"
        );

        Ok(Self {
            name: config.name,
            order: config.order,
            enabled: AtomicBool::new(config.enabled),
            main_type,
            required: RequiredTypes::new(required_types.to_vec()),
            registry,
            host: RwLock::new(None),
        })
    }

    /// Processor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scheduling order; lower runs first.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Whether per-frame update/draw should run.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Toggle per-frame update/draw. Classification is unaffected.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// The component type this processor tracks.
    #[must_use]
    pub fn main_component_type(&self) -> ComponentTypeId {
        self.main_type
    }

    /// The additional types an entity must carry.
    #[must_use]
    pub fn required_types(&self) -> &RequiredTypes {
        &self.required
    }

    /// `true` iff there is at least one required type.
    #[must_use]
    pub fn has_required_components(&self) -> bool {
        !self.required.is_empty()
    }

    /// The registry the signature was validated against.
    #[must_use]
    pub fn registry(&self) -> &ComponentTypeRegistry {
        &self.registry
    }

    /// Is `concrete` the main type or a kind carrying it?
    #[must_use]
    pub fn accept(&self, concrete: ComponentTypeId) -> bool {
        self.registry.is_assignable_from(self.main_type, concrete)
    }

    /// Could a component of kind `concrete` fill a required slot?
    pub fn is_dependent_on_component_type(&self, concrete: ComponentTypeId) -> bool {
        self.required
            .is_dependent_on_component_type(&self.registry, concrete)
    }

    /// Does `entity` currently satisfy every required slot?
    #[must_use]
    pub fn entity_match(&self, entity: &Entity) -> bool {
        if self.required.is_empty() {
            return true;
        }
        let components: Vec<ComponentRef> = entity.components();
        self.required.entity_match(&self.registry, &components)
    }

    /// Store the manager link. Called from `on_system_add`.
    pub fn attach_host(&self, host: Weak<dyn EntityHost>) {
        *self.host.write().unwrap_or_else(PoisonError::into_inner) = Some(host);
        info!(processor = self.name, "processor registered");
    }

    /// Drop the manager link. Called from `on_system_remove`.
    pub fn detach_host(&self) {
        *self.host.write().unwrap_or_else(PoisonError::into_inner) = None;
        info!(processor = self.name, "processor unregistered");
    }

    /// Returns `true` while a live manager is attached.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.host().is_some()
    }

    fn host(&self) -> Option<Arc<dyn EntityHost>> {
        self.host
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Ask the manager to make `entity` live.
    ///
    /// # Errors
    ///
    /// [`ProcessorError::NotRegistered`] without a manager,
    /// [`ProcessorError::Host`] if the manager refuses.
    pub fn add_entity(&self, entity: &Entity) -> Result<(), ProcessorError> {
        let host = self
            .host()
            .ok_or_else(|| ProcessorError::NotRegistered(self.name.clone()))?;
        host.add_entity(entity).map_err(ProcessorError::Host)
    }

    /// Ask the manager to remove `entity`.
    ///
    /// # Errors
    ///
    /// [`ProcessorError::NotRegistered`] without a manager,
    /// [`ProcessorError::Host`] if the manager refuses.
    pub fn remove_entity(&self, entity: &Entity, detach_from_parent: bool) -> Result<(), ProcessorError> {
        let host = self
            .host()
            .ok_or_else(|| ProcessorError::NotRegistered(self.name.clone()))?;
        host.remove_entity(entity, detach_from_parent)
            .map_err(ProcessorError::Host)
    }
}

impl std::fmt::Debug for ProcessorBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorBase")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("enabled", &self.is_enabled())
            .field("main_type", &self.main_type)
            .field("required", &self.required.types())
            .finish_non_exhaustive()
    }
}
