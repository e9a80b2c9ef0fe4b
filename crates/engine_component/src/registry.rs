//! Component type registry: capability tags and "is-assignable-from".
//!
//! Processors declare the component types they care about as
//! [`ComponentTypeId`]s. A declared id may name a concrete component kind or
//! a capability. The registry resolves, for every concrete kind, the full set
//! of tags it carries:
//!
//! ```text
//! tags(T) = { id(T) } ∪ capabilities(T) ∪ (capabilities those extend, transitively)
//! ```
//!
//! A descriptor `A` is assignable from a concrete kind `T` iff `A ∈ tags(T)`.
//!
//! The registry is built mutably during startup and then shared read-only
//! behind an `Arc`.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::component::{Component, ComponentTypeId};
use crate::error::ComponentError;

/// Whether a registered id names a concrete component kind or a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A Rust type implementing [`Component`].
    Concrete,
    /// An interface-like tag carried by concrete kinds.
    Capability,
}

/// Registry entry for one concrete kind or capability.
#[derive(Debug, Clone)]
pub struct ComponentTypeInfo {
    /// The registered id.
    pub id: ComponentTypeId,
    /// The name the id was derived from.
    pub name: String,
    /// Concrete kind or capability.
    pub kind: TypeKind,
    /// Every tag this entry satisfies, including its own id.
    pub tags: BTreeSet<ComponentTypeId>,
}

/// Registry of component kinds and capabilities known to the engine.
#[derive(Debug, Default)]
pub struct ComponentTypeRegistry {
    types: HashMap<ComponentTypeId, ComponentTypeInfo>,
}

impl ComponentTypeRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Declare a capability tag, optionally extending other capabilities.
    ///
    /// Re-declaring an existing capability with the same name is a no-op that
    /// returns the same id.
    ///
    /// # Errors
    ///
    /// Fails if a parent capability is unknown or if the name's id collides
    /// with a differently-named entry.
    pub fn register_capability(
        &mut self,
        name: &str,
        extends: &[ComponentTypeId],
    ) -> Result<ComponentTypeId, ComponentError> {
        let id = ComponentTypeId::from_name(name);
        if let Some(existing) = self.check_existing(id, name)? {
            return Ok(existing);
        }

        let mut tags = BTreeSet::from([id]);
        for parent in extends {
            match self.types.get(parent) {
                Some(info) if info.kind == TypeKind::Capability => {
                    tags.extend(info.tags.iter().copied());
                }
                _ => {
                    return Err(ComponentError::UnknownCapability {
                        component: "<capability>",
                        capability: *parent,
                    });
                }
            }
        }

        debug!(capability = name, %id, "registered capability");
        self.types.insert(
            id,
            ComponentTypeInfo {
                id,
                name: name.to_string(),
                kind: TypeKind::Capability,
                tags,
            },
        );
        Ok(id)
    }

    /// Register a concrete component kind and resolve its tag set.
    ///
    /// # Errors
    ///
    /// Fails if one of `T::capabilities()` is not a registered capability, or
    /// if `T`'s id collides with a differently-named entry.
    pub fn register<T: Component>(&mut self) -> Result<ComponentTypeId, ComponentError> {
        let id = T::component_type_id();
        let name = T::type_name();
        if let Some(existing) = self.check_existing(id, name)? {
            return Ok(existing);
        }

        let mut tags = BTreeSet::from([id]);
        for capability in T::capabilities() {
            match self.types.get(capability) {
                Some(info) if info.kind == TypeKind::Capability => {
                    tags.extend(info.tags.iter().copied());
                }
                _ => {
                    return Err(ComponentError::UnknownCapability {
                        component: name,
                        capability: *capability,
                    });
                }
            }
        }

        debug!(component = name, %id, tags = tags.len(), "registered component type");
        self.types.insert(
            id,
            ComponentTypeInfo {
                id,
                name: name.to_string(),
                kind: TypeKind::Concrete,
                tags,
            },
        );
        Ok(id)
    }

    fn check_existing(
        &self,
        id: ComponentTypeId,
        name: &str,
    ) -> Result<Option<ComponentTypeId>, ComponentError> {
        match self.types.get(&id) {
            Some(info) if info.name == name => Ok(Some(id)),
            Some(info) => Err(ComponentError::TypeIdCollision {
                id,
                name: name.to_string(),
                existing: info.name.clone(),
            }),
            None => Ok(None),
        }
    }

    /// Returns `true` if `id` names a registered component kind or capability.
    #[must_use]
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.types.contains_key(&id)
    }

    /// Returns `true` if `id` names a registered concrete component kind.
    #[must_use]
    pub fn is_concrete(&self, id: ComponentTypeId) -> bool {
        self.types
            .get(&id)
            .is_some_and(|info| info.kind == TypeKind::Concrete)
    }

    /// Does `descriptor` match components of kind `concrete`?
    ///
    /// `concrete` must name a registered concrete kind; capability and
    /// unknown ids match nothing.
    #[must_use]
    pub fn is_assignable_from(&self, descriptor: ComponentTypeId, concrete: ComponentTypeId) -> bool {
        self.types
            .get(&concrete)
            .is_some_and(|info| info.kind == TypeKind::Concrete && info.tags.contains(&descriptor))
    }

    /// Returns the registry entry for `id`.
    #[must_use]
    pub fn get(&self, id: ComponentTypeId) -> Option<&ComponentTypeInfo> {
        self.types.get(&id)
    }

    /// Returns the registered name for `id`.
    #[must_use]
    pub fn name_of(&self, id: ComponentTypeId) -> Option<&str> {
        self.types.get(&id).map(|info| info.name.as_str())
    }

    /// Returns the number of registered kinds and capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
