//! Component-layer error types.

use crate::component::ComponentTypeId;
use crate::entity::EntityId;
use crate::instance::ComponentId;

/// Errors raised by the type registry, component handles and entities.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// A component kind declared a capability that was never registered.
    #[error("component '{component}' declares unknown capability {capability}")]
    UnknownCapability {
        /// The component kind being registered.
        component: &'static str,
        /// The undeclared capability tag.
        capability: ComponentTypeId,
    },

    /// Two different names hashed to the same [`ComponentTypeId`].
    #[error("type id {id} of '{name}' collides with already registered '{existing}'")]
    TypeIdCollision {
        /// The colliding id.
        id: ComponentTypeId,
        /// The name being registered.
        name: String,
        /// The name already registered under `id`.
        existing: String,
    },

    /// Typed access asked for a different Rust type than the one stored.
    #[error("component {id} holds '{actual}', not '{expected}'")]
    TypeMismatch {
        /// The instance being accessed.
        id: ComponentId,
        /// The requested type name.
        expected: &'static str,
        /// The stored type name.
        actual: &'static str,
    },

    /// The component is not attached to the entity.
    #[error("component {component} is not attached to {entity}")]
    NotAttached {
        /// The entity that was searched.
        entity: EntityId,
        /// The missing component.
        component: ComponentId,
    },

    /// Linking the child would make an entity its own ancestor.
    #[error("{child} is {parent} or one of its ancestors")]
    HierarchyCycle {
        /// The would-be parent.
        parent: EntityId,
        /// The rejected child.
        child: EntityId,
    },

    /// The entity's observer failed while handling a component event.
    #[error("component event dispatch failed: {0}")]
    Dispatch(#[source] anyhow::Error),
}
