//! Component instances.
//!
//! A [`ComponentRef`] is a cheap, clonable handle to one component value.
//! Processors key their derived data by instance identity, so two handles are
//! equal iff they were cloned from the same [`ComponentRef::new`] call, never
//! because their values happen to be equal.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};
use crate::error::ComponentError;

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.0)
    }
}

/// A shared handle to one component instance.
#[derive(Clone)]
pub struct ComponentRef {
    id: ComponentId,
    type_id: ComponentTypeId,
    type_name: &'static str,
    rust_type: TypeId,
    value: Arc<RwLock<dyn Any + Send + Sync>>,
}

impl ComponentRef {
    /// Wrap a component value in a new instance with a fresh identity.
    #[must_use]
    pub fn new<T: Component>(value: T) -> Self {
        Self {
            id: ComponentId(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed)),
            type_id: T::component_type_id(),
            type_name: T::type_name(),
            rust_type: TypeId::of::<T>(),
            value: Arc::new(RwLock::new(value)),
        }
    }

    /// The instance identity.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The concrete component type of this instance.
    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// The concrete component type name of this instance.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the stored value is a `T`.
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.rust_type == TypeId::of::<T>()
    }

    /// Run `f` with shared access to the value.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::TypeMismatch`] if the value is not a `T`.
    pub fn read<T: Component, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, ComponentError> {
        let guard = self.value.read().unwrap_or_else(PoisonError::into_inner);
        let value = guard
            .downcast_ref::<T>()
            .ok_or_else(|| self.mismatch::<T>())?;
        Ok(f(value))
    }

    /// Run `f` with exclusive access to the value.
    ///
    /// Mutating a component does not notify anyone; call
    /// [`Entity::notify_changed`](crate::Entity::notify_changed) afterwards so
    /// processors can revalidate their cached data.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::TypeMismatch`] if the value is not a `T`.
    pub fn write<T: Component, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, ComponentError> {
        let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
        let value = guard
            .downcast_mut::<T>()
            .ok_or_else(|| self.mismatch::<T>())?;
        Ok(f(value))
    }

    /// Clone the value out.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::TypeMismatch`] if the value is not a `T`.
    pub fn get<T: Component + Clone>(&self) -> Result<T, ComponentError> {
        self.read(T::clone)
    }

    fn mismatch<T: Component>(&self) -> ComponentError {
        ComponentError::TypeMismatch {
            id: self.id,
            expected: T::type_name(),
            actual: self.type_name,
        }
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentRef {}

impl Hash for ComponentRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("id", &self.id.0)
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}
