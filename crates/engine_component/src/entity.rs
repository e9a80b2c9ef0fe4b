//! Entities and entity identifiers.
//!
//! An [`Entity`] is a shared handle to an ordered list of attached
//! components, plus an optional parent and ordered children. Entities are
//! owned by whoever created them; a manager that wants to hear about
//! component changes installs itself as the entity's [`EntityObserver`].
//!
//! Component events are delivered synchronously, on the caller's stack, after
//! the entity's own bookkeeping is updated and with no entity lock held. An
//! observer may therefore mutate the same entity again from inside the
//! notification.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};
use crate::error::ComponentError;
use crate::instance::ComponentRef;

/// A unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The null / invalid entity sentinel.
    pub const INVALID: EntityId = EntityId(0);

    /// Create an entity id from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) id.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates monotonically increasing entity ids.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: AtomicU64,
}

impl EntityAllocator {
    /// Creates a new allocator. Ids start at 1 (0 is [`EntityId::INVALID`]).
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh entity id.
    pub fn allocate(&self) -> EntityId {
        EntityId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the number of ids allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives component events from the entities it observes.
pub trait EntityObserver: Send + Sync {
    /// `component` was appended to `entity`.
    fn component_added(&self, entity: &Entity, component: &ComponentRef) -> anyhow::Result<()>;

    /// `component` was detached from `entity`.
    fn component_removed(&self, entity: &Entity, component: &ComponentRef) -> anyhow::Result<()>;

    /// `component`, still attached to `entity`, was mutated.
    fn component_changed(&self, entity: &Entity, component: &ComponentRef) -> anyhow::Result<()>;
}

struct EntityInner {
    id: EntityId,
    name: String,
    components: RwLock<Vec<ComponentRef>>,
    parent: RwLock<Option<Weak<EntityInner>>>,
    children: RwLock<Vec<Entity>>,
    observer: RwLock<Option<Weak<dyn EntityObserver>>>,
}

fn read<T: ?Sized>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T: ?Sized>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A shared handle to an entity. Clones refer to the same entity.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    /// Create an entity with no components.
    #[must_use]
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                id,
                name: name.into(),
                components: RwLock::new(Vec::new()),
                parent: RwLock::new(None),
                children: RwLock::new(Vec::new()),
                observer: RwLock::new(None),
            }),
        }
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// Returns the entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Snapshot of the attached components, in attachment order.
    #[must_use]
    pub fn components(&self) -> Vec<ComponentRef> {
        read(&self.inner.components).clone()
    }

    /// Number of attached components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        read(&self.inner.components).len()
    }

    /// Returns `true` if `component` is attached to this entity.
    #[must_use]
    pub fn contains(&self, component: &ComponentRef) -> bool {
        read(&self.inner.components).contains(component)
    }

    /// The first attached component of kind `T`.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<ComponentRef> {
        self.get_by_type(T::component_type_id())
    }

    /// The first attached component whose concrete type is `type_id`.
    #[must_use]
    pub fn get_by_type(&self, type_id: ComponentTypeId) -> Option<ComponentRef> {
        read(&self.inner.components)
            .iter()
            .find(|c| c.type_id() == type_id)
            .cloned()
    }

    /// Attach a component and notify the observer.
    ///
    /// Attaching an instance that is already attached is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Dispatch`] if the observer fails. The
    /// component stays attached.
    pub fn add_component(&self, component: ComponentRef) -> Result<(), ComponentError> {
        {
            let mut components = write(&self.inner.components);
            if components.contains(&component) {
                return Ok(());
            }
            components.push(component.clone());
        }
        match self.observer() {
            Some(observer) => observer
                .component_added(self, &component)
                .map_err(ComponentError::Dispatch),
            None => Ok(()),
        }
    }

    /// Wrap `value` in a new instance, attach it and return the handle.
    ///
    /// # Errors
    ///
    /// See [`Entity::add_component`].
    pub fn attach<T: Component>(&self, value: T) -> Result<ComponentRef, ComponentError> {
        let component = ComponentRef::new(value);
        self.add_component(component.clone())?;
        Ok(component)
    }

    /// Detach a component and notify the observer.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NotAttached`] if the component is not on this
    /// entity, or [`ComponentError::Dispatch`] if the observer fails (the
    /// component stays detached).
    pub fn remove_component(&self, component: &ComponentRef) -> Result<(), ComponentError> {
        {
            let mut components = write(&self.inner.components);
            let index = components
                .iter()
                .position(|c| c == component)
                .ok_or(ComponentError::NotAttached {
                    entity: self.id(),
                    component: component.id(),
                })?;
            components.remove(index);
        }
        match self.observer() {
            Some(observer) => observer
                .component_removed(self, component)
                .map_err(ComponentError::Dispatch),
            None => Ok(()),
        }
    }

    /// Tell the observer that an attached component was mutated.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NotAttached`] if the component is not on this
    /// entity, or [`ComponentError::Dispatch`] if the observer fails.
    pub fn notify_changed(&self, component: &ComponentRef) -> Result<(), ComponentError> {
        if !self.contains(component) {
            return Err(ComponentError::NotAttached {
                entity: self.id(),
                component: component.id(),
            });
        }
        match self.observer() {
            Some(observer) => observer
                .component_changed(self, component)
                .map_err(ComponentError::Dispatch),
            None => Ok(()),
        }
    }

    /// Install or clear the observer.
    pub fn set_observer(&self, observer: Option<Weak<dyn EntityObserver>>) {
        *write(&self.inner.observer) = observer;
    }

    /// The current observer, if one is installed and still alive.
    #[must_use]
    pub fn observer(&self) -> Option<Arc<dyn EntityObserver>> {
        read(&self.inner.observer).as_ref().and_then(Weak::upgrade)
    }

    /// The parent entity, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Entity> {
        read(&self.inner.parent)
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Entity { inner })
    }

    /// Snapshot of the children, in insertion order.
    #[must_use]
    pub fn children(&self) -> Vec<Entity> {
        read(&self.inner.children).clone()
    }

    /// Make `child` a child of this entity, detaching it from its previous
    /// parent first.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::HierarchyCycle`] if `child` is this entity or
    /// one of its ancestors; the hierarchy is left untouched.
    pub fn add_child(&self, child: &Entity) -> Result<(), ComponentError> {
        if self.has_ancestor_or_self(child) {
            return Err(ComponentError::HierarchyCycle {
                parent: self.id(),
                child: child.id(),
            });
        }
        child.detach_from_parent();
        *write(&child.inner.parent) = Some(Arc::downgrade(&self.inner));
        write(&self.inner.children).push(child.clone());
        Ok(())
    }

    fn has_ancestor_or_self(&self, entity: &Entity) -> bool {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node == *entity {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Unlink `child` from this entity. Returns `false` if it was not a child.
    pub fn remove_child(&self, child: &Entity) -> bool {
        let removed = {
            let mut children = write(&self.inner.children);
            let before = children.len();
            children.retain(|c| c != child);
            children.len() != before
        };
        if removed {
            *write(&child.inner.parent) = None;
        }
        removed
    }

    /// Unlink this entity from its parent, if it has one.
    pub fn detach_from_parent(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    /// This entity followed by all of its descendants, breadth first.
    #[must_use]
    pub fn descendants_and_self(&self) -> Vec<Entity> {
        let mut out = vec![self.clone()];
        let mut index = 0;
        while index < out.len() {
            let children = out[index].children();
            out.extend(children);
            index += 1;
        }
        out
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.inner.id.0)
            .field("name", &self.inner.name)
            .field("components", &self.component_count())
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.inner.id, self.inner.name)
    }
}
