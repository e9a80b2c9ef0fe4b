//! Per-entity in-flight guard for the Absent → Present transition.

use dashmap::DashSet;
use engine_component::EntityId;

/// Entities whose component data is currently being generated.
#[derive(Debug, Default)]
pub struct InFlightSet {
    entities: DashSet<EntityId>,
}

impl InFlightSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: DashSet::new(),
        }
    }

    /// Mark `entity` as in flight.
    ///
    /// Returns `None` if it already is. The mark is cleared when the returned
    /// guard is dropped, including during unwinding.
    #[must_use]
    pub fn try_acquire(&self, entity: EntityId) -> Option<InFlightGuard<'_>> {
        self.entities
            .insert(entity)
            .then(|| InFlightGuard { set: self, entity })
    }

    /// Returns `true` if `entity` is in flight.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity)
    }

    /// Number of entities in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Clears an entity's in-flight mark on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    set: &'a InFlightSet,
    entity: EntityId,
}

impl InFlightGuard<'_> {
    /// The guarded entity.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.entities.remove(&self.entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let set = InFlightSet::new();
        let guard = set.try_acquire(EntityId(1)).unwrap();
        assert_eq!(guard.entity(), EntityId(1));
        assert!(set.try_acquire(EntityId(1)).is_none());
        // Other entities are unaffected.
        assert!(set.try_acquire(EntityId(2)).is_some());
        drop(guard);
        assert!(set.is_empty());
        assert!(set.try_acquire(EntityId(1)).is_some());
    }

    #[test]
    fn test_released_on_unwind() {
        let set = InFlightSet::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = set.try_acquire(EntityId(3)).unwrap();
            panic!("generation failed");
        }));
        assert!(result.is_err());
        assert!(!set.contains(EntityId(3)));
    }
}
