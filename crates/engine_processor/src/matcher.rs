//! Required-type matching.
//!
//! A processor's required types are a multiset of obligations. An entity
//! matches when every obligation can be filled by a *distinct* attached
//! component whose concrete type is assignable to it. Listing the same type
//! twice therefore demands two components of that type. This mirrors the
//! engine's historical behaviour and may not be what a signature author
//! expects.
//!
//! [`RequiredTypes::is_dependent_on_component_type`] answers the cheaper
//! question "can this concrete type ever fill one of my slots?" and memoizes
//! the verdict per concrete type for the lifetime of the processor.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use engine_component::{ComponentRef, ComponentTypeId, ComponentTypeRegistry};
use tracing::trace;

/// The required types of a processor plus their membership cache.
#[derive(Debug)]
pub struct RequiredTypes {
    types: Vec<ComponentTypeId>,
    /// Only allocated when `types` is non-empty. Append-only.
    dependency_cache: Option<RwLock<HashMap<ComponentTypeId, bool>>>,
}

impl RequiredTypes {
    /// Wrap a list of required types, preserving order and duplicates.
    #[must_use]
    pub fn new(types: Vec<ComponentTypeId>) -> Self {
        let dependency_cache = (!types.is_empty()).then(|| RwLock::new(HashMap::new()));
        Self {
            types,
            dependency_cache,
        }
    }

    /// The required types in declaration order.
    #[must_use]
    pub fn types(&self) -> &[ComponentTypeId] {
        &self.types
    }

    /// Returns `true` if there are no required types.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns `true` if the membership cache was allocated.
    #[must_use]
    pub fn has_cache(&self) -> bool {
        self.dependency_cache.is_some()
    }

    /// Number of concrete types with a memoized verdict.
    #[must_use]
    pub fn cached_verdicts(&self) -> usize {
        self.dependency_cache.as_ref().map_or(0, |cache| {
            cache.read().unwrap_or_else(PoisonError::into_inner).len()
        })
    }

    /// Could a component of kind `concrete` fill one of the required slots?
    ///
    /// Always `false` without required types.
    pub fn is_dependent_on_component_type(
        &self,
        registry: &ComponentTypeRegistry,
        concrete: ComponentTypeId,
    ) -> bool {
        let Some(cache) = &self.dependency_cache else {
            return false;
        };

        if let Some(&verdict) = cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&concrete)
        {
            return verdict;
        }

        let verdict = self
            .types
            .iter()
            .any(|&required| registry.is_assignable_from(required, concrete));
        trace!(%concrete, verdict, "cached required-type dependency");

        // A verdict computed by someone else in the meantime wins.
        *cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(concrete)
            .or_insert(verdict)
    }

    /// Can every required slot be filled by a distinct component in
    /// `components`?
    ///
    /// Always `true` without required types.
    #[must_use]
    pub fn entity_match(&self, registry: &ComponentTypeRegistry, components: &[ComponentRef]) -> bool {
        if self.types.is_empty() {
            return true;
        }
        if components.len() < self.types.len() {
            return false;
        }

        // assignment[slot] = index of the component filling it.
        let mut assignment: Vec<Option<usize>> = vec![None; self.types.len()];
        let mut remaining = self.types.len();

        for component in 0..components.len() {
            let mut visited = vec![false; self.types.len()];
            if self.assign(registry, components, component, &mut assignment, &mut visited) {
                remaining -= 1;
                if remaining == 0 {
                    return true;
                }
            }
        }

        false
    }

    /// Give `component` a slot, moving an earlier occupant to another slot if
    /// that is what it takes.
    fn assign(
        &self,
        registry: &ComponentTypeRegistry,
        components: &[ComponentRef],
        component: usize,
        assignment: &mut [Option<usize>],
        visited: &mut [bool],
    ) -> bool {
        let concrete = components[component].type_id();
        // Reverse index order, so trailing obligations are struck first.
        for slot in (0..self.types.len()).rev() {
            if visited[slot] || !registry.is_assignable_from(self.types[slot], concrete) {
                continue;
            }
            visited[slot] = true;
            let reroutable = match assignment[slot] {
                None => true,
                Some(occupant) => self.assign(registry, components, occupant, assignment, visited),
            };
            if reroutable {
                assignment[slot] = Some(component);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use engine_component::Component;

    use super::*;

    const COLLIDABLE: ComponentTypeId = ComponentTypeId::from_name("Collidable");

    struct A;
    impl Component for A {
        fn type_name() -> &'static str {
            "A"
        }
    }

    struct B;
    impl Component for B {
        fn type_name() -> &'static str {
            "B"
        }
        fn capabilities() -> &'static [ComponentTypeId] {
            &[COLLIDABLE]
        }
    }

    struct C;
    impl Component for C {
        fn type_name() -> &'static str {
            "C"
        }
        fn capabilities() -> &'static [ComponentTypeId] {
            &[COLLIDABLE]
        }
    }

    fn registry() -> ComponentTypeRegistry {
        let mut registry = ComponentTypeRegistry::new();
        registry.register_capability("Collidable", &[]).unwrap();
        registry.register::<A>().unwrap();
        registry.register::<B>().unwrap();
        registry.register::<C>().unwrap();
        registry
    }

    fn a() -> ComponentTypeId {
        A::component_type_id()
    }

    fn b() -> ComponentTypeId {
        B::component_type_id()
    }

    #[test]
    fn test_empty_requirements_always_match() {
        let registry = registry();
        let required = RequiredTypes::new(Vec::new());
        assert!(!required.has_cache());
        assert!(required.entity_match(&registry, &[]));
        assert!(required.entity_match(&registry, &[ComponentRef::new(A)]));
        assert!(!required.is_dependent_on_component_type(&registry, a()));
        assert_eq!(required.cached_verdicts(), 0);
    }

    #[test]
    fn test_all_slots_required() {
        let registry = registry();
        let required = RequiredTypes::new(vec![a(), b()]);
        assert!(!required.entity_match(&registry, &[ComponentRef::new(A)]));
        assert!(required.entity_match(&registry, &[ComponentRef::new(B), ComponentRef::new(A)]));
    }

    #[test]
    fn test_capability_slot() {
        let registry = registry();
        let required = RequiredTypes::new(vec![COLLIDABLE]);
        assert!(required.entity_match(&registry, &[ComponentRef::new(C)]));
        assert!(!required.entity_match(&registry, &[ComponentRef::new(A)]));
    }

    #[test]
    fn test_duplicate_types_need_distinct_components() {
        let registry = registry();
        let required = RequiredTypes::new(vec![a(), a()]);
        assert!(!required.entity_match(&registry, &[ComponentRef::new(A)]));
        assert!(required.entity_match(&registry, &[ComponentRef::new(A), ComponentRef::new(A)]));
    }

    #[test]
    fn test_assignment_is_rerouted() {
        let registry = registry();
        // B fits both slots, C only the capability slot. A greedy scan that
        // gave B the capability slot would strand the `B` slot.
        let required = RequiredTypes::new(vec![b(), COLLIDABLE]);
        assert!(required.entity_match(&registry, &[ComponentRef::new(B), ComponentRef::new(C)]));
        assert!(!required.entity_match(&registry, &[ComponentRef::new(C), ComponentRef::new(C)]));
    }

    #[test]
    fn test_dependency_is_memoized() {
        let registry = registry();
        let required = RequiredTypes::new(vec![COLLIDABLE]);
        assert!(required.has_cache());
        assert!(required.is_dependent_on_component_type(&registry, b()));
        assert!(!required.is_dependent_on_component_type(&registry, a()));
        assert_eq!(required.cached_verdicts(), 2);

        // Asking again does not add entries.
        assert!(required.is_dependent_on_component_type(&registry, b()));
        assert_eq!(required.cached_verdicts(), 2);
    }
}
