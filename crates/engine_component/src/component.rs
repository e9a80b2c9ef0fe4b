//! Core [`Component`] trait and type identity.
//!
//! Every piece of data attached to an entity implements [`Component`]. The
//! trait requires `Send + Sync + 'static` so component handles can be shared
//! freely between the entity, the manager and every processor that caches
//! derived data for it.
//!
//! ## Type identity
//!
//! [`ComponentTypeId`] is derived from a **string name** using the FNV-1a
//! 64-bit hash. The same id space is used for concrete component kinds
//! (`"Transform"`) and for capability tags (`"Renderable"`), so a processor
//! can require either one. Because the hash is a `const fn`, capability tags
//! can be declared as constants:
//!
//! ```rust
//! use engine_component::ComponentTypeId;
//!
//! const RENDERABLE: ComponentTypeId = ComponentTypeId::from_name("Renderable");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A unique identifier for a component type or capability tag, derived from
/// its name with the FNV-1a 64-bit hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] for a name.
    ///
    /// # Algorithm (FNV-1a 64-bit)
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// return hash
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use engine_component::{Component, ComponentTypeId};
///
/// const AUDIBLE: ComponentTypeId = ComponentTypeId::from_name("Audible");
///
/// #[derive(Debug, Clone)]
/// struct AudioEmitter {
///     volume: f32,
/// }
///
/// impl Component for AudioEmitter {
///     fn type_name() -> &'static str { "AudioEmitter" }
///     fn capabilities() -> &'static [ComponentTypeId] { &[AUDIBLE] }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// A human-readable, unique name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    ///
    /// The default implementation hashes [`Component::type_name()`].
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    /// Capability tags this component kind carries, in addition to its own
    /// type id. Each tag must be declared in the registry before the kind is
    /// registered.
    fn capabilities() -> &'static [ComponentTypeId] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Health;

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_component_type_id_is_stable() {
        let id1 = Health::component_type_id();
        let id2 = Health::component_type_id();
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_component_type_id_matches_from_name() {
        assert_eq!(Health::component_type_id(), ComponentTypeId::from_name("Health"));
        assert_eq!(ComponentTypeId::of::<Health>(), ComponentTypeId::from_name("Health"));
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a 64-bit of the empty string is the offset basis itself.
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
    }

    #[test]
    fn test_capability_ids_are_const() {
        const RENDERABLE: ComponentTypeId = ComponentTypeId::from_name("Renderable");
        assert_eq!(RENDERABLE, ComponentTypeId::from_name("Renderable"));
        assert_ne!(RENDERABLE, Health::component_type_id());
    }

    #[test]
    fn test_default_capabilities_empty() {
        assert!(Health::capabilities().is_empty());
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(ComponentTypeId(0xff).to_string(), "0x00000000000000ff");
    }

    #[test]
    fn test_type_id_serde_roundtrip() {
        let id = ComponentTypeId::from_name("Health");
        let json = serde_json::to_string(&id).unwrap();
        let restored: ComponentTypeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
