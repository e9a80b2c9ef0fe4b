//! # engine_component
//!
//! The "C" in the engine's entity/component model: what a component is, how
//! its type is identified, and how entities carry component instances.
//!
//! This crate provides:
//!
//! - [`Component`] trait: the contract all component data must satisfy.
//! - [`ComponentTypeId`]: deterministic, name-derived type handles shared by
//!   concrete component kinds and capability tags.
//! - [`ComponentTypeRegistry`]: maps every concrete kind to the capability
//!   tags it carries and answers "is-assignable-from" queries.
//! - [`ComponentRef`]: a shared handle to one component instance.
//! - [`Entity`]: a shared handle to an ordered set of attached components,
//!   with an optional parent, children and an [`EntityObserver`].

pub mod component;
pub mod entity;
pub mod error;
pub mod instance;
pub mod registry;

pub use component::{Component, ComponentTypeId};
pub use entity::{Entity, EntityAllocator, EntityId, EntityObserver};
pub use error::ComponentError;
pub use instance::{ComponentId, ComponentRef};
pub use registry::{ComponentTypeInfo, ComponentTypeRegistry, TypeKind};
