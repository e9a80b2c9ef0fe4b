//! # engine_processor
//!
//! Entity processors for the engine.
//!
//! A processor declares a *main* component type and a set of *required*
//! component types. The manager routes every component event of an accepted
//! kind to [`Processor::process_entity_component`], and the processor keeps
//! one piece of derived data per matching component instance:
//!
//! - [`RequiredTypes`] decides whether an entity carries a distinct component
//!   for every required type (capability-aware, injective).
//! - [`EntityProcessor`] owns the per-component cache and runs the
//!   add / remove / revalidate transitions, guarded against re-entrant adds.
//! - [`DataStrategy`] plugs in how data is generated, validated and reacted
//!   to; [`IdentityStrategy`] caches the component handle itself.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use engine_component::{Component, ComponentTypeRegistry, Entity, EntityId};
//! use engine_processor::{
//!     ComponentProcessor, EntityProcessor, IdentityStrategy, Processor, ProcessorBase,
//!     ProcessorConfig, Transition,
//! };
//!
//! struct Mesh;
//! impl Component for Mesh {
//!     fn type_name() -> &'static str {
//!         "Mesh"
//!     }
//! }
//!
//! let mut registry = ComponentTypeRegistry::new();
//! registry.register::<Mesh>().unwrap();
//!
//! let base = ProcessorBase::new(
//!     Arc::new(registry),
//!     ProcessorConfig::new("meshes"),
//!     Mesh::component_type_id(),
//!     &[],
//! )
//! .unwrap();
//! let meshes: ComponentProcessor = EntityProcessor::new(base, IdentityStrategy::default());
//!
//! let entity = Entity::new(EntityId(1), "cube");
//! let mesh = entity.attach(Mesh).unwrap();
//! assert_eq!(
//!     meshes.process_entity_component(&entity, &mesh, false).unwrap(),
//!     Transition::Added
//! );
//! ```

pub mod base;
pub mod config;
pub mod context;
pub mod entity_processor;
pub mod error;
pub mod guard;
pub mod matcher;
pub mod processor;
pub mod strategy;

pub use base::{EntityHost, ProcessorBase};
pub use config::ProcessorConfig;
pub use context::{DrawItem, GameTime, RenderContext};
pub use entity_processor::{ComponentData, ComponentProcessor, EntityProcessor};
pub use error::ProcessorError;
pub use guard::{InFlightGuard, InFlightSet};
pub use matcher::RequiredTypes;
pub use processor::{Processor, Transition};
pub use strategy::{ComponentHooks, DataStrategy, IdentityStrategy};
