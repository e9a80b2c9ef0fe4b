//! Demo scene: spatial components and the processors that spawn, move,
//! expire and draw them.

use std::sync::Arc;

use anyhow::Context as _;
use engine_component::{
    Component, ComponentError, ComponentRef, ComponentTypeId, ComponentTypeRegistry, Entity,
    EntityAllocator,
};
use engine_processor::{
    ComponentHooks, DataStrategy, DrawItem, EntityProcessor, GameTime, IdentityStrategy, Processor,
    ProcessorBase, ProcessorConfig, ProcessorError, RenderContext,
};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::EngineConfig;
use crate::manager::EntityManager;

/// Capability carried by every component that places an entity in space.
pub const SPATIAL: ComponentTypeId = ComponentTypeId::from_name("Spatial");

const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 2.0, 10.0);

/// Position, rotation and scale in 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// The 4×4 model matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for Transform {
    fn type_name() -> &'static str {
        "Transform"
    }

    fn capabilities() -> &'static [ComponentTypeId] {
        &[SPATIAL]
    }
}

/// Linear velocity in units per second, angular velocity as a scaled axis in
/// radians per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

/// A drawable shape, culled and sorted by its bounding sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub radius: f32,
}

impl Component for Mesh {
    fn type_name() -> &'static str {
        "Mesh"
    }
}

/// Emits a short-lived particle every `every_frames` frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Spawner {
    pub origin: Vec3,
    pub every_frames: u64,
    pub remaining: u32,
    pub lifetime_frames: u32,
}

impl Component for Spawner {
    fn type_name() -> &'static str {
        "Spawner"
    }
}

/// Frames until the owning entity is removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifetime {
    pub remaining_frames: u32,
}

impl Component for Lifetime {
    fn type_name() -> &'static str {
        "Lifetime"
    }
}

/// Build the registry for the demo component kinds.
///
/// # Errors
///
/// Registration conflicts.
pub fn registry() -> Result<ComponentTypeRegistry, ComponentError> {
    let mut registry = ComponentTypeRegistry::new();
    registry.register_capability("Spatial", &[])?;
    registry.register::<Transform>()?;
    registry.register::<Velocity>()?;
    registry.register::<Mesh>()?;
    registry.register::<Spawner>()?;
    registry.register::<Lifetime>()?;
    Ok(registry)
}

/// The components a moving entity integrates.
#[derive(Debug, Clone, PartialEq)]
pub struct Mover {
    pub transform: ComponentRef,
    pub velocity: ComponentRef,
}

/// Integrates velocities into transforms.
#[derive(Debug, Default)]
pub struct MotionStrategy;

impl DataStrategy for MotionStrategy {
    type Data = Mover;

    fn generate_data(
        &self,
        _processor: &EntityProcessor<Self>,
        entity: &Entity,
        component: &ComponentRef,
    ) -> anyhow::Result<Mover> {
        let transform = entity
            .get::<Transform>()
            .with_context(|| format!("{entity} has no transform"))?;
        Ok(Mover {
            transform,
            velocity: component.clone(),
        })
    }

    fn update(&self, processor: &EntityProcessor<Self>, time: &GameTime) -> anyhow::Result<()> {
        let dt = time.delta_seconds();
        for entry in processor.entries() {
            let velocity = entry.data.velocity.get::<Velocity>()?;
            entry.data.transform.write(|t: &mut Transform| {
                t.translation += velocity.linear * dt;
                t.rotation = (Quat::from_scaled_axis(velocity.angular * dt) * t.rotation).normalize();
            })?;
        }
        Ok(())
    }
}

/// What the renderer needs per mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    pub transform: ComponentRef,
    pub radius: f32,
}

/// Culls meshes behind the camera and submits the rest back to front.
#[derive(Debug)]
pub struct RenderStrategy {
    camera: Vec3,
}

impl RenderStrategy {
    #[must_use]
    pub fn new(camera: Vec3) -> Self {
        Self { camera }
    }
}

impl Default for RenderStrategy {
    fn default() -> Self {
        Self::new(CAMERA_POSITION)
    }
}

impl DataStrategy for RenderStrategy {
    type Data = Renderable;

    fn generate_data(
        &self,
        processor: &EntityProcessor<Self>,
        entity: &Entity,
        component: &ComponentRef,
    ) -> anyhow::Result<Renderable> {
        let registry = processor.base().registry();
        let transform = entity
            .components()
            .into_iter()
            .find(|c| registry.is_assignable_from(SPATIAL, c.type_id()))
            .with_context(|| format!("{entity} has no spatial component"))?;
        let radius = component.read(|mesh: &Mesh| {
            trace!(entity = %entity.id(), mesh = mesh.name, radius = mesh.radius, "mesh bound");
            mesh.radius
        })?;
        Ok(Renderable { transform, radius })
    }

    fn draw(&self, processor: &EntityProcessor<Self>, context: &RenderContext) -> anyhow::Result<()> {
        for entry in processor.entries() {
            let world = entry.data.transform.read(|t: &Transform| t.to_matrix())?;
            let (scale, _, center) = world.to_scale_rotation_translation();
            let radius = entry.data.radius * scale.max_element();
            // Camera looks down -Z.
            if center.z - radius > self.camera.z {
                continue;
            }
            context.submit(DrawItem {
                processor: processor.base().name().to_string(),
                entity: entry.entity,
                component: entry.component.id(),
                sort_key: -center.distance(self.camera),
            });
        }
        Ok(())
    }
}

/// Spawns particles for every tracked [`Spawner`].
#[derive(Debug)]
pub struct SpawnerHooks {
    allocator: Arc<EntityAllocator>,
}

impl SpawnerHooks {
    #[must_use]
    pub fn new(allocator: Arc<EntityAllocator>) -> Self {
        Self { allocator }
    }
}

impl ComponentHooks for SpawnerHooks {
    fn update(&self, processor: &EntityProcessor<IdentityStrategy<Self>>, time: &GameTime) -> anyhow::Result<()> {
        for entry in processor.entries() {
            let due = entry.component.write(|s: &mut Spawner| {
                if s.remaining == 0 || s.every_frames == 0 || time.frame % s.every_frames != 0 {
                    return None;
                }
                s.remaining -= 1;
                Some((s.origin, s.lifetime_frames))
            })?;
            let Some((origin, lifetime_frames)) = due else {
                continue;
            };

            let id = self.allocator.allocate();
            let angle = id.0 as f32 * 0.7;
            let particle = Entity::new(id, format!("particle-{}", id.0));
            particle.attach(Transform::from_translation(origin))?;
            particle.attach(Velocity {
                linear: Vec3::new(angle.cos(), 2.0, angle.sin()),
                angular: Vec3::ZERO,
            })?;
            particle.attach(Mesh {
                name: "particle".to_string(),
                radius: 0.1,
            })?;
            particle.attach(Lifetime {
                remaining_frames: lifetime_frames,
            })?;
            processor.base().add_entity(&particle)?;
            debug!(spawner = %entry.entity, entity = %id, "spawned particle");
        }
        Ok(())
    }
}

/// Counts down [`Lifetime`]s and removes expired entities.
#[derive(Debug, Default)]
pub struct ExpiryStrategy;

impl DataStrategy for ExpiryStrategy {
    type Data = Entity;

    fn generate_data(
        &self,
        _processor: &EntityProcessor<Self>,
        entity: &Entity,
        _component: &ComponentRef,
    ) -> anyhow::Result<Entity> {
        Ok(entity.clone())
    }

    fn update(&self, processor: &EntityProcessor<Self>, _time: &GameTime) -> anyhow::Result<()> {
        let mut expired: Vec<Arc<Entity>> = Vec::new();
        for entry in processor.entries() {
            let done = entry.component.write(|l: &mut Lifetime| {
                l.remaining_frames = l.remaining_frames.saturating_sub(1);
                l.remaining_frames == 0
            })?;
            if done && !expired.contains(&entry.data) {
                expired.push(entry.data);
            }
        }
        for entity in expired {
            processor.base().remove_entity(&entity, true)?;
            debug!(entity = %entity.id(), "entity expired");
        }
        Ok(())
    }
}

/// Build the demo processors, applying `config`'s overrides.
///
/// # Errors
///
/// Processor signature validation failures.
pub fn processors(
    registry: &Arc<ComponentTypeRegistry>,
    config: &EngineConfig,
    allocator: &Arc<EntityAllocator>,
) -> Result<Vec<Arc<dyn Processor>>, ProcessorError> {
    let base = |name: &str, order: i32, main: ComponentTypeId, required: &[ComponentTypeId]| {
        ProcessorBase::new(
            Arc::clone(registry),
            config.apply(ProcessorConfig::new(name).with_order(order)),
            main,
            required,
        )
    };

    let mut processors: Vec<Arc<dyn Processor>> = Vec::new();
    processors.push(Arc::new(EntityProcessor::new(
        base("spawner", 0, Spawner::component_type_id(), &[])?,
        IdentityStrategy::new(SpawnerHooks::new(Arc::clone(allocator))),
    )));
    processors.push(Arc::new(EntityProcessor::new(
        base("motion", 10, Velocity::component_type_id(), &[Transform::component_type_id()])?,
        MotionStrategy,
    )));
    processors.push(Arc::new(EntityProcessor::new(
        base("expiry", 20, Lifetime::component_type_id(), &[])?,
        ExpiryStrategy,
    )));
    processors.push(Arc::new(EntityProcessor::new(
        base("render", 100, Mesh::component_type_id(), &[SPATIAL])?,
        RenderStrategy::default(),
    )));
    Ok(processors)
}

/// Build the demo entity tree and make it live.
///
/// # Errors
///
/// Component attachment or manager failures.
pub fn populate(manager: &EntityManager, allocator: &EntityAllocator) -> anyhow::Result<Entity> {
    let root = Entity::new(allocator.allocate(), "scene");

    let ground = Entity::new(allocator.allocate(), "ground");
    ground.attach(Transform {
        translation: Vec3::new(0.0, -1.0, 0.0),
        scale: Vec3::new(20.0, 0.1, 20.0),
        ..Transform::IDENTITY
    })?;
    ground.attach(Mesh {
        name: "ground".to_string(),
        radius: 1.0,
    })?;

    let cube = Entity::new(allocator.allocate(), "cube");
    cube.attach(Transform::IDENTITY)?;
    cube.attach(Velocity {
        linear: Vec3::X * 0.5,
        angular: Vec3::Y,
    })?;
    cube.attach(Mesh {
        name: "cube".to_string(),
        radius: 0.87,
    })?;

    let fountain = Entity::new(allocator.allocate(), "fountain");
    let origin = Vec3::new(0.0, 0.0, -5.0);
    fountain.attach(Transform::from_translation(origin))?;
    fountain.attach(Spawner {
        origin,
        every_frames: 30,
        remaining: 8,
        lifetime_frames: 90,
    })?;

    root.add_child(&ground)?;
    root.add_child(&cube)?;
    root.add_child(&fountain)?;
    manager.add_entity(&root)?;

    info!(entities = manager.entity_count(), "scene populated");
    Ok(root)
}
