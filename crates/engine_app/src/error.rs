//! Manager-level error types.

use engine_component::{ComponentId, EntityId};
use engine_processor::ProcessorError;

/// Errors raised by the [`EntityManager`](crate::manager::EntityManager).
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("processor '{0}' is already registered")]
    DuplicateProcessor(String),

    #[error("no processor named '{0}' is registered")]
    UnknownProcessor(String),

    #[error("{0} is already live")]
    EntityAlreadyLive(EntityId),

    #[error("{0} is not live")]
    EntityNotLive(EntityId),

    /// A live entity carries a component whose type the registry does not
    /// know, so no processor could ever classify it.
    #[error("{component} has unregistered type '{type_name}'")]
    UnregisteredComponent {
        component: ComponentId,
        type_name: &'static str,
    },

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

/// Errors raised while loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for the expected shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration parsed but holds an unusable value.
    #[error("invalid config: {0}")]
    Invalid(String),
}
