//! Processor-layer error types.

use engine_component::ComponentTypeId;

/// Errors raised while constructing or driving a processor.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// The processor's type signature was rejected at construction.
    #[error("invalid argument for processor '{processor}': {message}")]
    InvalidArgument {
        /// The processor being constructed.
        processor: String,
        /// What was wrong.
        message: String,
    },

    /// A type named in the signature is not a registered component type or
    /// capability.
    #[error("processor '{processor}' names unknown component type {type_id} as {role}")]
    UnknownComponentType {
        /// The processor being constructed.
        processor: String,
        /// The offending type.
        type_id: ComponentTypeId,
        /// `"main type"` or `"required type"`.
        role: &'static str,
    },

    /// A data strategy callback failed. A failed add, remove or regeneration
    /// leaves the component uncached; a failed validity check keeps the
    /// cached data.
    #[error("processor '{processor}' failed in {stage}: {source}")]
    Strategy {
        /// The processor whose strategy failed.
        processor: String,
        /// The callback that failed (e.g. `"generate_data"`).
        stage: &'static str,
        /// The strategy's error.
        #[source]
        source: anyhow::Error,
    },

    /// Internal bookkeeping contradicted itself; indicates a caller contract
    /// breach such as attaching one component instance to two entities.
    #[error("processor '{processor}' is inconsistent: {message}")]
    Inconsistent {
        /// The processor.
        processor: String,
        /// What went wrong.
        message: String,
    },

    /// A manager pass-through was used while no manager is registered.
    #[error("processor '{0}' is not registered with a manager")]
    NotRegistered(String),

    /// The manager rejected a pass-through call.
    #[error("entity host failed: {0}")]
    Host(#[source] anyhow::Error),
}
