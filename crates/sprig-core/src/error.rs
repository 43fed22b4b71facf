use crate::key::Key;
use crate::spec::NodeType;

/// All errors that can occur within Sprig.
///
/// This enum captures every failure mode: unregistered container types,
/// structural mismatches between a value and its spec, leaf-count mismatches
/// during reconstruction, and spec (de)serialization failures.
/// Using a single error type across the library simplifies error propagation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A spec node names a container type with no decomposer registered.
    #[error(
        "{node_type} does not have a flatten spec decomposer associated with it. \
         Please register one with register_pytree_flatten_spec. If the spec was \
         deserialized, make sure that any custom node types have been registered \
         before using it"
    )]
    UnregisteredType { node_type: NodeType },

    /// A mapping or record is missing a key listed in the spec context.
    #[error("key {key} not found in {node_type}")]
    MissingKey { node_type: NodeType, key: Key },

    /// A sequence is shorter than the spec expects.
    #[error("index {index} out of range for {node_type} of length {len}")]
    IndexOutOfBounds {
        node_type: NodeType,
        index: usize,
        len: usize,
    },

    /// The value is a different kind of container than the decomposer handles.
    #[error("kind mismatch: expected {expected}, got {got}")]
    KindMismatch { expected: NodeType, got: String },

    /// A decomposer returned a different number of children than the spec lists.
    #[error("{node_type} decomposed into {got} children, spec lists {expected}")]
    ChildCountMismatch {
        node_type: NodeType,
        expected: usize,
        got: usize,
    },

    /// Wrong number of leaves supplied to rebuild a tree.
    #[error("leaf count mismatch: spec has {expected} leaves, got {got}")]
    LeafCountMismatch { expected: usize, got: usize },

    /// A spec violates the context/children invariant.
    #[error("invalid tree spec: {0}")]
    InvalidSpec(String),

    /// Serialized spec has an unsupported schema version.
    #[error("schema version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Serialized spec could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout Sprig.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
