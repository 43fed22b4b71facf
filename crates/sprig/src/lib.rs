//! # Sprig
//!
//! Pytree utilities for passing structured tensors through module and graph
//! transformations.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use sprig::prelude::*;
//!
//! // Record the shape of a model's inputs once...
//! let inputs = PyTree::dict([("x", PyTree::leaf(1.0)), ("y", PyTree::list_of([2.0, 3.0]))]);
//! let spec = tree_structure(&inputs);
//!
//! // ...then flatten later values the same way.
//! let registry = DispatchRegistry::default();
//! let flat = tree_flatten_spec(&registry, &inputs, &spec).unwrap();
//! assert_eq!(flat.len(), 3);
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `sprig-core` | PyTree, TreeSpec, NodeType, Context, Key, Error |
//! | `sprig-fx` | Decomposer registry, spec-directed flattener, FlattenConfig |
//!
//! ## Modules
//!
//! - [`pytree`] — tree_flatten, tree_unflatten, tree_map, tree_leaves, tree_structure
//! - [`serialize`] — versioned JSON encoding of TreeSpecs

/// Re-export core types.
pub use sprig_core::{
    bail, Context, Error, Key, NodeSpec, NodeType, PyTree, Result, StructNode, TreeSpec,
};

/// Re-export the spec-directed flattener and registry.
pub mod fx {
    pub use sprig_fx::*;
}

/// PyTree utilities: record, rebuild and map structured values.
pub mod pytree;

/// Serialize: save and load TreeSpecs.
pub mod serialize;

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::fx::{
        register_pytree_flatten_spec, tree_flatten_spec, ChildCountPolicy, Decomposable,
        DispatchRegistry, FlattenConfig, SpecFlattener,
    };
    pub use crate::pytree::{tree_flatten, tree_leaves, tree_map, tree_structure, tree_unflatten};
    pub use crate::serialize::{treespec_dumps, treespec_loads};
    pub use crate::{Context, Error, Key, NodeSpec, NodeType, PyTree, Result, StructNode, TreeSpec};
}
