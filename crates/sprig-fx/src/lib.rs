//! # sprig-fx
//!
//! Spec-directed flattening of PyTrees.
//!
//! Graph transformations record the [`TreeSpec`](sprig_core::TreeSpec) of a
//! module's inputs once and later need to turn structurally matching values
//! into the same ordered list of leaves. This crate provides:
//!
//! - [`Decomposable`] — per-container logic yielding a node's children
//! - [`DispatchRegistry`] — node type → decomposer table, with built-ins for
//!   `dict`, `list`, `tuple` and `None`
//! - [`SpecFlattener`] / [`tree_flatten_spec`] — the recursive flattener
//! - [`FlattenConfig`] — flattener settings
//! - [`global`] — process-wide default registries
//!
//! ## Example
//!
//! ```
//! use sprig_core::{PyTree, TreeSpec};
//! use sprig_fx::{tree_flatten_spec, DispatchRegistry};
//!
//! let registry = DispatchRegistry::default();
//! let spec = TreeSpec::dict([("x", TreeSpec::leaf()), ("y", TreeSpec::list_of_leaves(2))]);
//! let value = PyTree::dict([("x", PyTree::leaf(5)), ("y", PyTree::list_of([6, 7]))]);
//!
//! let flat = tree_flatten_spec(&registry, &value, &spec).unwrap();
//! let leaves: Vec<i32> = flat.iter().filter_map(|t| t.as_leaf().copied()).collect();
//! assert_eq!(leaves, vec![5, 6, 7]);
//! ```

pub mod builtin;
pub mod config;
pub mod flatten;
pub mod global;
pub mod registry;

pub use builtin::{
    DictDecomposer, FieldsDecomposer, ListDecomposer, NoneDecomposer, TupleDecomposer,
};
pub use config::{ChildCountPolicy, FlattenConfig, CHILD_COUNT_ENV};
pub use flatten::{tree_flatten_spec, SpecFlattener};
pub use global::{
    register_pytree_flatten_fn, register_pytree_flatten_spec, register_pytree_record,
    with_default_registry,
};
pub use registry::{Decomposable, DispatchRegistry, FnDecomposer};
