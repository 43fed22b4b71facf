//! # sprig-core
//!
//! Core pytree types for Sprig.
//!
//! This crate provides:
//! - [`PyTree`] — nested dict/list/tuple/record structure with opaque leaves
//! - [`TreeSpec`] / [`NodeSpec`] — recorded shape of a PyTree
//! - [`NodeType`] / [`Context`] — dispatch tag and per-node context
//! - [`Key`] — mapping keys
//! - [`Error`] / [`Result`] — the error type shared by every Sprig crate

pub mod error;
pub mod key;
pub mod spec;
pub mod tree;

pub use error::{Error, Result};
pub use key::Key;
pub use spec::{Context, NodeSpec, NodeType, TreeSpec};
pub use tree::{PyTree, StructNode};
