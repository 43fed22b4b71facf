// Registry — Maps container node types to their decomposers
//
// Flattening against a spec needs, for every container node, a way to pull
// the node's immediate children out of a value in the order the spec lists
// them. That logic is per container kind, so it lives behind the
// `Decomposable` trait and is looked up by the node's `NodeType` tag.
//
// The registry is an ordinary value: the flattener borrows one, and callers
// may build as many as they like. A process-wide default lives in
// `crate::global` for code that cannot thread a registry through.
//
// Example:
//   let mut registry = DispatchRegistry::<Tensor>::default(); // dict, list, tuple, None
//   registry.register_record("ModelOutput");
//   registry.register_fn("Pair", |tree, spec| { ... });

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sprig_core::{NodeSpec, NodeType, PyTree, Result};
use tracing::debug;

use crate::builtin::{
    DictDecomposer, FieldsDecomposer, ListDecomposer, NoneDecomposer, TupleDecomposer,
};

/// Decomposes a container value into its immediate children.
///
/// Given the value and the spec node that describes it, return the children
/// in the order of `spec.children_specs()`. Structural mismatches (missing
/// key, short sequence, wrong container kind) are reported as errors and
/// propagated to the caller of the flattener unchanged.
pub trait Decomposable<L>: Send + Sync {
    fn decompose<'a>(&self, tree: &'a PyTree<L>, spec: &NodeSpec) -> Result<Vec<&'a PyTree<L>>>;
}

/// Adapter that lets a plain function or closure act as a decomposer.
pub struct FnDecomposer<F>(pub F);

impl<L, F> Decomposable<L> for FnDecomposer<F>
where
    F: for<'a> Fn(&'a PyTree<L>, &NodeSpec) -> Result<Vec<&'a PyTree<L>>> + Send + Sync,
{
    fn decompose<'a>(&self, tree: &'a PyTree<L>, spec: &NodeSpec) -> Result<Vec<&'a PyTree<L>>> {
        (self.0)(tree, spec)
    }
}

/// Table from node type to decomposer.
pub struct DispatchRegistry<L> {
    entries: HashMap<NodeType, Arc<dyn Decomposable<L>>>,
}

impl<L> DispatchRegistry<L> {
    /// An empty registry; even the built-in containers are unknown to it.
    pub fn new() -> Self {
        DispatchRegistry {
            entries: HashMap::new(),
        }
    }

    /// A registry with decomposers for `dict`, `list`, `tuple` and `None`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(NodeType::DICT, DictDecomposer);
        registry.register(NodeType::LIST, ListDecomposer);
        registry.register(NodeType::TUPLE, TupleDecomposer);
        registry.register(NodeType::NONE, NoneDecomposer);
        registry
    }

    /// Register `decomposer` for `node_type`, replacing any previous entry.
    ///
    /// Returns the replaced decomposer, if there was one.
    pub fn register<D>(
        &mut self,
        node_type: impl Into<NodeType>,
        decomposer: D,
    ) -> Option<Arc<dyn Decomposable<L>>>
    where
        D: Decomposable<L> + 'static,
    {
        let node_type = node_type.into();
        let previous = self.entries.insert(node_type.clone(), Arc::new(decomposer));
        debug!(
            node_type = %node_type,
            replaced = previous.is_some(),
            "registered flatten spec decomposer"
        );
        previous
    }

    /// Register a function or closure as the decomposer for `node_type`.
    pub fn register_fn<F>(
        &mut self,
        node_type: impl Into<NodeType>,
        f: F,
    ) -> Option<Arc<dyn Decomposable<L>>>
    where
        F: for<'a> Fn(&'a PyTree<L>, &NodeSpec) -> Result<Vec<&'a PyTree<L>>>
            + Send
            + Sync
            + 'static,
    {
        self.register(node_type, FnDecomposer(f))
    }

    /// Register `node_type` as a named record decomposed by field name.
    pub fn register_record(
        &mut self,
        node_type: impl Into<NodeType>,
    ) -> Option<Arc<dyn Decomposable<L>>> {
        self.register(node_type, FieldsDecomposer)
    }

    /// Look up the decomposer for `node_type`.
    pub fn get(&self, node_type: &NodeType) -> Option<&Arc<dyn Decomposable<L>>> {
        self.entries.get(node_type)
    }

    pub fn contains(&self, node_type: &NodeType) -> bool {
        self.entries.contains_key(node_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered node types, sorted by name.
    pub fn node_types(&self) -> Vec<&NodeType> {
        let mut types: Vec<&NodeType> = self.entries.keys().collect();
        types.sort();
        types
    }
}

impl<L> Default for DispatchRegistry<L> {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl<L> Clone for DispatchRegistry<L> {
    fn clone(&self) -> Self {
        DispatchRegistry {
            entries: self.entries.clone(),
        }
    }
}

impl<L> fmt::Debug for DispatchRegistry<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}
