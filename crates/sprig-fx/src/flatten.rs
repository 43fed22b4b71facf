// Flatten — Decompose a PyTree into leaves following a recorded TreeSpec
//
// Unlike a plain leaf walk, flattening against a spec is driven by the spec,
// not by the value:
//
//   - a leaf marker in the spec yields the value at that position unchanged,
//     even when the value is itself a container
//   - a container node is decomposed with the decomposer registered for its
//     node type, and each child is flattened against the matching child spec
//   - mapping keys and record fields that the spec does not name are ignored
//
// so the output always has exactly `spec.num_leaves()` entries, in the order
// the spec was recorded, whatever extra structure the value carries.
//
// Any error aborts the whole call; no partial output is returned.

use sprig_core::{Error, PyTree, Result, TreeSpec};
use tracing::{debug, trace};

use crate::config::{ChildCountPolicy, FlattenConfig};
use crate::registry::DispatchRegistry;

/// Flattens values against specs using an injected registry.
#[derive(Debug)]
pub struct SpecFlattener<'r, L> {
    registry: &'r DispatchRegistry<L>,
    config: FlattenConfig,
}

impl<'r, L> SpecFlattener<'r, L> {
    /// Create a flattener with the default config.
    pub fn new(registry: &'r DispatchRegistry<L>) -> Self {
        SpecFlattener {
            registry,
            config: FlattenConfig::default(),
        }
    }

    /// Replace the config.
    pub fn with_config(mut self, config: FlattenConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &FlattenConfig {
        &self.config
    }

    pub fn registry(&self) -> &'r DispatchRegistry<L> {
        self.registry
    }

    /// Flatten `tree` into the subtrees sitting at the leaf markers of `spec`.
    pub fn flatten<'a>(&self, tree: &'a PyTree<L>, spec: &TreeSpec) -> Result<Vec<&'a PyTree<L>>> {
        let mut out = Vec::with_capacity(spec.num_leaves());
        self.flatten_into(tree, spec, &mut out)?;
        Ok(out)
    }

    /// Like [`flatten`](Self::flatten), but clones the results.
    pub fn flatten_cloned(&self, tree: &PyTree<L>, spec: &TreeSpec) -> Result<Vec<PyTree<L>>>
    where
        L: Clone,
    {
        Ok(self.flatten(tree, spec)?.into_iter().cloned().collect())
    }

    fn flatten_into<'a>(
        &self,
        tree: &'a PyTree<L>,
        spec: &TreeSpec,
        out: &mut Vec<&'a PyTree<L>>,
    ) -> Result<()> {
        let node = match spec {
            TreeSpec::Leaf => {
                out.push(tree);
                return Ok(());
            }
            TreeSpec::Node(node) => node,
        };

        let Some(decomposer) = self.registry.get(node.node_type()) else {
            debug!(node_type = %node.node_type(), "no flatten spec decomposer registered");
            return Err(Error::UnregisteredType {
                node_type: node.node_type().clone(),
            });
        };

        let children = decomposer.decompose(tree, node)?;
        let expected = node.num_children();
        if children.len() != expected {
            match self.config.child_count {
                ChildCountPolicy::Strict => {
                    return Err(Error::ChildCountMismatch {
                        node_type: node.node_type().clone(),
                        expected,
                        got: children.len(),
                    });
                }
                ChildCountPolicy::Truncate => {
                    debug!(
                        node_type = %node.node_type(),
                        expected,
                        got = children.len(),
                        "child count differs from spec, truncating"
                    );
                }
            }
        }

        trace!(node_type = %node.node_type(), children = children.len(), "flatten node");
        for (child, child_spec) in children.into_iter().zip(node.children_specs()) {
            self.flatten_into(child, child_spec, out)?;
        }
        Ok(())
    }
}

/// Flatten `tree` against `spec` with `registry` and the default config.
pub fn tree_flatten_spec<'a, L>(
    registry: &DispatchRegistry<L>,
    tree: &'a PyTree<L>,
    spec: &TreeSpec,
) -> Result<Vec<&'a PyTree<L>>> {
    SpecFlattener::new(registry).flatten(tree, spec)
}
