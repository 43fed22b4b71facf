// PyTree utilities — Capture, rebuild and map structured values
//
// The spec-directed flattener in sprig-fx consumes a TreeSpec that somebody
// recorded earlier. These functions are that "somebody": they record a spec
// from a value, rebuild a value from leaves and a spec, and map leaves.
//
//   let (leaves, spec) = tree_flatten(inputs);          // record
//   let outputs = leaves.into_iter().map(run).collect::<Vec<_>>();
//   let rebuilt = tree_unflatten(outputs, &spec)?;      // rebuild
//
// Round trip: tree_unflatten(tree_flatten(t).0, &spec) == t.

use sprig_core::{Context, Error, NodeType, PyTree, Result, StructNode, TreeSpec};

/// Consume `tree` and return its leaves (depth-first) and its spec.
pub fn tree_flatten<L>(tree: PyTree<L>) -> (Vec<L>, TreeSpec) {
    let spec = tree.structure();
    (tree.into_leaves(), spec)
}

/// The leaves of `tree`, depth-first, left to right.
pub fn tree_leaves<L>(tree: &PyTree<L>) -> Vec<&L> {
    tree.leaves()
}

/// The spec of `tree`.
pub fn tree_structure<L>(tree: &PyTree<L>) -> TreeSpec {
    tree.structure()
}

/// Apply `f` to every leaf of `tree`, keeping the structure.
pub fn tree_map<L, U>(tree: PyTree<L>, f: impl FnMut(L) -> U) -> PyTree<U> {
    tree.map(f)
}

/// Rebuild a tree of shape `spec` from `leaves`.
///
/// The number of leaves must equal `spec.num_leaves()`. Nodes are rebuilt
/// from their type and context: `dict`, `list`, `tuple`, `None`, and any
/// node with a field context (a record). Other user node types carry no
/// information about how to rebuild them and fail with
/// `Error::UnregisteredType`.
pub fn tree_unflatten<L>(
    leaves: impl IntoIterator<Item = L>,
    spec: &TreeSpec,
) -> Result<PyTree<L>> {
    let leaves: Vec<L> = leaves.into_iter().collect();
    let expected = spec.num_leaves();
    if leaves.len() != expected {
        return Err(Error::LeafCountMismatch {
            expected,
            got: leaves.len(),
        });
    }
    let mut iter = leaves.into_iter();
    build(&mut iter, spec)
}

fn build<L, I>(leaves: &mut I, spec: &TreeSpec) -> Result<PyTree<L>>
where
    I: Iterator<Item = L>,
{
    let node = match spec {
        TreeSpec::Leaf => {
            return leaves
                .next()
                .map(PyTree::Leaf)
                .ok_or_else(|| Error::msg("ran out of leaves while rebuilding tree"));
        }
        TreeSpec::Node(node) => node,
    };

    let children = node
        .children_specs()
        .iter()
        .map(|child| build(&mut *leaves, child))
        .collect::<Result<Vec<_>>>()?;

    let ty = node.node_type();
    match node.context() {
        Context::Keys(keys) if *ty == NodeType::DICT => {
            Ok(PyTree::Dict(keys.iter().cloned().zip(children).collect()))
        }
        Context::None if *ty == NodeType::LIST => Ok(PyTree::List(children)),
        Context::None if *ty == NodeType::TUPLE => Ok(PyTree::Tuple(children)),
        Context::None if *ty == NodeType::NONE => Ok(PyTree::None),
        Context::Fields(names) if !ty.is_builtin() => {
            let mut record = StructNode::try_new(ty.clone())?;
            record.fields = names.iter().cloned().zip(children).collect();
            Ok(PyTree::Struct(record))
        }
        _ => Err(Error::UnregisteredType {
            node_type: ty.clone(),
        }),
    }
}
