// Built-in decomposers
//
//   dict   — values at the keys recorded in the spec context, in that order;
//            keys not in the context are ignored
//   list   — the first `children_specs.len()` elements
//   tuple  — same as list
//   None   — no children
//   record — fields named in the spec context (user tags, opt-in)
//
// The positional decomposers index any positional container, so a spec
// recorded from a list also decomposes a tuple of the same length and vice
// versa.

use sprig_core::{Context, Error, Key, NodeSpec, PyTree, Result};

use crate::registry::Decomposable;

fn kind_mismatch<L>(spec: &NodeSpec, tree: &PyTree<L>) -> Error {
    Error::KindMismatch {
        expected: spec.node_type().clone(),
        got: tree.kind_name(),
    }
}

fn positional<'a, L>(items: &'a [PyTree<L>], spec: &NodeSpec) -> Result<Vec<&'a PyTree<L>>> {
    let n = spec.num_children();
    if items.len() < n {
        return Err(Error::IndexOutOfBounds {
            node_type: spec.node_type().clone(),
            index: items.len(),
            len: items.len(),
        });
    }
    Ok(items[..n].iter().collect())
}

/// Decomposes `PyTree::Dict` by the keys in a `Context::Keys` context.
#[derive(Debug, Clone, Copy, Default)]
pub struct DictDecomposer;

impl<L> Decomposable<L> for DictDecomposer {
    fn decompose<'a>(&self, tree: &'a PyTree<L>, spec: &NodeSpec) -> Result<Vec<&'a PyTree<L>>> {
        let PyTree::Dict(map) = tree else {
            return Err(kind_mismatch(spec, tree));
        };
        let Context::Keys(keys) = spec.context() else {
            return Err(Error::InvalidSpec(format!(
                "{} spec node has no keys context",
                spec.node_type()
            )));
        };
        keys.iter()
            .map(|key| {
                map.get(key).ok_or_else(|| Error::MissingKey {
                    node_type: spec.node_type().clone(),
                    key: key.clone(),
                })
            })
            .collect()
    }
}

/// Decomposes a list (or any positional container) by position.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListDecomposer;

impl<L> Decomposable<L> for ListDecomposer {
    fn decompose<'a>(&self, tree: &'a PyTree<L>, spec: &NodeSpec) -> Result<Vec<&'a PyTree<L>>> {
        match tree {
            PyTree::List(items) | PyTree::Tuple(items) => positional(items, spec),
            _ => Err(kind_mismatch(spec, tree)),
        }
    }
}

/// Decomposes a tuple (or any positional container) by position.
#[derive(Debug, Clone, Copy, Default)]
pub struct TupleDecomposer;

impl<L> Decomposable<L> for TupleDecomposer {
    fn decompose<'a>(&self, tree: &'a PyTree<L>, spec: &NodeSpec) -> Result<Vec<&'a PyTree<L>>> {
        match tree {
            PyTree::Tuple(items) | PyTree::List(items) => positional(items, spec),
            _ => Err(kind_mismatch(spec, tree)),
        }
    }
}

/// `PyTree::None` has no children.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneDecomposer;

impl<L> Decomposable<L> for NoneDecomposer {
    fn decompose<'a>(&self, tree: &'a PyTree<L>, spec: &NodeSpec) -> Result<Vec<&'a PyTree<L>>> {
        match tree {
            PyTree::None => Ok(Vec::new()),
            _ => Err(kind_mismatch(spec, tree)),
        }
    }
}

/// Decomposes a `PyTree::Struct` by the field names in a `Context::Fields`
/// context. Fields not named in the context are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldsDecomposer;

impl<L> Decomposable<L> for FieldsDecomposer {
    fn decompose<'a>(&self, tree: &'a PyTree<L>, spec: &NodeSpec) -> Result<Vec<&'a PyTree<L>>> {
        let PyTree::Struct(record) = tree else {
            return Err(kind_mismatch(spec, tree));
        };
        let Context::Fields(names) = spec.context() else {
            return Err(Error::InvalidSpec(format!(
                "{} spec node has no fields context",
                spec.node_type()
            )));
        };
        names
            .iter()
            .map(|name| {
                record
                    .fields
                    .get(name.as_str())
                    .ok_or_else(|| Error::MissingKey {
                        node_type: spec.node_type().clone(),
                        key: Key::from(name.as_str()),
                    })
            })
            .collect()
    }
}
