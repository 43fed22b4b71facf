// PyTree — A structured value whose leaves are opaque
//
// Models rarely take a single tensor. Inputs and outputs are nested
// structures: a dict of tensors, a tuple of (logits, hidden_state), a named
// record with optional fields. A PyTree is such a structure, generic over the
// leaf type L (usually a tensor).
//
//   Leaf(L)        — an opaque value; never looked into
//   None           — the empty value, a container with no children
//   List / Tuple   — positional containers
//   Dict           — insertion-ordered mapping from Key to subtree
//   Struct         — a named record (user container) with ordered fields
//
// Only Struct carries a caller-chosen NodeType; the other containers map to
// the built-in tags.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::Key;
use crate::spec::{Context, NodeSpec, NodeType, TreeSpec};

/// A named record: a user container with ordered, named fields.
///
/// `node_type` names the record kind and is never one of the built-in tags
/// (`dict`, `list`, `tuple`, `None`); those have their own `PyTree` variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StructNodeRepr<L>")]
pub struct StructNode<L> {
    node_type: NodeType,
    pub fields: IndexMap<String, PyTree<L>>,
}

#[derive(Deserialize)]
struct StructNodeRepr<L> {
    node_type: NodeType,
    fields: IndexMap<String, PyTree<L>>,
}

impl<L> TryFrom<StructNodeRepr<L>> for StructNode<L> {
    type Error = Error;

    fn try_from(repr: StructNodeRepr<L>) -> Result<Self> {
        let mut node = StructNode::try_new(repr.node_type)?;
        node.fields = repr.fields;
        Ok(node)
    }
}

impl<L> StructNode<L> {
    /// Start an empty record of kind `node_type`.
    ///
    /// # Panics
    /// If `node_type` is a built-in tag. Use [`StructNode::try_new`] for tags
    /// that come from outside the program.
    pub fn new(node_type: impl Into<NodeType>) -> Self {
        match Self::try_new(node_type) {
            Ok(node) => node,
            Err(e) => panic!("{e}"),
        }
    }

    /// Start an empty record, rejecting the built-in tags.
    pub fn try_new(node_type: impl Into<NodeType>) -> Result<Self> {
        let node_type = node_type.into();
        if node_type.is_builtin() {
            return Err(Error::InvalidSpec(format!(
                "'{node_type}' is a built-in container and cannot name a record"
            )));
        }
        Ok(StructNode {
            node_type,
            fields: IndexMap::new(),
        })
    }

    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    /// Append a field. Returns self for chaining.
    pub fn field(mut self, name: impl Into<String>, value: PyTree<L>) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

/// A nested structure of containers with leaves of type `L`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PyTree<L> {
    Leaf(L),
    None,
    List(Vec<PyTree<L>>),
    Tuple(Vec<PyTree<L>>),
    Dict(IndexMap<Key, PyTree<L>>),
    Struct(StructNode<L>),
}

impl<L> PyTree<L> {
    /// Wrap a leaf value.
    pub fn leaf(value: L) -> Self {
        PyTree::Leaf(value)
    }

    /// Build a dict from `(key, subtree)` pairs, keeping their order.
    pub fn dict<K: Into<Key>>(entries: impl IntoIterator<Item = (K, PyTree<L>)>) -> Self {
        PyTree::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a list of leaves.
    pub fn list_of(values: impl IntoIterator<Item = L>) -> Self {
        PyTree::List(values.into_iter().map(PyTree::Leaf).collect())
    }

    /// Build a tuple of leaves.
    pub fn tuple_of(values: impl IntoIterator<Item = L>) -> Self {
        PyTree::Tuple(values.into_iter().map(PyTree::Leaf).collect())
    }

    /// The container tag, or `None` for a leaf.
    pub fn node_type(&self) -> Option<NodeType> {
        match self {
            PyTree::Leaf(_) => None,
            PyTree::None => Some(NodeType::NONE),
            PyTree::List(_) => Some(NodeType::LIST),
            PyTree::Tuple(_) => Some(NodeType::TUPLE),
            PyTree::Dict(_) => Some(NodeType::DICT),
            PyTree::Struct(s) => Some(s.node_type.clone()),
        }
    }

    /// Short description of the variant, used in error messages.
    pub fn kind_name(&self) -> String {
        match self.node_type() {
            Some(ty) => ty.to_string(),
            None => "leaf".to_string(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, PyTree::Leaf(_))
    }

    /// The leaf value, if this is a leaf.
    pub fn as_leaf(&self) -> Option<&L> {
        match self {
            PyTree::Leaf(v) => Some(v),
            _ => None,
        }
    }

    /// Number of immediate children (0 for leaves and None).
    pub fn num_children(&self) -> usize {
        match self {
            PyTree::Leaf(_) | PyTree::None => 0,
            PyTree::List(items) | PyTree::Tuple(items) => items.len(),
            PyTree::Dict(map) => map.len(),
            PyTree::Struct(s) => s.fields.len(),
        }
    }

    /// Immediate children in their natural order.
    pub fn children(&self) -> Vec<&PyTree<L>> {
        match self {
            PyTree::Leaf(_) | PyTree::None => Vec::new(),
            PyTree::List(items) | PyTree::Tuple(items) => items.iter().collect(),
            PyTree::Dict(map) => map.values().collect(),
            PyTree::Struct(s) => s.fields.values().collect(),
        }
    }

    /// Number of `Leaf` values in the whole tree.
    pub fn num_leaves(&self) -> usize {
        match self {
            PyTree::Leaf(_) => 1,
            _ => self.children().into_iter().map(PyTree::num_leaves).sum(),
        }
    }

    /// All leaf values, depth-first, left to right.
    pub fn leaves(&self) -> Vec<&L> {
        let mut out = Vec::with_capacity(self.num_leaves());
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a L>) {
        match self {
            PyTree::Leaf(v) => out.push(v),
            _ => {
                for child in self.children() {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Consume the tree and return its leaf values, depth-first.
    pub fn into_leaves(self) -> Vec<L> {
        let mut out = Vec::with_capacity(self.num_leaves());
        self.drain_leaves(&mut out);
        out
    }

    fn drain_leaves(self, out: &mut Vec<L>) {
        match self {
            PyTree::Leaf(v) => out.push(v),
            PyTree::None => {}
            PyTree::List(items) | PyTree::Tuple(items) => {
                for item in items {
                    item.drain_leaves(out);
                }
            }
            PyTree::Dict(map) => {
                for (_, item) in map {
                    item.drain_leaves(out);
                }
            }
            PyTree::Struct(s) => {
                for (_, item) in s.fields {
                    item.drain_leaves(out);
                }
            }
        }
    }

    /// Record the shape of this tree.
    ///
    /// Dicts record their keys in insertion order, records their field order;
    /// lists and tuples record only their length.
    pub fn structure(&self) -> TreeSpec {
        match self {
            PyTree::Leaf(_) => TreeSpec::Leaf,
            PyTree::None => TreeSpec::none(),
            PyTree::List(items) => TreeSpec::list(items.iter().map(PyTree::structure).collect()),
            PyTree::Tuple(items) => TreeSpec::tuple(items.iter().map(PyTree::structure).collect()),
            PyTree::Dict(map) => TreeSpec::Node(NodeSpec::from_parts(
                NodeType::DICT,
                Context::Keys(map.keys().cloned().collect()),
                map.values().map(PyTree::structure).collect(),
            )),
            PyTree::Struct(s) => TreeSpec::Node(NodeSpec::from_parts(
                s.node_type.clone(),
                Context::Fields(s.fields.keys().cloned().collect()),
                s.fields.values().map(PyTree::structure).collect(),
            )),
        }
    }

    /// Apply `f` to every leaf, keeping the structure.
    pub fn map<U>(self, mut f: impl FnMut(L) -> U) -> PyTree<U> {
        self.map_inner(&mut f)
    }

    fn map_inner<U>(self, f: &mut impl FnMut(L) -> U) -> PyTree<U> {
        match self {
            PyTree::Leaf(v) => PyTree::Leaf(f(v)),
            PyTree::None => PyTree::None,
            PyTree::List(items) => {
                PyTree::List(items.into_iter().map(|t| t.map_inner(f)).collect())
            }
            PyTree::Tuple(items) => {
                PyTree::Tuple(items.into_iter().map(|t| t.map_inner(f)).collect())
            }
            PyTree::Dict(map) => {
                PyTree::Dict(map.into_iter().map(|(k, t)| (k, t.map_inner(f))).collect())
            }
            PyTree::Struct(s) => PyTree::Struct(StructNode {
                node_type: s.node_type,
                fields: s
                    .fields
                    .into_iter()
                    .map(|(name, t)| (name, t.map_inner(f)))
                    .collect(),
            }),
        }
    }
}

impl<L> From<StructNode<L>> for PyTree<L> {
    fn from(node: StructNode<L>) -> Self {
        PyTree::Struct(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PyTree<i32> {
        // {"x": 5, "y": [6, 7], "z": None}
        PyTree::dict([
            ("x", PyTree::leaf(5)),
            ("y", PyTree::list_of([6, 7])),
            ("z", PyTree::None),
        ])
    }

    #[test]
    fn test_leaves_depth_first() {
        let tree = sample();
        assert_eq!(tree.leaves(), vec![&5, &6, &7]);
        assert_eq!(tree.num_leaves(), 3);
        assert_eq!(tree.num_children(), 3);
    }

    #[test]
    fn test_node_types() {
        let tree = sample();
        assert_eq!(tree.node_type(), Some(NodeType::DICT));
        assert_eq!(PyTree::<i32>::None.node_type(), Some(NodeType::NONE));
        assert_eq!(PyTree::leaf(1).node_type(), None);
        assert_eq!(PyTree::leaf(1).kind_name(), "leaf");
        let point: PyTree<i32> = StructNode::new("Point").field("x", PyTree::leaf(1)).into();
        assert_eq!(point.kind_name(), "Point");
    }

    #[test]
    fn test_map_keeps_structure() {
        let mapped = sample().map(|v| v * 10);
        assert_eq!(mapped.leaves(), vec![&50, &60, &70]);
        let keys: Vec<&Key> = match &mapped {
            PyTree::Dict(map) => map.keys().collect(),
            _ => panic!("expected dict"),
        };
        assert_eq!(keys, vec![&Key::from("x"), &Key::from("y"), &Key::from("z")]);
    }

    #[test]
    fn test_map_changes_leaf_type() {
        let tree = PyTree::tuple_of([1, 2]);
        let mapped: PyTree<String> = tree.map(|v| v.to_string());
        assert_eq!(mapped.leaves(), vec!["1", "2"]);
    }

    #[test]
    fn test_into_leaves() {
        assert_eq!(sample().into_leaves(), vec![5, 6, 7]);
    }

    #[test]
    fn test_structure() {
        let spec = sample().structure();
        assert_eq!(
            spec.to_string(),
            "TreeSpec(dict, ['x', 'y', 'z'], [*, TreeSpec(list, None, [*, *]), TreeSpec(None, None, [])])"
        );
        assert_eq!(spec.num_leaves(), 3);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_record_rejects_builtin_tags() {
        for tag in ["dict", "list", "tuple", "None"] {
            let err = StructNode::<i32>::try_new(tag).unwrap_err();
            assert!(matches!(err, Error::InvalidSpec(_)), "{tag}: {err}");
        }
        assert!(StructNode::<i32>::try_new("ListLike").is_ok());
    }

    #[test]
    #[should_panic(expected = "built-in container")]
    fn test_record_new_panics_on_builtin_tag() {
        let _ = StructNode::<i32>::new("list");
    }

    #[test]
    fn test_record_structure_is_valid() {
        let point: PyTree<i32> = StructNode::new("Point")
            .field("x", PyTree::leaf(1))
            .field("y", PyTree::list_of([2, 3]))
            .into();
        let spec = point.structure();
        assert!(spec.validate().is_ok());
        assert_eq!(
            spec.to_string(),
            "TreeSpec(Point, ['x', 'y'], [*, TreeSpec(list, None, [*, *])])"
        );
    }

    #[test]
    fn test_struct_field_order() {
        let point: PyTree<i32> = StructNode::new("Point")
            .field("y", PyTree::leaf(2))
            .field("x", PyTree::leaf(1))
            .into();
        assert_eq!(point.leaves(), vec![&2, &1]);
    }
}
