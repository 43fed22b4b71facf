use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::Key;

// TreeSpec — Recorded shape of a PyTree, without its leaf values
//
// A TreeSpec is captured once (usually when a module is traced or exported)
// and then used to decompose structurally matching values into their leaves
// in a fixed order. For example, the value
//
//   {"x": t0, "y": [t1, t2]}
//
// is described by
//
//   TreeSpec(dict, ['x', 'y'], [*, TreeSpec(list, None, [*, *])])
//
// where `*` is the leaf marker.
//
// COMPONENTS:
//
//   NodeType   — Stable tag naming a container kind ("dict", "list", "Point")
//   Context    — Per-node data needed to find children (key order, field order)
//   NodeSpec   — A container node: type + context + child specs
//   TreeSpec   — Leaf marker or container node

// NodeType — Stable type tag for dispatch

/// Tag naming a container kind.
///
/// Decomposers are registered against a `NodeType`, so the tag must be stable
/// across processes: a spec serialized by one process is decomposed by the
/// decomposer registered under the same tag in another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeType(Cow<'static, str>);

impl NodeType {
    /// Insertion-ordered mapping from `Key` to subtree.
    pub const DICT: NodeType = NodeType(Cow::Borrowed("dict"));
    /// Variable-length ordered sequence.
    pub const LIST: NodeType = NodeType(Cow::Borrowed("list"));
    /// Fixed-arity positional container.
    pub const TUPLE: NodeType = NodeType(Cow::Borrowed("tuple"));
    /// The empty value; a node with no children.
    pub const NONE: NodeType = NodeType(Cow::Borrowed("None"));

    /// Create a tag from an owned or borrowed name.
    pub fn new(name: impl Into<String>) -> Self {
        NodeType(Cow::Owned(name.into()))
    }

    /// Create a tag from a static name, usable in `const` items.
    pub const fn from_static(name: &'static str) -> Self {
        NodeType(Cow::Borrowed(name))
    }

    /// The tag's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the tags with a built-in decomposer.
    pub fn is_builtin(&self) -> bool {
        *self == Self::DICT || *self == Self::LIST || *self == Self::TUPLE || *self == Self::NONE
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for NodeType {
    fn from(name: &'static str) -> Self {
        NodeType::from_static(name)
    }
}

impl From<String> for NodeType {
    fn from(name: String) -> Self {
        NodeType::new(name)
    }
}

// Context

/// Per-node context needed to locate children that are not positional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    /// Children are positional (lists, tuples) or absent (None).
    #[default]
    None,
    /// Key order of a mapping, recorded when the spec was built.
    Keys(Vec<Key>),
    /// Field order of a named record.
    Fields(Vec<String>),
}

impl Context {
    /// Number of entries the context names, or `None` for positional nodes.
    pub fn len(&self) -> Option<usize> {
        match self {
            Context::None => None,
            Context::Keys(keys) => Some(keys.len()),
            Context::Fields(fields) => Some(fields.len()),
        }
    }

    /// Whether the context names no entries.
    pub fn is_empty(&self) -> bool {
        self.len().map_or(true, |n| n == 0)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::None => write!(f, "None"),
            Context::Keys(keys) => {
                write!(f, "[")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}")?;
                }
                write!(f, "]")
            }
            Context::Fields(fields) => {
                write!(f, "[")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{field}'")?;
                }
                write!(f, "]")
            }
        }
    }
}

// NodeSpec

/// A container node of a [`TreeSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    node_type: NodeType,
    #[serde(default)]
    context: Context,
    children_specs: Vec<TreeSpec>,
}

impl NodeSpec {
    /// Create a node, checking the context against the children.
    ///
    /// Keyed and field contexts must name exactly one entry per child, without
    /// duplicates. The built-in tags also require the context kind they use:
    /// `dict` takes keys, `list`/`tuple`/`None` take no context, and `None` has
    /// no children.
    pub fn try_new(
        node_type: impl Into<NodeType>,
        context: Context,
        children_specs: Vec<TreeSpec>,
    ) -> Result<Self> {
        let node = NodeSpec {
            node_type: node_type.into(),
            context,
            children_specs,
        };
        node.check()?;
        Ok(node)
    }

    /// Assemble a node without checking it. Used where the shape is known to
    /// come from a real value.
    pub(crate) fn from_parts(
        node_type: NodeType,
        context: Context,
        children_specs: Vec<TreeSpec>,
    ) -> Self {
        NodeSpec {
            node_type,
            context,
            children_specs,
        }
    }

    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn children_specs(&self) -> &[TreeSpec] {
        &self.children_specs
    }

    /// Number of immediate children.
    pub fn num_children(&self) -> usize {
        self.children_specs.len()
    }

    /// Validate this node only (not its descendants).
    fn check(&self) -> Result<()> {
        let n = self.children_specs.len();
        if let Some(ctx_len) = self.context.len() {
            if ctx_len != n {
                return Err(Error::InvalidSpec(format!(
                    "{} context names {ctx_len} entries but has {n} child specs",
                    self.node_type
                )));
            }
        }

        match &self.context {
            Context::Keys(keys) => {
                let mut seen = HashSet::with_capacity(keys.len());
                if let Some(dup) = keys.iter().find(|k| !seen.insert(*k)) {
                    return Err(Error::InvalidSpec(format!(
                        "{} context repeats key {dup}",
                        self.node_type
                    )));
                }
            }
            Context::Fields(fields) => {
                let mut seen = HashSet::with_capacity(fields.len());
                if let Some(dup) = fields.iter().map(String::as_str).find(|f| !seen.insert(*f)) {
                    return Err(Error::InvalidSpec(format!(
                        "{} context repeats field '{dup}'",
                        self.node_type
                    )));
                }
            }
            Context::None => {}
        }

        let ty = &self.node_type;
        if *ty == NodeType::DICT && !matches!(self.context, Context::Keys(_)) {
            return Err(Error::InvalidSpec("dict node requires a keys context".into()));
        }
        if (*ty == NodeType::LIST || *ty == NodeType::TUPLE || *ty == NodeType::NONE)
            && self.context != Context::None
        {
            return Err(Error::InvalidSpec(format!("{ty} node takes no context")));
        }
        if *ty == NodeType::NONE && n != 0 {
            return Err(Error::InvalidSpec("None node cannot have children".into()));
        }
        Ok(())
    }
}

// TreeSpec

/// Recorded shape of a PyTree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeSpec {
    /// Leaf marker: one opaque value, not decomposed further.
    Leaf,
    /// A container node.
    Node(NodeSpec),
}

impl TreeSpec {
    /// The leaf marker.
    pub fn leaf() -> Self {
        TreeSpec::Leaf
    }

    /// A mapping node whose children are listed with their keys, in order.
    ///
    /// # Panics
    /// Panics if a key is repeated.
    pub fn dict<K: Into<Key>>(entries: impl IntoIterator<Item = (K, TreeSpec)>) -> Self {
        let (keys, children): (Vec<Key>, Vec<TreeSpec>) =
            entries.into_iter().map(|(k, s)| (k.into(), s)).unzip();
        match NodeSpec::try_new(NodeType::DICT, Context::Keys(keys), children) {
            Ok(node) => TreeSpec::Node(node),
            Err(e) => panic!("TreeSpec::dict: {e}"),
        }
    }

    /// A list node.
    pub fn list(children: Vec<TreeSpec>) -> Self {
        TreeSpec::Node(NodeSpec {
            node_type: NodeType::LIST,
            context: Context::None,
            children_specs: children,
        })
    }

    /// A tuple node.
    pub fn tuple(children: Vec<TreeSpec>) -> Self {
        TreeSpec::Node(NodeSpec {
            node_type: NodeType::TUPLE,
            context: Context::None,
            children_specs: children,
        })
    }

    /// The spec of `PyTree::None`.
    pub fn none() -> Self {
        TreeSpec::Node(NodeSpec {
            node_type: NodeType::NONE,
            context: Context::None,
            children_specs: Vec::new(),
        })
    }

    /// A named record node with its fields listed in order.
    ///
    /// # Panics
    /// Panics if a field is repeated or `node_type` is a built-in tag.
    pub fn record<F: Into<String>>(
        node_type: impl Into<NodeType>,
        fields: impl IntoIterator<Item = (F, TreeSpec)>,
    ) -> Self {
        let (names, children): (Vec<String>, Vec<TreeSpec>) =
            fields.into_iter().map(|(f, s)| (f.into(), s)).unzip();
        match NodeSpec::try_new(node_type, Context::Fields(names), children) {
            Ok(node) => TreeSpec::Node(node),
            Err(e) => panic!("TreeSpec::record: {e}"),
        }
    }

    /// A list of `n` leaves, the most common spec for positional inputs.
    pub fn list_of_leaves(n: usize) -> Self {
        TreeSpec::list(vec![TreeSpec::Leaf; n])
    }

    /// Whether this is the leaf marker.
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeSpec::Leaf)
    }

    /// The container node, if this is not a leaf.
    pub fn as_node(&self) -> Option<&NodeSpec> {
        match self {
            TreeSpec::Leaf => None,
            TreeSpec::Node(node) => Some(node),
        }
    }

    /// The node type, or `None` for the leaf marker.
    pub fn node_type(&self) -> Option<&NodeType> {
        self.as_node().map(NodeSpec::node_type)
    }

    /// Child specs (empty for the leaf marker).
    pub fn children_specs(&self) -> &[TreeSpec] {
        match self {
            TreeSpec::Leaf => &[],
            TreeSpec::Node(node) => &node.children_specs,
        }
    }

    /// Number of leaf markers reachable from this spec.
    pub fn num_leaves(&self) -> usize {
        match self {
            TreeSpec::Leaf => 1,
            TreeSpec::Node(node) => node.children_specs.iter().map(TreeSpec::num_leaves).sum(),
        }
    }

    /// Number of container nodes reachable from this spec.
    pub fn num_nodes(&self) -> usize {
        match self {
            TreeSpec::Leaf => 0,
            TreeSpec::Node(node) => {
                1 + node.children_specs.iter().map(TreeSpec::num_nodes).sum::<usize>()
            }
        }
    }

    /// Check the context/children invariant on every node.
    ///
    /// Specs built through the constructors are always valid; this is meant
    /// for specs that arrive from deserialization.
    pub fn validate(&self) -> Result<()> {
        match self {
            TreeSpec::Leaf => Ok(()),
            TreeSpec::Node(node) => {
                node.check()?;
                node.children_specs.iter().try_for_each(TreeSpec::validate)
            }
        }
    }
}

impl fmt::Display for TreeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeSpec::Leaf => write!(f, "*"),
            TreeSpec::Node(node) => {
                write!(f, "TreeSpec({}, {}, [", node.node_type, node.context)?;
                for (i, child) in node.children_specs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, "])")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_counts() {
        let spec = TreeSpec::leaf();
        assert!(spec.is_leaf());
        assert_eq!(spec.num_leaves(), 1);
        assert_eq!(spec.num_nodes(), 0);
        assert!(spec.children_specs().is_empty());
    }

    #[test]
    fn test_nested_counts() {
        // {"x": *, "y": [*, *]} -> 3 leaves, 2 nodes
        let spec = TreeSpec::dict([
            ("x", TreeSpec::leaf()),
            ("y", TreeSpec::list_of_leaves(2)),
        ]);
        assert_eq!(spec.num_leaves(), 3);
        assert_eq!(spec.num_nodes(), 2);
        assert_eq!(spec.node_type(), Some(&NodeType::DICT));
    }

    #[test]
    fn test_none_has_no_leaves() {
        assert_eq!(TreeSpec::none().num_leaves(), 0);
        assert_eq!(TreeSpec::none().num_nodes(), 1);
    }

    #[test]
    fn test_display() {
        let spec = TreeSpec::dict([
            ("x", TreeSpec::leaf()),
            ("y", TreeSpec::list_of_leaves(2)),
        ]);
        assert_eq!(
            spec.to_string(),
            "TreeSpec(dict, ['x', 'y'], [*, TreeSpec(list, None, [*, *])])"
        );
    }

    #[test]
    fn test_display_record_and_int_keys() {
        let spec = TreeSpec::record("Point", [("x", TreeSpec::leaf()), ("y", TreeSpec::leaf())]);
        assert_eq!(spec.to_string(), "TreeSpec(Point, ['x', 'y'], [*, *])");

        let spec = TreeSpec::dict([(0i64, TreeSpec::leaf()), (1i64, TreeSpec::none())]);
        assert_eq!(
            spec.to_string(),
            "TreeSpec(dict, [0, 1], [*, TreeSpec(None, None, [])])"
        );
    }

    #[test]
    fn test_try_new_rejects_context_length_mismatch() {
        let err = NodeSpec::try_new(
            NodeType::DICT,
            Context::Keys(vec!["a".into(), "b".into()]),
            vec![TreeSpec::Leaf],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
    }

    #[test]
    fn test_try_new_rejects_duplicate_keys() {
        let err = NodeSpec::try_new(
            NodeType::DICT,
            Context::Keys(vec!["a".into(), "a".into()]),
            vec![TreeSpec::Leaf, TreeSpec::Leaf],
        )
        .unwrap_err();
        assert!(err.to_string().contains("repeats key 'a'"));
    }

    #[test]
    fn test_try_new_rejects_wrong_builtin_context() {
        assert!(NodeSpec::try_new(NodeType::DICT, Context::None, vec![]).is_err());
        assert!(NodeSpec::try_new(
            NodeType::LIST,
            Context::Fields(vec!["a".into()]),
            vec![TreeSpec::Leaf]
        )
        .is_err());
        assert!(NodeSpec::try_new(NodeType::NONE, Context::None, vec![TreeSpec::Leaf]).is_err());
    }

    #[test]
    fn test_try_new_accepts_custom_positional() {
        let node = NodeSpec::try_new("Pair", Context::None, vec![TreeSpec::Leaf; 2]).unwrap();
        assert_eq!(node.num_children(), 2);
        assert_eq!(node.node_type().as_str(), "Pair");
    }

    #[test]
    #[should_panic(expected = "repeats field")]
    fn test_record_panics_on_duplicate_field() {
        let _ = TreeSpec::record("Point", [("x", TreeSpec::leaf()), ("x", TreeSpec::leaf())]);
    }

    #[test]
    fn test_builtin_tags() {
        assert!(NodeType::DICT.is_builtin());
        assert!(NodeType::NONE.is_builtin());
        assert!(!NodeType::new("Point").is_builtin());
        assert_eq!(NodeType::from_static("list"), NodeType::LIST);
        assert_eq!(NodeType::new("tuple"), NodeType::TUPLE);
    }
}
