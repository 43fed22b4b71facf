// PyTree tests — record, rebuild, map and flatten structured values end-to-end

use sprig::prelude::*;

// Helper: a model-input-like structure with a record, a dict and a None hole

fn model_inputs() -> PyTree<f64> {
    let hidden: PyTree<f64> = StructNode::new("HiddenState")
        .field("h", PyTree::leaf(0.5))
        .field("c", PyTree::leaf(0.25))
        .into();
    PyTree::dict([
        ("input_ids", PyTree::list_of([1.0, 2.0, 3.0])),
        ("mask", PyTree::None),
        ("state", hidden),
        ("scale", PyTree::leaf(2.0)),
    ])
}

fn leaf_values(flat: &[&PyTree<f64>]) -> Vec<f64> {
    flat.iter()
        .map(|t| *t.as_leaf().expect("expected a leaf"))
        .collect()
}

// tree_flatten / tree_unflatten

#[test]
fn test_tree_flatten_order_and_spec() {
    let (leaves, spec) = tree_flatten(model_inputs());
    assert_eq!(leaves, vec![1.0, 2.0, 3.0, 0.5, 0.25, 2.0]);
    assert_eq!(spec.num_leaves(), 6);
    assert_eq!(
        spec.to_string(),
        "TreeSpec(dict, ['input_ids', 'mask', 'state', 'scale'], [\
TreeSpec(list, None, [*, *, *]), \
TreeSpec(None, None, []), \
TreeSpec(HiddenState, ['h', 'c'], [*, *]), \
*])"
    );
}

#[test]
fn test_round_trip() {
    let original = model_inputs();
    let (leaves, spec) = tree_flatten(original.clone());
    let rebuilt = tree_unflatten(leaves, &spec).unwrap();
    assert_eq!(rebuilt, original);
    // PyTree equality ignores dict key order; the spec does not.
    assert_eq!(tree_structure(&rebuilt), spec);
}

#[test]
fn test_unflatten_with_new_leaves() {
    let spec = tree_structure(&model_inputs());
    let rebuilt = tree_unflatten((0..6).map(f64::from), &spec).unwrap();
    assert_eq!(tree_leaves(&rebuilt), vec![&0.0, &1.0, &2.0, &3.0, &4.0, &5.0]);
    assert_eq!(tree_structure(&rebuilt), spec);
}

#[test]
fn test_unflatten_leaf_count_mismatch() {
    let spec = TreeSpec::list_of_leaves(3);
    let err = tree_unflatten(vec![1.0, 2.0], &spec).unwrap_err();
    assert!(matches!(
        err,
        Error::LeafCountMismatch {
            expected: 3,
            got: 2
        }
    ));
}

#[test]
fn test_unflatten_unknown_positional_type() {
    let spec = TreeSpec::Node(
        NodeSpec::try_new("Pair", Context::None, vec![TreeSpec::Leaf; 2]).unwrap(),
    );
    let err = tree_unflatten(vec![1.0, 2.0], &spec).unwrap_err();
    assert!(matches!(err, Error::UnregisteredType { .. }));
}

#[test]
fn test_unflatten_leaf_spec() {
    let tree = tree_unflatten(vec![7.0], &TreeSpec::leaf()).unwrap();
    assert_eq!(tree, PyTree::leaf(7.0));
}

#[test]
fn test_tree_map() {
    let doubled = tree_map(model_inputs(), |v| v * 2.0);
    assert_eq!(
        tree_leaves(&doubled),
        vec![&2.0, &4.0, &6.0, &1.0, &0.5, &4.0]
    );
    assert_eq!(tree_structure(&doubled), tree_structure(&model_inputs()));
}

// tree_structure + tree_flatten_spec

#[test]
fn test_flatten_spec_matches_tree_flatten() {
    let inputs = model_inputs();
    let spec = tree_structure(&inputs);

    let mut registry = DispatchRegistry::default();
    registry.register_record("HiddenState");

    let flat = tree_flatten_spec(&registry, &inputs, &spec).unwrap();
    let (leaves, _) = tree_flatten(inputs.clone());
    assert_eq!(leaf_values(&flat), leaves);
}

#[test]
fn test_flatten_spec_ignores_extra_structure() {
    // The spec was recorded from a smaller input; a later call carries an
    // extra key and an extra field, which the recorded spec does not name.
    let mut registry = DispatchRegistry::default();
    registry.register_record("HiddenState");
    let spec = tree_structure(&model_inputs());

    let mut later = model_inputs();
    if let PyTree::Dict(map) = &mut later {
        map.insert(Key::from("labels"), PyTree::leaf(9.0));
        if let Some(PyTree::Struct(state)) = map.get_mut(&Key::from("state")) {
            state.fields.insert("extra".to_string(), PyTree::leaf(8.0));
        }
    }

    let flat = tree_flatten_spec(&registry, &later, &spec).unwrap();
    assert_eq!(leaf_values(&flat), vec![1.0, 2.0, 3.0, 0.5, 0.25, 2.0]);
}

#[test]
fn test_flatten_spec_record_unregistered() {
    let inputs = model_inputs();
    let spec = tree_structure(&inputs);
    let registry = DispatchRegistry::default();
    let err = tree_flatten_spec(&registry, &inputs, &spec).unwrap_err();
    match err {
        Error::UnregisteredType { node_type } => assert_eq!(node_type.as_str(), "HiddenState"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_flatten_spec_coarser_spec() {
    // A spec that treats the whole state record as one leaf.
    let spec = TreeSpec::dict([
        ("input_ids", TreeSpec::list_of_leaves(3)),
        ("state", TreeSpec::leaf()),
    ]);
    let inputs = model_inputs();
    let registry = DispatchRegistry::default();
    let flat = tree_flatten_spec(&registry, &inputs, &spec).unwrap();
    assert_eq!(flat.len(), 4);
    assert_eq!(flat[3].kind_name(), "HiddenState");
}
