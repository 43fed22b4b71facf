// Global — Process-wide default registry
//
// Most code should build a DispatchRegistry and hand it to a SpecFlattener.
// For call sites that cannot thread one through (deserialized modules that
// flatten their own inputs, plugin code registering its containers at
// startup), this module keeps one default registry per leaf type, seeded with
// the built-in decomposers on first use.
//
// Registration takes the write lock, flattening the read lock. A decomposer
// invoked by `tree_flatten_spec` runs under the read lock and must not call
// `register_pytree_flatten_spec`.
//
// `tree_flatten_spec` runs with the config read from the environment on first
// use (see `FlattenConfig::from_env`); `tree_flatten_spec_with_config` takes
// one explicitly.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sprig_core::{NodeSpec, NodeType, PyTree, Result, TreeSpec};
use tracing::warn;

use crate::config::{FlattenConfig, CHILD_COUNT_ENV};
use crate::flatten::SpecFlattener;
use crate::registry::{Decomposable, DispatchRegistry, FnDecomposer};

type RegistryMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

static DEFAULT_REGISTRIES: OnceLock<RwLock<RegistryMap>> = OnceLock::new();
static DEFAULT_CONFIG: OnceLock<FlattenConfig> = OnceLock::new();

fn registries() -> &'static RwLock<RegistryMap> {
    DEFAULT_REGISTRIES.get_or_init(|| RwLock::new(HashMap::new()))
}

fn read_registries() -> RwLockReadGuard<'static, RegistryMap> {
    match registries().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_registries() -> RwLockWriteGuard<'static, RegistryMap> {
    match registries().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Register `decomposer` for `node_type` in the default registry of leaf
/// type `L`, replacing any previous entry.
pub fn register_pytree_flatten_spec<L, D>(node_type: impl Into<NodeType>, decomposer: D)
where
    L: 'static,
    D: Decomposable<L> + 'static,
{
    let mut guard = write_registries();
    let entry = guard.entry(TypeId::of::<L>()).or_insert_with(|| {
        Box::new(DispatchRegistry::<L>::with_builtins()) as Box<dyn Any + Send + Sync>
    });
    if let Some(registry) = entry.as_mut().downcast_mut::<DispatchRegistry<L>>() {
        registry.register(node_type, decomposer);
    }
}

/// Register a function or closure for `node_type` in the default registry of
/// leaf type `L`.
pub fn register_pytree_flatten_fn<L, F>(node_type: impl Into<NodeType>, f: F)
where
    L: 'static,
    F: for<'a> Fn(&'a PyTree<L>, &NodeSpec) -> Result<Vec<&'a PyTree<L>>>
        + Send
        + Sync
        + 'static,
{
    register_pytree_flatten_spec::<L, _>(node_type, FnDecomposer(f));
}

/// Register `node_type` as a named record in the default registry of `L`.
pub fn register_pytree_record<L: 'static>(node_type: impl Into<NodeType>) {
    register_pytree_flatten_spec::<L, _>(node_type, crate::builtin::FieldsDecomposer);
}

/// Run `f` with read access to the default registry of leaf type `L`.
pub fn with_default_registry<L, R>(f: impl FnOnce(&DispatchRegistry<L>) -> R) -> R
where
    L: 'static,
{
    let guard = read_registries();
    if let Some(registry) = guard
        .get(&TypeId::of::<L>())
        .and_then(|entry| entry.as_ref().downcast_ref::<DispatchRegistry<L>>())
    {
        return f(registry);
    }
    drop(guard);
    f(&DispatchRegistry::with_builtins())
}

/// Config used by the global [`tree_flatten_spec`], read from the
/// environment once. An unparsable value falls back to the default.
pub fn default_config() -> FlattenConfig {
    *DEFAULT_CONFIG.get_or_init(|| match FlattenConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(env = CHILD_COUNT_ENV, error = %e, "ignoring invalid flatten config");
            FlattenConfig::default()
        }
    })
}

/// Flatten `tree` against `spec` using the default registry of `L` and
/// [`default_config`].
pub fn tree_flatten_spec<'a, L>(tree: &'a PyTree<L>, spec: &TreeSpec) -> Result<Vec<&'a PyTree<L>>>
where
    L: 'static,
{
    tree_flatten_spec_with_config(tree, spec, default_config())
}

/// Flatten `tree` against `spec` using the default registry of `L` and an
/// explicit config.
pub fn tree_flatten_spec_with_config<'a, L>(
    tree: &'a PyTree<L>,
    spec: &TreeSpec,
    config: FlattenConfig,
) -> Result<Vec<&'a PyTree<L>>>
where
    L: 'static,
{
    with_default_registry(|registry| {
        SpecFlattener::new(registry)
            .with_config(config)
            .flatten(tree, spec)
    })
}
