// Serialize — Save and load TreeSpecs as JSON
//
// Exported graphs keep the TreeSpec of their inputs and outputs next to the
// weights, so a loading process can flatten new inputs the same way. The
// format is a small versioned envelope:
//
//   {
//     "schema_version": 1,
//     "spec": {"node": {"node_type": "dict",
//                       "context": {"keys": ["x", "y"]},
//                       "children_specs": ["leaf", ...]}}
//   }
//
// Loading checks the schema version and the context/children invariant of
// every node, but does not consult any decomposer registry: a spec naming a
// custom node type loads fine and fails later, at flatten time, if the type
// was not registered in the loading process.
//
// Usage:
//   let json = treespec_dumps(&spec)?;
//   let spec = treespec_loads(&json)?;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sprig_core::{Error, Result, TreeSpec};
use tracing::debug;

/// Current schema version of the spec envelope.
pub const TREESPEC_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    schema_version: u32,
    spec: &'a TreeSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    #[allow(dead_code)]
    schema_version: u32,
    spec: TreeSpec,
}

/// Encode `spec` as a versioned JSON string.
pub fn treespec_dumps(spec: &TreeSpec) -> Result<String> {
    let envelope = EnvelopeRef {
        schema_version: TREESPEC_SCHEMA_VERSION,
        spec,
    };
    serde_json::to_string(&envelope)
        .map_err(|e| Error::Serialization(format!("treespec encoding failed: {e}")))
}

/// Decode a spec written by [`treespec_dumps`].
pub fn treespec_loads(input: &str) -> Result<TreeSpec> {
    let value: Value = serde_json::from_str(input)
        .map_err(|e| Error::Serialization(format!("invalid json: {e}")))?;

    let raw = value
        .get("schema_version")
        .ok_or_else(|| Error::Serialization("missing schema_version".into()))?;
    let found = raw.as_u64().ok_or_else(|| {
        Error::Serialization(format!(
            "invalid schema_version {raw}: expected an unsigned integer"
        ))
    })?;
    if found != u64::from(TREESPEC_SCHEMA_VERSION) {
        debug!(found, "rejecting treespec with unsupported schema version");
        return Err(Error::VersionMismatch {
            expected: TREESPEC_SCHEMA_VERSION,
            found: u32::try_from(found).unwrap_or(u32::MAX),
        });
    }

    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|e| Error::Serialization(format!("invalid treespec: {e}")))?;
    envelope.spec.validate()?;
    Ok(envelope.spec)
}
