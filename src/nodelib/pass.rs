//! Identity plumbing.
//!
//! `pass`:
//! - inputs: `in` (any value; typically declared required by the socket)
//! - outputs: `out`, the input unchanged

use map_macro::hash_map;
use serde_json::Value;

use crate::exec::definition::{
    ComputeContext, ComputeInputs, ComputeOutputs, ComputeParams, NodeDefinition,
};

/// Forward the input value untouched, nulls included.
pub fn pass() -> NodeDefinition {
    NodeDefinition::new(
        ["in"],
        ["out"],
        |inputs: &ComputeInputs,
         _params: &ComputeParams,
         _context: &ComputeContext|
         -> anyhow::Result<ComputeOutputs> {
            let value = inputs.get("in").cloned().unwrap_or(Value::Null);
            Ok(hash_map! { "out".to_string() => value })
        },
    )
}
