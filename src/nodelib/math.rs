//! Scalar math.
//!
//! `add`, `subtract`, `multiply`, `divide`:
//! - inputs: `left`, `right` (numbers)
//! - outputs: `out`
//!
//! `mix`:
//! - inputs: `from`, `to` (numbers), `factor` (number, clamped to `[0, 1]`,
//!   defaults to 0.5 when unconnected)
//! - outputs: `out`

use anyhow::ensure;
use map_macro::hash_map;
use serde_json::json;

use crate::exec::definition::{
    ComputeContext, ComputeInputs, ComputeOutputs, ComputeParams, NodeDefinition,
};
use crate::exec::value;

fn binary(op: fn(f64, f64) -> anyhow::Result<f64>) -> NodeDefinition {
    NodeDefinition::new(
        ["left", "right"],
        ["out"],
        move |inputs: &ComputeInputs,
              _params: &ComputeParams,
              _context: &ComputeContext|
              -> anyhow::Result<ComputeOutputs> {
            let left = value::float_input(inputs, "left")?;
            let right = value::float_input(inputs, "right")?;
            Ok(hash_map! { "out".to_string() => json!(op(left, right)?) })
        },
    )
}

/// `left + right`.
pub fn add() -> NodeDefinition {
    binary(|left, right| Ok(left + right))
}

/// `left - right`.
pub fn subtract() -> NodeDefinition {
    binary(|left, right| Ok(left - right))
}

/// `left * right`.
pub fn multiply() -> NodeDefinition {
    binary(|left, right| Ok(left * right))
}

/// `left / right`; a zero divisor is a compute failure.
pub fn divide() -> NodeDefinition {
    binary(|left, right| {
        ensure!(right != 0., "division by zero");
        Ok(left / right)
    })
}

/// Linear blend between `from` and `to` by `factor`.
pub fn mix() -> NodeDefinition {
    NodeDefinition::new(
        ["from", "to", "factor"],
        ["out"],
        |inputs: &ComputeInputs,
         _params: &ComputeParams,
         _context: &ComputeContext|
         -> anyhow::Result<ComputeOutputs> {
            let from = value::float_input(inputs, "from")?;
            let to = value::float_input(inputs, "to")?;
            let factor = value::float_input_or(inputs, "factor", 0.5)?.clamp(0., 1.);
            Ok(hash_map! { "out".to_string() => json!(from + (to - from) * factor) })
        },
    )
}
