//! 3-component vector plumbing. Vectors travel as `[x, y, z]` JSON arrays.
//!
//! `combine_vec3`:
//! - inputs: `x`, `y`, `z` (numbers, default 0 when unconnected)
//! - outputs: `out`
//!
//! `split_vec3`:
//! - inputs: `in` (vector)
//! - outputs: `x`, `y`, `z`
//!
//! `dot`:
//! - inputs: `left`, `right` (vectors)
//! - outputs: `out` (number)

use map_macro::hash_map;
use serde_json::json;

use crate::exec::definition::{
    ComputeContext, ComputeInputs, ComputeOutputs, ComputeParams, NodeDefinition,
};
use crate::exec::value;

/// Pack three scalars into a vector.
pub fn combine_vec3() -> NodeDefinition {
    NodeDefinition::new(
        ["x", "y", "z"],
        ["out"],
        |inputs: &ComputeInputs,
         _params: &ComputeParams,
         _context: &ComputeContext|
         -> anyhow::Result<ComputeOutputs> {
            let vector = [
                value::float_input_or(inputs, "x", 0.)?,
                value::float_input_or(inputs, "y", 0.)?,
                value::float_input_or(inputs, "z", 0.)?,
            ];
            Ok(hash_map! { "out".to_string() => json!(vector) })
        },
    )
}

/// Unpack a vector into its components.
pub fn split_vec3() -> NodeDefinition {
    NodeDefinition::new(
        ["in"],
        ["x", "y", "z"],
        |inputs: &ComputeInputs,
         _params: &ComputeParams,
         _context: &ComputeContext|
         -> anyhow::Result<ComputeOutputs> {
            let vector = value::array_input(inputs, "in", 3)?;
            Ok(hash_map! {
                "x".to_string() => json!(vector[0]),
                "y".to_string() => json!(vector[1]),
                "z".to_string() => json!(vector[2]),
            })
        },
    )
}

/// Dot product of two vectors.
pub fn dot() -> NodeDefinition {
    NodeDefinition::new(
        ["left", "right"],
        ["out"],
        |inputs: &ComputeInputs,
         _params: &ComputeParams,
         _context: &ComputeContext|
         -> anyhow::Result<ComputeOutputs> {
            let left = value::array_input(inputs, "left", 3)?;
            let right = value::array_input(inputs, "right", 3)?;
            let out: f64 = left
                .iter()
                .zip(&right)
                .map(|(component, other)| component * other)
                .sum();
            Ok(hash_map! { "out".to_string() => json!(out) })
        },
    )
}

#[cfg(test)]
mod test {
    use float_eq::assert_float_eq;

    use super::*;

    fn context() -> ComputeContext {
        ComputeContext {
            node_id: "n".into(),
        }
    }

    #[test]
    fn combine_then_split_restores_components() {
        let inputs = hash_map! {
            "x".to_string() => json!(1.),
            "y".to_string() => json!(2.),
            "z".to_string() => json!(3.),
        };
        let packed = combine_vec3()
            .call(&inputs, &ComputeParams::new(), &context())
            .unwrap();
        assert_eq!(packed["out"], json!([1., 2., 3.]));

        let inputs = hash_map! { "in".to_string() => packed["out"].clone() };
        let unpacked = split_vec3()
            .call(&inputs, &ComputeParams::new(), &context())
            .unwrap();
        assert_eq!(unpacked["y"], json!(2.));
    }

    #[test]
    fn dot_multiplies_pairwise() {
        let inputs = hash_map! {
            "left".to_string() => json!([1., 2., 3.]),
            "right".to_string() => json!([4., 5., 6.]),
        };
        let outputs = dot()
            .call(&inputs, &ComputeParams::new(), &context())
            .unwrap();
        assert_float_eq!(outputs["out"].as_f64().unwrap(), 32., abs <= 1e-12);
    }

    #[test]
    fn malformed_vectors_are_reported() {
        let inputs = hash_map! { "in".to_string() => json!([1., 2.]) };
        assert!(split_vec3()
            .call(&inputs, &ComputeParams::new(), &context())
            .is_err());
    }
}
