//! Color plumbing. Colors travel as `[r, g, b, a]` JSON arrays.
//!
//! `combine_color`:
//! - inputs: `r`, `g`, `b` (numbers, default 0), `a` (number, default 1)
//! - outputs: `out`
//!
//! `split_color`:
//! - inputs: `in` (color)
//! - outputs: `r`, `g`, `b`, `a`

use map_macro::hash_map;
use serde_json::json;

use crate::exec::definition::{
    ComputeContext, ComputeInputs, ComputeOutputs, ComputeParams, NodeDefinition,
};
use crate::exec::value;

/// Pack channel scalars into a color.
pub fn combine_color() -> NodeDefinition {
    NodeDefinition::new(
        ["r", "g", "b", "a"],
        ["out"],
        |inputs: &ComputeInputs,
         _params: &ComputeParams,
         _context: &ComputeContext|
         -> anyhow::Result<ComputeOutputs> {
            let color = [
                value::float_input_or(inputs, "r", 0.)?,
                value::float_input_or(inputs, "g", 0.)?,
                value::float_input_or(inputs, "b", 0.)?,
                value::float_input_or(inputs, "a", 1.)?,
            ];
            Ok(hash_map! { "out".to_string() => json!(color) })
        },
    )
}

/// Unpack a color into its channels.
pub fn split_color() -> NodeDefinition {
    NodeDefinition::new(
        ["in"],
        ["r", "g", "b", "a"],
        |inputs: &ComputeInputs,
         _params: &ComputeParams,
         _context: &ComputeContext|
         -> anyhow::Result<ComputeOutputs> {
            let color = value::array_input(inputs, "in", 4)?;
            Ok(hash_map! {
                "r".to_string() => json!(color[0]),
                "g".to_string() => json!(color[1]),
                "b".to_string() => json!(color[2]),
                "a".to_string() => json!(color[3]),
            })
        },
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn context() -> ComputeContext {
        ComputeContext {
            node_id: "n".into(),
        }
    }

    #[test]
    fn unconnected_alpha_defaults_to_one() {
        let inputs = hash_map! {
            "r".to_string() => json!(0.25),
            "g".to_string() => json!(0.5),
            "b".to_string() => json!(0.75),
        };
        let outputs = combine_color()
            .call(&inputs, &ComputeParams::new(), &context())
            .unwrap();
        assert_eq!(outputs["out"], json!([0.25, 0.5, 0.75, 1.]));
    }

    #[test]
    fn split_exposes_every_channel() {
        let inputs = hash_map! { "in".to_string() => json!([0.1, 0.2, 0.3, 0.4]) };
        let outputs = split_color()
            .call(&inputs, &ComputeParams::new(), &context())
            .unwrap();

        for (channel, expected) in [("r", 0.1), ("g", 0.2), ("b", 0.3), ("a", 0.4)] {
            assert_eq!(outputs[channel], json!(expected), "channel `{channel}`");
        }
    }
}
