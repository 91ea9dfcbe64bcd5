//! Constant sources.
//!
//! `const_float`:
//! - params: `value` (number, default 0)
//! - outputs: `out`
//!
//! `const_color`:
//! - params: `r`, `g`, `b` (numbers, default 0), `a` (number, default 1)
//! - outputs: `out` as an `[r, g, b, a]` array

use map_macro::hash_map;
use serde_json::json;

use crate::exec::definition::{
    ComputeContext, ComputeInputs, ComputeOutputs, ComputeParams, NodeDefinition,
};
use crate::exec::value;

/// Constant scalar, driven by the `value` param.
pub fn const_float() -> NodeDefinition {
    NodeDefinition::new(
        Vec::<String>::new(),
        ["out"],
        |_inputs: &ComputeInputs,
         params: &ComputeParams,
         _context: &ComputeContext|
         -> anyhow::Result<ComputeOutputs> {
            let out = value::float_param(params, "value", 0.)?;
            Ok(hash_map! { "out".to_string() => json!(out) })
        },
    )
}

/// Constant color, driven by the `r`/`g`/`b`/`a` params.
pub fn const_color() -> NodeDefinition {
    NodeDefinition::new(
        Vec::<String>::new(),
        ["out"],
        |_inputs: &ComputeInputs,
         params: &ComputeParams,
         _context: &ComputeContext|
         -> anyhow::Result<ComputeOutputs> {
            let channels = [
                value::float_param(params, "r", 0.)?,
                value::float_param(params, "g", 0.)?,
                value::float_param(params, "b", 0.)?,
                value::float_param(params, "a", 1.)?,
            ];
            Ok(hash_map! { "out".to_string() => json!(channels) })
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
    fn const_float_reads_its_param() {
        let mut params = ComputeParams::new();
        params.insert("value".into(), json!(1.5));

        let outputs = const_float()
            .call(&ComputeInputs::new(), &params, &context())
            .unwrap();
        assert_eq!(outputs["out"], json!(1.5));

        let outputs = const_float()
            .call(&ComputeInputs::new(), &ComputeParams::new(), &context())
            .unwrap();
        assert_eq!(outputs["out"], json!(0.));
    }

    #[test]
    fn const_color_defaults_to_opaque_black() {
        let outputs = const_color()
            .call(&ComputeInputs::new(), &ComputeParams::new(), &context())
            .unwrap();
        assert_eq!(outputs["out"], json!([0., 0., 0., 1.]));
    }
}
