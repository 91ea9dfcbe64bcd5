//! Typed accessors for unpacking [serde_json::Value] inputs and params
//! inside compute functions, with error messages naming the offending key.
//!
//! Failures are plain [anyhow] errors: the engine records them on the node
//! as compute failures, so a malformed input never aborts an evaluation.

use anyhow::{anyhow, bail};
use serde_json::Value;

use super::definition::{ComputeInputs, ComputeParams};

/// A connected numeric input. Fails when the input is absent, null, or not
/// a number.
pub fn float_input(inputs: &ComputeInputs, name: &str) -> anyhow::Result<f64> {
    match inputs.get(name) {
        Some(Value::Number(number)) => number
            .as_f64()
            .ok_or_else(|| anyhow!("input `{name}` is out of float range")),
        Some(Value::Null) | None => bail!("input `{name}` has no value"),
        Some(other) => bail!("input `{name}` expected a number, got `{other}`"),
    }
}

/// A numeric input with a fallback for the unconnected case. Still fails on
/// a present value of the wrong shape.
pub fn float_input_or(inputs: &ComputeInputs, name: &str, default: f64) -> anyhow::Result<f64> {
    match inputs.get(name) {
        Some(Value::Null) | None => Ok(default),
        _ => float_input(inputs, name),
    }
}

/// A fixed-length numeric array input, e.g. a vector or color.
pub fn array_input(inputs: &ComputeInputs, name: &str, len: usize) -> anyhow::Result<Vec<f64>> {
    let Some(value) = inputs.get(name) else {
        bail!("input `{name}` has no value");
    };
    let Value::Array(items) = value else {
        bail!("input `{name}` expected an array of {len} numbers, got `{value}`");
    };
    if items.len() != len {
        bail!(
            "input `{name}` expected {len} components, got {}",
            items.len()
        );
    }

    items
        .iter()
        .map(|item| {
            item.as_f64()
                .ok_or_else(|| anyhow!("input `{name}` contains a non-numeric component"))
        })
        .collect()
}

/// A numeric parameter with a default for the unset case.
pub fn float_param(params: &ComputeParams, key: &str, default: f64) -> anyhow::Result<f64> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(number)) => number
            .as_f64()
            .ok_or_else(|| anyhow!("param `{key}` is out of float range")),
        Some(other) => bail!("param `{key}` expected a number, got `{other}`"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use map_macro::hash_map;
    use serde_json::json;

    #[test]
    fn float_input_distinguishes_missing_from_malformed() {
        let inputs = hash_map! {
            "ok".to_string() => json!(1.5),
            "null".to_string() => Value::Null,
            "bad".to_string() => json!("three"),
        };

        assert_eq!(float_input(&inputs, "ok").unwrap(), 1.5);
        assert!(float_input(&inputs, "null").is_err());
        assert!(float_input(&inputs, "missing").is_err());
        assert!(float_input(&inputs, "bad").is_err());

        assert_eq!(float_input_or(&inputs, "null", 7.).unwrap(), 7.);
        assert_eq!(float_input_or(&inputs, "missing", 7.).unwrap(), 7.);
        assert!(float_input_or(&inputs, "bad", 7.).is_err());
    }

    #[test]
    fn array_input_checks_arity() {
        let inputs = hash_map! {
            "v".to_string() => json!([1., 2., 3.]),
        };

        assert_eq!(array_input(&inputs, "v", 3).unwrap(), vec![1., 2., 3.]);
        assert!(array_input(&inputs, "v", 4).is_err());
    }

    #[test]
    fn float_param_defaults_when_unset() {
        let mut params = ComputeParams::new();
        params.insert("set".into(), json!(2));

        assert_eq!(float_param(&params, "set", 0.).unwrap(), 2.);
        assert_eq!(float_param(&params, "unset", 0.5).unwrap(), 0.5);
    }
}
