//! Node definitions: the compute functions behind node kinds, and the
//! resolver that maps a node's `kind` string to its definition.

use std::collections::HashMap;
use std::fmt::Debug;

use dyn_clone::DynClone;
use serde_json::Value;

use crate::graph::NodeId;

/// Inputs handed to a compute function, keyed by input socket name. An
/// unconnected optional input arrives as [Value::Null].
pub type ComputeInputs = HashMap<String, Value>;

/// Outputs returned by a compute function, keyed by output socket name.
pub type ComputeOutputs = HashMap<String, Value>;

/// Node parameters as seen by a compute function, after numeric coercion.
pub type ComputeParams = serde_json::Map<String, Value>;

#[derive(Clone, Debug)]
/// Call-site information passed to every compute invocation.
pub struct ComputeContext {
    /// The node being computed.
    pub node_id: NodeId,
}

/// A cloneable compute function. Failures are reported through the returned
/// [anyhow::Result]; the engine records them on the node instead of failing
/// the evaluation. `Send + Sync` so definition registries can live in
/// statics and be shared across threads.
pub trait ComputeFn:
    DynClone
    + Send
    + Sync
    + Fn(&ComputeInputs, &ComputeParams, &ComputeContext) -> anyhow::Result<ComputeOutputs>
{
}

impl<F> ComputeFn for F where
    F: Clone
        + Send
        + Sync
        + Fn(&ComputeInputs, &ComputeParams, &ComputeContext) -> anyhow::Result<ComputeOutputs>
{
}

dyn_clone::clone_trait_object!(ComputeFn);

#[derive(Clone)]
/// What a node kind declares: the socket names it expects on each side, and
/// the function that turns inputs and params into outputs.
pub struct NodeDefinition {
    /// Ordered input socket names.
    pub inputs: Vec<String>,
    /// Ordered output socket names.
    pub outputs: Vec<String>,

    compute: Box<dyn ComputeFn>,
}

impl Debug for NodeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl NodeDefinition {
    /// Create a definition from socket name lists and a compute function.
    pub fn new<I, O>(inputs: I, outputs: O, compute: impl ComputeFn + 'static) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            compute: Box::new(compute),
        }
    }

    /// Execute the contained function.
    pub fn call(
        &self,
        inputs: &ComputeInputs,
        params: &ComputeParams,
        context: &ComputeContext,
    ) -> anyhow::Result<ComputeOutputs> {
        (self.compute)(inputs, params, context)
    }
}

/// Maps a node's `kind` to its definition. The kernel never interprets
/// kinds; only the engine consults the resolver.
pub trait Resolver {
    /// Look up the definition for a kind, if one is registered.
    fn resolve(&self, kind: &str) -> Option<&NodeDefinition>;
}

impl Resolver for HashMap<String, NodeDefinition> {
    fn resolve(&self, kind: &str) -> Option<&NodeDefinition> {
        self.get(kind)
    }
}
