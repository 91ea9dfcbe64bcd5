//! Demand-driven execution engine.
//!
//! Given a graph, a target output socket, and a resolver from node kind to
//! [NodeDefinition], the engine pulls values through the upstream closure of
//! the target: to evaluate an output socket, evaluate its node; to evaluate
//! a node, first evaluate every wired input, then call the definition's
//! compute function.
//!
//! Results are cached per node in an [ExecState] that outlives individual
//! evaluations. The dirty set gates cache reuse; cache entries themselves
//! are never proactively invalidated, and entries for nodes that no longer
//! exist are simply ignored.
//!
//! Two failure families stay strictly apart: structural errors
//! ([EngineError]) fail the evaluation, while runtime conditions
//! ([RuntimeError]) are recorded on the node and surface as `null` values
//! flowing downstream.

pub mod definition;
pub mod stats;
pub mod value;

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use log::{debug, trace};
use serde_json::Value;
use thiserror::Error;

use crate::graph::{Graph, GraphError, Node, NodeId, SocketId, Wire, WireId};

use definition::{
    ComputeContext, ComputeInputs, ComputeOutputs, ComputeParams, NodeDefinition, Resolver,
};
use stats::{EvalStats, NodeTiming};

#[derive(Clone, Debug, PartialEq, Error)]
/// Structural failure of an evaluation. These surface to the caller as a
/// failed result; nothing is recorded on nodes.
pub enum EngineError {
    /// The target or its upstream slice is structurally broken.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The resolver knows nothing about a node's kind.
    #[error("no definition registered for kind `{kind}` of node `{node_id}`")]
    MissingNodeDefinition {
        /// Node whose kind failed to resolve.
        node_id: NodeId,
        /// The unresolved kind.
        kind: String,
    },
    /// Two sockets on one side of a node share a name.
    #[error("node `{node_id}` has two `{name}` sockets on one side")]
    DuplicateSocketKey {
        /// Offending node.
        node_id: NodeId,
        /// The doubled socket name.
        name: String,
    },
    /// A socket name (or a returned output name) is unknown to the node's
    /// definition.
    #[error("`{name}` is not declared by the definition of node `{node_id}`")]
    UnknownSocketKey {
        /// Offending node.
        node_id: NodeId,
        /// The undeclared name.
        name: String,
    },
    /// The definition declares a key with no matching socket on the node.
    #[error("definition key `{name}` has no socket on node `{node_id}`")]
    MissingSocketForDefinition {
        /// Offending node.
        node_id: NodeId,
        /// The unmatched definition key.
        name: String,
    },
    /// More than one wire drives a single input socket.
    #[error("input socket `{socket_id}` of node `{node_id}` is driven by multiple wires")]
    MultipleInputWires {
        /// Offending node.
        node_id: NodeId,
        /// The over-driven input socket.
        socket_id: SocketId,
    },
}

#[derive(Clone, Debug, PartialEq, Error)]
/// Per-node condition recorded during evaluation. Never fails the
/// evaluation; the node's outputs become `null` instead.
pub enum RuntimeError {
    /// A required input has neither a wire nor a default value.
    #[error("required input `{socket_name}` of node `{node_id}` is unconnected")]
    MissingRequiredInput {
        /// Node owning the input.
        node_id: NodeId,
        /// The unconnected socket.
        socket_id: SocketId,
        /// The socket's definition key.
        socket_name: String,
    },
    /// The node's compute function failed.
    #[error("node `{node_id}` ({kind}) failed to compute: {cause}")]
    NodeComputeFailed {
        /// Failing node.
        node_id: NodeId,
        /// The node's kind.
        kind: String,
        /// Opaque failure payload; never inspected by the engine.
        cause: String,
    },
}

#[derive(Clone, Debug, Default)]
/// Mutable companion to a graph across evaluations: the dirty set, the
/// per-node output cache, and recorded runtime errors. Holds no reference
/// to any particular graph value; the caller supplies the graph on each
/// call.
pub struct ExecState {
    pub(crate) dirty: BTreeSet<NodeId>,
    pub(crate) output_cache: HashMap<NodeId, ComputeOutputs>,
    pub(crate) node_errors: HashMap<NodeId, Vec<RuntimeError>>,
}

impl ExecState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a node's cached outputs must be recomputed before reuse.
    pub fn is_dirty(&self, node_id: &NodeId) -> bool {
        self.dirty.contains(node_id)
    }

    /// Remove the given nodes from the dirty set.
    pub fn clear_dirty(&mut self, node_ids: &[NodeId]) {
        for node_id in node_ids {
            self.dirty.remove(node_id);
        }
    }

    /// Runtime errors recorded on a node by the latest evaluation that
    /// touched it.
    pub fn node_errors(&self, node_id: &NodeId) -> &[RuntimeError] {
        self.node_errors
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Cached outputs for a node, if any.
    pub fn cached_outputs(&self, node_id: &NodeId) -> Option<&ComputeOutputs> {
        self.output_cache.get(node_id)
    }

    /// Drop everything recorded for a node. Callers use this when a node is
    /// removed from the graph; stale entries are otherwise ignored.
    pub fn discard(&mut self, node_id: &NodeId) {
        self.dirty.remove(node_id);
        self.output_cache.remove(node_id);
        self.node_errors.remove(node_id);
    }
}

/// Mark a node and everything downstream of it dirty. Tolerates nodes
/// absent from the graph (the mark is recorded, the walk is skipped).
pub fn mark_dirty(graph: &Graph, state: &mut ExecState, node_id: &NodeId) {
    state.dirty.insert(node_id.clone());
    if let Ok(closure) = graph.downstream_closure(std::slice::from_ref(node_id)) {
        state.dirty.extend(closure);
    }
    trace!("marked `{node_id}` and downstream dirty");
}

/// Mark the node owning a changed parameter dirty, with its downstream.
pub fn mark_dirty_for_param_change(graph: &Graph, state: &mut ExecState, node_id: &NodeId) {
    mark_dirty(graph, state, node_id);
}

/// Mark the destination node of a wire dirty, with its downstream. A wire
/// or socket no longer present is tolerated as a no-op; callers invoke this
/// against whichever graph value still knows the wire.
pub fn mark_dirty_for_wire_change(graph: &Graph, state: &mut ExecState, wire_id: &WireId) {
    let Some(wire) = graph.wires.get(wire_id) else {
        return;
    };
    let Some(socket) = graph.sockets.get(&wire.to_socket_id) else {
        return;
    };
    mark_dirty(graph, state, &socket.node_id);
}

/// Evaluate the value carried by an output socket. Runtime conditions along
/// the way are recorded in `state` and propagate as `null`.
pub fn evaluate_socket<R>(
    graph: &Graph,
    socket_id: &SocketId,
    resolver: &R,
    state: &mut ExecState,
) -> Result<Value, EngineError>
where
    R: Resolver + ?Sized,
{
    evaluate_with_stats(graph, socket_id, resolver, state).map(|(value, _stats)| value)
}

/// [evaluate_socket], additionally reporting wall time and cache behavior.
pub fn evaluate_with_stats<R>(
    graph: &Graph,
    socket_id: &SocketId,
    resolver: &R,
    state: &mut ExecState,
) -> Result<(Value, EvalStats), EngineError>
where
    R: Resolver + ?Sized,
{
    let started = Instant::now();

    let sub = graph.execution_subgraph_by_output_sockets(std::slice::from_ref(socket_id))?;
    let target = graph.socket(socket_id)?.clone();

    let mut wires_by_input: HashMap<&SocketId, Vec<&Wire>> = HashMap::new();
    for wire_id in &sub.wires {
        let wire = graph.wire(wire_id)?;
        wires_by_input.entry(&wire.to_socket_id).or_default().push(wire);
    }

    let mut evaluator = Evaluator {
        graph,
        resolver,
        state,
        wires_by_input,
        memo: HashMap::new(),
        stats: EvalStats::default(),
    };

    let outputs = evaluator.demand(&target.node_id)?;
    let value = outputs.get(&target.name).cloned().unwrap_or(Value::Null);

    let mut stats = evaluator.stats;
    stats.total_ms = started.elapsed().as_secs_f64() * 1_000.;

    Ok((value, stats))
}

struct Evaluator<'a, R: Resolver + ?Sized> {
    graph: &'a Graph,
    resolver: &'a R,
    state: &'a mut ExecState,
    wires_by_input: HashMap<&'a SocketId, Vec<&'a Wire>>,
    /// Within-evaluation results: each node is demanded at most once per
    /// evaluation, and only the first demand touches cache statistics.
    memo: HashMap<NodeId, ComputeOutputs>,
    stats: EvalStats,
}

impl<R: Resolver + ?Sized> Evaluator<'_, R> {
    fn demand(&mut self, node_id: &NodeId) -> Result<ComputeOutputs, EngineError> {
        if let Some(done) = self.memo.get(node_id) {
            return Ok(done.clone());
        }

        let graph = self.graph;
        let node = graph.node(node_id)?;

        if !self.state.is_dirty(node_id) {
            if let Some(cached) = self.state.output_cache.get(node_id) {
                trace!("cache hit for `{node_id}`");
                let outputs = cached.clone();
                self.stats.cache_hits += 1;
                self.stats.node_timings.push(NodeTiming {
                    node_id: node_id.clone(),
                    kind: node.kind.clone(),
                    duration_ms: 0.,
                    cache_hit: true,
                });
                self.memo.insert(node_id.clone(), outputs.clone());
                return Ok(outputs);
            }
        }

        trace!("cache miss for `{node_id}`");
        self.stats.cache_misses += 1;

        let resolver = self.resolver;
        let definition =
            resolver
                .resolve(&node.kind)
                .ok_or_else(|| EngineError::MissingNodeDefinition {
                    node_id: node_id.clone(),
                    kind: node.kind.clone(),
                })?;
        check_sockets(graph, node, definition)?;

        let mut inputs = ComputeInputs::new();
        let mut missing = Vec::new();
        for socket_id in &node.inputs {
            let socket = graph.socket(socket_id)?;
            let driving = self
                .wires_by_input
                .get(socket_id)
                .cloned()
                .unwrap_or_default();

            match driving.as_slice() {
                [] => {
                    if let Some(default) = &socket.default_value {
                        inputs.insert(socket.name.clone(), default.clone());
                    } else {
                        if socket.required {
                            missing.push(RuntimeError::MissingRequiredInput {
                                node_id: node_id.clone(),
                                socket_id: socket.id.clone(),
                                socket_name: socket.name.clone(),
                            });
                        }
                        inputs.insert(socket.name.clone(), Value::Null);
                    }
                }
                [wire] => {
                    let source = graph.socket(&wire.from_socket_id)?;
                    let source_node = source.node_id.clone();
                    let source_name = source.name.clone();
                    let upstream = self.demand(&source_node)?;
                    inputs.insert(
                        socket.name.clone(),
                        upstream.get(&source_name).cloned().unwrap_or(Value::Null),
                    );
                }
                _ => {
                    return Err(EngineError::MultipleInputWires {
                        node_id: node_id.clone(),
                        socket_id: socket.id.clone(),
                    });
                }
            }
        }

        if !missing.is_empty() {
            debug!("`{node_id}` aborted: {} required input(s) missing", missing.len());
            self.stats.node_timings.push(NodeTiming {
                node_id: node_id.clone(),
                kind: node.kind.clone(),
                duration_ms: 0.,
                cache_hit: false,
            });
            return Ok(self.publish_nulls(node_id, definition, missing));
        }

        let params = coerce_params(&node.params);
        let context = ComputeContext {
            node_id: node_id.clone(),
        };

        let compute_started = Instant::now();
        let produced = definition.call(&inputs, &params, &context);
        self.stats.node_timings.push(NodeTiming {
            node_id: node_id.clone(),
            kind: node.kind.clone(),
            duration_ms: compute_started.elapsed().as_secs_f64() * 1_000.,
            cache_hit: false,
        });

        let mut produced = match produced {
            Ok(produced) => produced,
            Err(cause) => {
                let failure = RuntimeError::NodeComputeFailed {
                    node_id: node_id.clone(),
                    kind: node.kind.clone(),
                    cause: format!("{cause:#}"),
                };
                debug!("{failure}");
                return Ok(self.publish_nulls(node_id, definition, vec![failure]));
            }
        };

        if let Some(unknown) = produced
            .keys()
            .find(|name| !definition.outputs.contains(*name))
        {
            return Err(EngineError::UnknownSocketKey {
                node_id: node_id.clone(),
                name: unknown.clone(),
            });
        }

        let outputs: ComputeOutputs = definition
            .outputs
            .iter()
            .map(|name| {
                let value = produced.remove(name).unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();

        self.state.output_cache.insert(node_id.clone(), outputs.clone());
        self.state.dirty.remove(node_id);
        self.state.node_errors.remove(node_id);
        self.memo.insert(node_id.clone(), outputs.clone());

        Ok(outputs)
    }

    /// Runtime failure: publish `null` for every declared output, cache it,
    /// replace the node's recorded errors, and clear its dirty mark, so
    /// re-evaluating without intervening changes reports each error exactly
    /// once.
    fn publish_nulls(
        &mut self,
        node_id: &NodeId,
        definition: &NodeDefinition,
        errors: Vec<RuntimeError>,
    ) -> ComputeOutputs {
        let outputs: ComputeOutputs = definition
            .outputs
            .iter()
            .map(|name| (name.clone(), Value::Null))
            .collect();

        self.state.output_cache.insert(node_id.clone(), outputs.clone());
        self.state.dirty.remove(node_id);
        self.state.node_errors.insert(node_id.clone(), errors);
        self.memo.insert(node_id.clone(), outputs.clone());

        outputs
    }
}

/// The sockets on each side of a node must correspond one-to-one, by name,
/// with the definition's declared keys.
fn check_sockets(
    graph: &Graph,
    node: &Node,
    definition: &NodeDefinition,
) -> Result<(), EngineError> {
    for (layout, keys) in [
        (&node.inputs, &definition.inputs),
        (&node.outputs, &definition.outputs),
    ] {
        let mut seen = BTreeSet::new();
        for socket_id in layout {
            let socket = graph.socket(socket_id)?;
            if !seen.insert(socket.name.clone()) {
                return Err(EngineError::DuplicateSocketKey {
                    node_id: node.id.clone(),
                    name: socket.name.clone(),
                });
            }
            if !keys.contains(&socket.name) {
                return Err(EngineError::UnknownSocketKey {
                    node_id: node.id.clone(),
                    name: socket.name.clone(),
                });
            }
        }
        for key in keys {
            if !seen.contains(key) {
                return Err(EngineError::MissingSocketForDefinition {
                    node_id: node.id.clone(),
                    name: key.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Normalize integer JSON numbers to floats, recursively, so compute
/// functions see a single numeric form.
fn coerce_params(params: &serde_json::Map<String, Value>) -> ComputeParams {
    params
        .iter()
        .map(|(key, value)| (key.clone(), coerce_value(value)))
        .collect()
}

fn coerce_value(value: &Value) -> Value {
    match value {
        Value::Number(number) if !number.is_f64() => number
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(coerce_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), coerce_value(item)))
                .collect(),
        ),
        other => other.clone(),
    }
}
