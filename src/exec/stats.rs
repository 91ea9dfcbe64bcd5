//! Evaluation instrumentation records.

use crate::graph::NodeId;

#[derive(Clone, Debug, Default, PartialEq)]
/// Summary of one evaluation: wall time, cache behavior, and per-node
/// timings in completion order.
pub struct EvalStats {
    /// Wall time of the whole evaluation, in milliseconds.
    pub total_ms: f64,
    /// Nodes served from the output cache.
    pub cache_hits: usize,
    /// Nodes that had to be computed (or aborted before compute).
    pub cache_misses: usize,
    /// One record per demanded node, in completion order.
    pub node_timings: Vec<NodeTiming>,
}

#[derive(Clone, Debug, PartialEq)]
/// Timing record for a single node within one evaluation. Cache hits
/// contribute a zero-duration entry.
pub struct NodeTiming {
    /// The demanded node.
    pub node_id: NodeId,
    /// The node's kind, for display.
    pub kind: String,
    /// Wall time spent in the node's compute function, in milliseconds.
    pub duration_ms: f64,
    /// Whether the node was served from the cache.
    pub cache_hit: bool,
}
