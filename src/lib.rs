#![warn(missing_docs)]

//! Computational core of a node-graph shader editor: a typed directed
//! acyclic graph wired at sockets, an incremental demand-driven evaluation
//! engine with caching and dirty propagation, and a reversible
//! command/history layer.
//!
//! The crate is deliberately UI-free. Canvas rendering, gesture handling,
//! persistence beyond the [document](graph::document) round-trip, and shader
//! code emission live in the embedding editor, which drives this core
//! through three surfaces:
//!
//! - the pure graph operations and queries on [graph::Graph],
//! - [exec::evaluate_socket] with an [exec::ExecState] companion,
//! - [command::Command] application through a [command::history::History].
//!
//! Everything is synchronous and single-threaded; graph values are immutable
//! and freely shareable, while an [exec::ExecState] needs external
//! synchronization if shared.

pub mod command;
pub mod exec;
pub mod graph;
pub mod nodelib;
pub mod types;

/// The types an embedding editor touches daily.
pub mod prelude {
    pub use super::command::{
        history::{History, HistoryEntry},
        Command, NodeIo,
    };
    pub use super::exec::{
        definition::{
            ComputeContext, ComputeInputs, ComputeOutputs, ComputeParams, NodeDefinition,
            Resolver,
        },
        evaluate_socket, evaluate_with_stats, mark_dirty, mark_dirty_for_param_change,
        mark_dirty_for_wire_change,
        stats::{EvalStats, NodeTiming},
        EngineError, ExecState, RuntimeError,
    };
    pub use super::graph::{
        document::{DocumentError, GraphDocument, DOCUMENT_VERSION},
        topology::ExecutionSubgraph,
        validate::Warning,
        Frame, FrameId, FrameSize, Graph, GraphError, GraphId, Node, NodeId, Position, Socket,
        SocketDirection, SocketId, Wire, WireId,
    };
    pub use super::nodelib::{Registry, NODELIB};
    pub use super::types::{is_compatible, SocketTypeId, ALL_SOCKET_TYPES};
}
